// logweave - core/delivery.rs
//
// Lazy delivery controller: holds parsed-but-undelivered chunks in
// per-file queues and releases the next queued chunk from every file at
// once when the consumer signals it is near the end of delivered content.
// Bounds the peak amount of grouped/sorted state without re-reading files.
//
// The controller holds no timers and performs no polling; release is
// driven entirely by the consumer's scroll signal or an explicit
// "load more" action. Not thread-safe; single consuming context only.

use crate::core::model::Chunk;
use crate::util::constants;
use std::collections::HashMap;

struct FileQueue {
    file_id: u64,
    chunks: Vec<Chunk>,
    /// Number of chunks already released. Only ever increases: a released
    /// chunk is never re-queued or withdrawn.
    released: usize,
}

/// Per-file chunk queues with lockstep release across files.
pub struct DeliveryController {
    files: Vec<FileQueue>,
    by_id: HashMap<u64, usize>,
    scroll_threshold: f32,
}

impl DeliveryController {
    pub fn new() -> Self {
        Self::with_threshold(constants::SCROLL_RELEASE_THRESHOLD)
    }

    pub fn with_threshold(scroll_threshold: f32) -> Self {
        Self {
            files: Vec::new(),
            by_id: HashMap::new(),
            scroll_threshold,
        }
    }

    /// Queue parsed chunks for a file. May be called repeatedly as the
    /// reader produces more chunks; new chunks append behind any still
    /// unreleased ones.
    pub fn register_chunks(&mut self, file_id: u64, chunks: Vec<Chunk>) {
        let queued: usize = chunks.iter().map(Chunk::len).sum();
        match self.by_id.get(&file_id) {
            Some(&i) => self.files[i].chunks.extend(chunks),
            None => {
                self.by_id.insert(file_id, self.files.len());
                self.files.push(FileQueue {
                    file_id,
                    chunks,
                    released: 0,
                });
            }
        }
        tracing::debug!(file_id, entries = queued, "Chunks queued for lazy delivery");
    }

    /// Release the next unreleased chunk from every file simultaneously,
    /// keeping files advancing roughly in lockstep. Returns the released
    /// chunks (empty when everything has already been released).
    pub fn release_next(&mut self) -> Vec<Chunk> {
        let mut released = Vec::new();
        for file in &mut self.files {
            if let Some(chunk) = file.chunks.get(file.released) {
                released.push(chunk.clone());
                file.released += 1;
                tracing::trace!(
                    file_id = file.file_id,
                    released = file.released,
                    total = file.chunks.len(),
                    "Chunk released"
                );
            }
        }
        released
    }

    /// Release triggered by the renderer's scroll position. Releases only
    /// when the scrolled fraction crosses the configured threshold.
    pub fn on_scroll(&mut self, ratio: f32) -> Vec<Chunk> {
        if ratio >= self.scroll_threshold {
            self.release_next()
        } else {
            Vec::new()
        }
    }

    /// False only when every file has released all of its chunks.
    pub fn has_more_data(&self) -> bool {
        self.files.iter().any(|f| f.released < f.chunks.len())
    }

    /// Cumulative count of entries released so far. Monotonic.
    pub fn released_entries(&self) -> usize {
        self.files
            .iter()
            .map(|f| f.chunks[..f.released].iter().map(Chunk::len).sum::<usize>())
            .sum()
    }

    /// Entries still queued and undelivered.
    pub fn pending_entries(&self) -> usize {
        self.files
            .iter()
            .map(|f| f.chunks[f.released..].iter().map(Chunk::len).sum::<usize>())
            .sum()
    }

    /// Drop a file's queue entirely (the file was removed by the user).
    /// Entries already released stay with the consumer.
    pub fn remove_file(&mut self, file_id: u64) {
        if let Some(i) = self.by_id.remove(&file_id) {
            self.files.remove(i);
            // Rebuild the displaced indices.
            self.by_id = self
                .files
                .iter()
                .enumerate()
                .map(|(idx, f)| (f.file_id, idx))
                .collect();
        }
    }
}

impl Default for DeliveryController {
    fn default() -> Self {
        Self::new()
    }
}
