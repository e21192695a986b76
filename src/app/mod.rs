// logweave - app module
//
// Orchestration and I/O layer: chunked file reading, batch parse
// execution, and ingest lifecycle management over std threads and
// mpsc channels.

pub mod executor;
pub mod pipeline;
pub mod reader;
