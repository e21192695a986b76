// logweave - lib.rs
//
// Library entry point, exposing the ingestion/grouping pipeline for
// integration testing and programmatic use.
//
// The CLI front-end lives in `main.rs` and is not part of the library
// surface.

pub mod app;
pub mod core;
pub mod util;
