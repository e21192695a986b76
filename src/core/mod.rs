// logweave - core/mod.rs
//
// Core pipeline logic layer.
// Dependencies: std, chrono, regex, serde only.
// Must NOT depend on: app, or any I/O crate directly.

pub mod delivery;
pub mod grouping;
pub mod model;
pub mod pattern;
