// SupportLens - core/mod.rs
//
// Core business logic layer.
// Dependencies: util, plus data crates (chrono, regex, serde, csv).
// Must NOT depend on: platform, app, or perform filesystem I/O directly.

pub mod aggregate;
pub mod classifier;
pub mod export;
pub mod extract;
pub mod filter;
pub mod model;
pub mod parser;
pub mod report;
pub mod roster;
pub mod rules;
