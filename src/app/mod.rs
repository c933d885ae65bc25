// SupportLens - app/mod.rs
//
// Application layer: rule loading and run orchestration.
// Dependencies: core, platform, util.
// Must NOT be depended on by core.

pub mod pipeline;
pub mod rules_mgr;
