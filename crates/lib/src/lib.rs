//! strata-lib: build-request orchestration over a content-addressed store.
//!
//! This crate provides the types and logic behind the `strata` CLI:
//! - `target`: build requests and realized results
//! - `store`: the store abstraction and the filesystem store
//! - `plan`: dry-run planning (what would be built)
//! - `report`: JSON encodings of requests and results
//! - `outlink`: deterministic result symlinks registered as GC roots
//! - `profile`: generation-pointer profiles over realized paths

pub mod outlink;
pub mod paths;
pub mod plan;
pub mod profile;
pub mod report;
pub mod resolve;
pub mod store;
pub mod target;
pub mod util;
