//! Common utilities for the Selkie selector engine.
//!
//! This crate provides shared infrastructure used by the engine crates:
//! - **Warning System** - deduplicated warnings for unsupported selector features

pub mod warning;
