//! Template markup parsing and reference extraction.
//!
//! This module provides:
//! - a typed markup tree with an explicit visitor (`markup`)
//! - extraction of script-level identifier references from directive and
//!   event-handler attributes (`refs`)

pub mod markup;
mod refs;

pub use refs::{extract, ExtractedReferences};
