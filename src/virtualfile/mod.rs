//! Virtual file synthesis and position mapping.
//!
//! This module provides:
//! - `build` for the synthetic body of reference statements
//! - `synthesize` and `VirtualDocument` for the composed virtual text
//! - `PositionMapper` for virtual <-> original coordinate translation

mod body;
mod mapping;
mod synthesize;

pub use body::build;
pub use mapping::{MappedPosition, PositionMapper};
pub use synthesize::{synthesize, VirtualDocument, SYNTHETIC_FUNCTION};
