//! Utility types shared across the crate.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Bounds`] - Axis-aligned bounding box used for model framing
//! - Math type re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
