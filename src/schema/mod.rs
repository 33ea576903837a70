//! face.frame.v1 recording schema
//!
//! This module defines the on-disk format for recorded classifier output, used to
//! replay a capture session offline.

mod adapter;
mod frame;

pub use adapter::*;
pub use frame::*;
