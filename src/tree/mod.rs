//! Tree Module - nested-set engine
//!
//! # Module Structure
//! - `core`: `Mptt` session struct, mirror warm-up and the lock bracket
//! - `renumber`: boundary shifts, insertion boundaries, subtree parking
//! - `mutations`: add / update / delete / move / copy
//! - `queries`: descendants, path, siblings, tree materialization
//! - `presentation`: `to_select` and `to_list` projections

pub mod core;
pub mod renumber;
pub mod mutations;
pub mod queries;
pub mod presentation;

pub use core::Mptt;
pub use presentation::DEFAULT_SEPARATOR;
pub use renumber::{insertion_boundary, resolve_index, ParkedSubtree, Shift};
