//! Cache module - in-process mirror of the tree table

pub mod row_mirror;

pub use row_mirror::{MirrorStats, RowMirror};
