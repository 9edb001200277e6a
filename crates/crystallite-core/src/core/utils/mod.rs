//! Shared utilities: the static atomic-mass table and small geometry helpers.

pub mod elements;
pub mod geometry;
