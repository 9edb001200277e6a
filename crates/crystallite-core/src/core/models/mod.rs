//! # Core Models Module
//!
//! The two structure representations and their building block:
//!
//! - [`site`] - A single occupancy position with species composition,
//!   weights, position, and physical attributes, including mass inference
//!   and kind equality.
//! - [`structure`] - The immutable, validated structure with all derived
//!   properties and the dump interface.
//! - [`builder`] - The editable companion with deferred validation,
//!   consumed by conversion into a fresh immutable structure.
//!
//! The two representations never share mutable state: every conversion
//! between them produces an independent deep copy.

pub mod builder;
pub mod site;
pub mod structure;
