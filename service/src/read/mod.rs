//! Read entities definitions.

pub mod group;
