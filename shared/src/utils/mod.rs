//! Common utility functions

pub mod sql;
pub mod time;
