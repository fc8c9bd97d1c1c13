//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `pipesub` application.
//!
//! This module centralizes reusable components, such as the crate-wide error
//! type and the tracing setup helper, to promote consistency and reduce
//! duplication.

pub mod error;
pub mod logging;

pub use error::Error;
