//! The `transport` module is responsible for moving records between the
//! manager and its feeds over named pipes.
//!
//! It defines the fixed-width record that is the unit of transfer on every
//! pipe, the FIFO plumbing itself, and the control-channel loop that feeds
//! inbound records to the broker.

pub mod control;
pub mod pipe;
pub mod record;

#[cfg(test)]
mod tests;
