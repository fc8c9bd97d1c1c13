//! # pipesub
//!
//! `pipesub` is a same-host publish/subscribe message broker built on OS
//! named pipes. A manager process owns the topics and subscriptions; feed
//! processes publish and subscribe over one shared control pipe and receive
//! deliveries on a private pipe each.
//!
//! ## Core Modules
//!
//! - `broker`: the shared-state engine: feed registry, topic/subscription
//!   graph, message dispatch with policy checks, and tick-based TTL eviction.
//! - `transport`: the fixed-width wire record, the FIFO plumbing, and the
//!   control-channel loop.
//! - `console`: the interactive admin surface over the same shared state.
//! - `persistence`: save/restore of still-alive persisted messages across
//!   restarts.
//! - `config`: layered settings for pipe locations, limits and storage.
//! - `utils`: error type and tracing setup.

pub mod broker;
pub mod config;
pub mod console;
pub mod persistence;
pub mod transport;
pub mod utils;
