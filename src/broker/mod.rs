pub mod engine;
pub mod feed;
pub mod topic;

pub use engine::Broker;
