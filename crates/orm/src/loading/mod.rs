//! Relation loading: configuration, eager trees and the breadth-first loader

pub mod config;
pub mod eager_loader;
pub mod eager_tree;

pub use config::EagerLoadConfig;
pub use eager_loader::{EagerLoadStats, EagerLoader};
pub use eager_tree::{EagerNode, EagerTree};
