pub mod common;
pub mod config;
pub mod error;
pub mod graph;
pub mod ordering;
pub mod planner;
pub mod registry;
pub mod resolver;
pub mod routing;
pub mod scenario;
pub mod stat;
pub mod timeline;
pub mod window;

#[cfg(test)]
mod fixtures;
