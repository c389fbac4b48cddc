//! # Node abstractions and specifications.
//!
//! This module provides the node-related data types:
//! - [`NodeSpec`] — immutable description of one supervised process
//! - [`NodeState`] — lifecycle state of a node's supervisor

mod spec;
mod state;

pub use spec::NodeSpec;
pub use state::NodeState;
