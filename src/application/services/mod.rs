//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.

mod tree;

pub use tree::{RecordNode, TreeNodeConvert, TreeService, MAX_RENDER_DEPTH};
