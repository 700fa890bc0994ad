//! Build hierarchical trees from flat, parent-referencing records.
//!
//! The core is [`domain::TreeBuilder`]: it is generic over the caller's payload
//! and node types and only touches them through injected closures.
//!
//! ```
//! use treebuilder::domain::{Entity, TreeBuilder};
//!
//! #[derive(Debug)]
//! struct Node {
//!     name: String,
//!     children: Vec<Node>,
//! }
//!
//! let rows = vec![(1, 0, "01"), (2, 1, "01-02"), (3, 1, "01-03")];
//! let builder = TreeBuilder::new(
//!     rows,
//!     |name: &&str| Some(Node { name: name.to_string(), children: vec![] }),
//!     |parent: &mut Node, children: Vec<Node>| parent.children.extend(children),
//!     |(id, parent, name)| Entity::new(id, (parent != 0).then_some(parent), name),
//! );
//!
//! let tree = builder.build_tree(1).unwrap().unwrap();
//! assert_eq!(tree.children.len(), 2);
//! assert!(builder.build_tree(99).unwrap().is_none());
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod util;
