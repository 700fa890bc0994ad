//! Record tree service
//!
//! Wires flat records into the domain `TreeBuilder` and renders the result.

use regex::Regex;
use serde::Serialize;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::records::Record;
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::{OutputFormat, Settings};
use crate::domain::{BuildOptions, Entity, TreeBuilder};

/// Deepest tree `render` accepts; serializers recurse once per level.
pub const MAX_RENDER_DEPTH: usize = 256;

/// A record materialized as a tree node.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RecordNode {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RecordNode>,
}

impl RecordNode {
    /// Number of levels, this node counting as one.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        deepest
    }
}

impl Drop for RecordNode {
    // Drains descendants onto a flat list so each node drops childless.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for RecordNode {
    fn to_tree_string(&self) -> Tree<String> {
        let leaves: Vec<_> = self.children.iter().map(|c| c.to_tree_string()).collect();
        Tree::new(format!("{} [{}]", self.name, self.id)).with_leaves(leaves)
    }
}

/// Service for building record trees.
#[derive(Debug)]
pub struct TreeService {
    root_parent: Option<i64>,
    exclude: Vec<Regex>,
    options: BuildOptions,
}

impl TreeService {
    /// Create a tree service; fails on invalid exclude patterns.
    pub fn new(settings: &Settings) -> ApplicationResult<Self> {
        let exclude = settings
            .exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ApplicationError::Config {
                    message: format!("invalid exclude pattern '{}': {}", pattern, e),
                })
            })
            .collect::<ApplicationResult<Vec<_>>>()?;

        Ok(Self {
            root_parent: settings.root_parent,
            exclude,
            options: settings.build_options(),
        })
    }

    fn is_excluded(&self, record: &Record) -> bool {
        self.exclude.iter().any(|re| re.is_match(&record.name))
    }

    fn builder(
        &self,
        records: Vec<Record>,
    ) -> ApplicationResult<
        TreeBuilder<
            Record,
            RecordNode,
            impl Fn(&Record) -> Option<RecordNode> + '_,
            impl Fn(&mut RecordNode, Vec<RecordNode>),
        >,
    > {
        let root_parent = self.root_parent;
        let builder = TreeBuilder::with_options(
            records,
            move |record: &Record| {
                if self.is_excluded(record) {
                    return None;
                }
                Some(RecordNode {
                    id: record.id,
                    parent_id: record.parent_id,
                    name: record.name.clone(),
                    children: Vec::new(),
                })
            },
            |parent: &mut RecordNode, children: Vec<RecordNode>| parent.children.extend(children),
            |record: Record| {
                let parent_id = record.parent_id.filter(|&p| Some(p) != root_parent);
                Entity::new(record.id, parent_id, record)
            },
            self.options,
        )?;
        Ok(builder)
    }

    /// Build the tree under `root`, or the whole forest when `root` is `None`.
    ///
    /// A missing or excluded root yields an empty list.
    #[instrument(level = "debug", skip(self, records), fields(records = records.len()))]
    pub fn build(&self, records: Vec<Record>, root: Option<i64>) -> ApplicationResult<Vec<RecordNode>> {
        let builder = self.builder(records)?;
        let trees = match root {
            Some(id) => builder.build_tree(id)?.into_iter().collect(),
            None => builder.build_forest()?,
        };
        debug!(
            trees = trees.len(),
            depth = trees.iter().map(RecordNode::depth).max().unwrap_or(0),
            "trees built"
        );
        Ok(trees)
    }

    /// Ids of the records starting a tree.
    ///
    /// Fails when some records hang in a parent cycle no root reaches.
    pub fn roots(&self, records: Vec<Record>) -> ApplicationResult<Vec<i64>> {
        let builder = self.builder(records)?;
        builder.check_rooted()?;
        Ok(builder.root_ids())
    }

    /// Render trees in the requested format.
    ///
    /// Trees deeper than `MAX_RENDER_DEPTH` are refused.
    pub fn render(&self, trees: &[RecordNode], format: OutputFormat) -> ApplicationResult<String> {
        if let Some(depth) = trees
            .iter()
            .map(RecordNode::depth)
            .find(|&depth| depth > MAX_RENDER_DEPTH)
        {
            return Err(ApplicationError::RenderDepth {
                depth,
                limit: MAX_RENDER_DEPTH,
            });
        }

        match format {
            OutputFormat::Text => Ok(trees
                .iter()
                .map(|tree| tree.to_tree_string().to_string())
                .collect::<String>()),
            OutputFormat::Json => {
                serde_json::to_string_pretty(trees).map_err(|e| ApplicationError::OperationFailed {
                    context: "render json".to_string(),
                    source: Box::new(e),
                })
            }
        }
    }
}
