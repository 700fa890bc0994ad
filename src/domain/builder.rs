//! Tree builder for reconstructing hierarchies from flat parent-referencing entities.
//!
//! The builder is generic over the payload `T` and the node type `N`. It never
//! inspects either: nodes are produced by the caller's `make_node` closure and
//! linked by the caller's `attach` closure.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::domain::entity::{Entity, EntityId};
use crate::domain::error::{DomainError, TreeResult};

/// How repeated entity ids are handled at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The first entity with a given id in input order is the one looked up.
    #[default]
    FirstWins,
    /// Construction fails on the first repeated id.
    Reject,
}

/// Options controlling construction and assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub duplicates: DuplicatePolicy,
    /// Maximum tree depth, the root being at depth 1. `None` means unbounded.
    pub max_depth: Option<usize>,
}

/// Constructs trees from a flat list of entities.
///
/// Built once from the caller's items, then `build_tree` may be called any
/// number of times; each call produces an independent tree.
pub struct TreeBuilder<T, N, F, A> {
    entities: Vec<Entity<T>>,
    /// id -> position of the first entity carrying it
    index: HashMap<EntityId, usize>,
    /// parent id -> positions of its children, in input order
    children: HashMap<EntityId, Vec<usize>>,
    options: BuildOptions,
    make_node: F,
    attach: A,
    _node: PhantomData<fn() -> N>,
}

/// Indexes built over the entity list.
struct EntityIndex {
    index: HashMap<EntityId, usize>,
    children: HashMap<EntityId, Vec<usize>>,
    first_duplicate: Option<EntityId>,
}

/// A node under assembly whose children are still being visited.
struct Frame<'a, N> {
    id: EntityId,
    node: N,
    depth: usize,
    pending: std::slice::Iter<'a, usize>,
    children: Vec<N>,
}

impl<'a, N> Frame<'a, N> {
    fn new(id: EntityId, node: N, depth: usize, pending: std::slice::Iter<'a, usize>) -> Self {
        Self {
            id,
            node,
            depth,
            pending,
            children: Vec::new(),
        }
    }
}

fn index_entities<T>(entities: &[Entity<T>]) -> EntityIndex {
    let mut index = HashMap::with_capacity(entities.len());
    let mut children: HashMap<EntityId, Vec<usize>> = HashMap::new();
    let mut first_duplicate = None;

    for (pos, entity) in entities.iter().enumerate() {
        match index.entry(entity.id) {
            Entry::Vacant(slot) => {
                slot.insert(pos);
            }
            Entry::Occupied(_) => {
                trace!(id = entity.id, pos, "duplicate entity id, keeping first");
                first_duplicate.get_or_insert(entity.id);
            }
        }
        if let Some(parent_id) = entity.parent_id {
            children.entry(parent_id).or_default().push(pos);
        }
    }

    EntityIndex {
        index,
        children,
        first_duplicate,
    }
}

impl<T, N, F, A> TreeBuilder<T, N, F, A>
where
    F: Fn(&T) -> Option<N>,
    A: Fn(&mut N, Vec<N>),
{
    /// Create a builder, converting every item exactly once and in order.
    ///
    /// # Arguments
    /// * `items` - Raw caller items, consumed by the conversion
    /// * `make_node` - Produces a node from a payload, `None` suppresses the entity and its subtree
    /// * `attach` - Attaches an ordered, non-empty list of children to a parent node
    /// * `init` - Converts a raw item into an entity
    ///
    /// Repeated ids are accepted; lookups resolve to the first occurrence.
    pub fn new<R, I>(items: impl IntoIterator<Item = R>, make_node: F, attach: A, init: I) -> Self
    where
        I: FnMut(R) -> Entity<T>,
    {
        let entities: Vec<Entity<T>> = items.into_iter().map(init).collect();
        let EntityIndex {
            index, children, ..
        } = index_entities(&entities);
        debug!(entities = entities.len(), "tree builder created");

        Self {
            entities,
            index,
            children,
            options: BuildOptions::default(),
            make_node,
            attach,
            _node: PhantomData,
        }
    }

    /// Create a builder with explicit options.
    ///
    /// Fails with `DuplicateId` when `options.duplicates` is `Reject` and an id repeats.
    pub fn with_options<R, I>(
        items: impl IntoIterator<Item = R>,
        make_node: F,
        attach: A,
        init: I,
        options: BuildOptions,
    ) -> TreeResult<Self>
    where
        I: FnMut(R) -> Entity<T>,
    {
        let entities: Vec<Entity<T>> = items.into_iter().map(init).collect();
        let EntityIndex {
            index,
            children,
            first_duplicate,
        } = index_entities(&entities);

        if let (DuplicatePolicy::Reject, Some(id)) = (options.duplicates, first_duplicate) {
            return Err(DomainError::DuplicateId(id));
        }
        debug!(entities = entities.len(), ?options, "tree builder created");

        Ok(Self {
            entities,
            index,
            children,
            options,
            make_node,
            attach,
            _node: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in input order.
    pub fn entities(&self) -> &[Entity<T>] {
        &self.entities
    }

    pub fn options(&self) -> BuildOptions {
        self.options
    }

    /// First entity carrying `id`.
    pub fn get(&self, id: EntityId) -> Option<&Entity<T>> {
        self.index.get(&id).map(|&pos| &self.entities[pos])
    }

    /// Ids of entities without a resolvable parent, in input order.
    ///
    /// An entity is a root when it has no parent id or its parent id is not
    /// present. Repeated ids are reported once.
    pub fn root_ids(&self) -> Vec<EntityId> {
        self.first_occurrences()
            .filter(|entity| entity.is_root() || self.parent_of(entity).is_none())
            .map(|entity| entity.id)
            .collect()
    }

    /// Fail when some entity cannot reach a root through its parent chain.
    ///
    /// Such entities sit on, or hang below, a parent cycle that no root leads
    /// into. The first of them in input order is reported.
    pub fn check_rooted(&self) -> TreeResult<()> {
        let mut rooted: HashSet<EntityId> = HashSet::new();
        for entity in self.first_occurrences() {
            let mut chain = HashSet::new();
            let mut current = entity;
            let reaches_root = loop {
                if rooted.contains(&current.id) {
                    break true;
                }
                if !chain.insert(current.id) {
                    break false;
                }
                match self.parent_of(current) {
                    Some(parent) => current = parent,
                    None => break true,
                }
            };
            if !reaches_root {
                debug!(id = entity.id, "entity unreachable from any root");
                return Err(DomainError::CycleDetected(entity.id));
            }
            rooted.extend(chain);
        }
        Ok(())
    }

    /// Build the tree rooted at `root_id`.
    ///
    /// Returns `Ok(None)` when no entity has that id or when `make_node`
    /// suppresses the root. Errors only on malformed hierarchies.
    #[instrument(level = "debug", skip(self))]
    pub fn build_tree(&self, root_id: EntityId) -> TreeResult<Option<N>> {
        let Some(root) = self.get(root_id) else {
            debug!("root not found");
            return Ok(None);
        };
        let Some(node) = (self.make_node)(&root.payload) else {
            debug!("root suppressed");
            return Ok(None);
        };
        self.check_depth(root.id, 1)?;

        self.assemble(root.id, node).map(Some)
    }

    /// Build one tree per root id, skipping suppressed roots.
    ///
    /// Fails with `CycleDetected` when records exist that no root reaches.
    #[instrument(level = "debug", skip(self))]
    pub fn build_forest(&self) -> TreeResult<Vec<N>> {
        self.check_rooted()?;

        let mut trees = Vec::new();
        for root_id in self.root_ids() {
            if let Some(tree) = self.build_tree(root_id)? {
                trees.push(tree);
            }
        }
        debug!(trees = trees.len(), "forest built");
        Ok(trees)
    }

    fn first_occurrences(&self) -> impl Iterator<Item = &Entity<T>> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(pos, entity)| self.index.get(&entity.id) == Some(pos))
            .map(|(_, entity)| entity)
    }

    fn parent_of(&self, entity: &Entity<T>) -> Option<&Entity<T>> {
        entity.parent_id.and_then(|parent| self.get(parent))
    }

    fn child_positions(&self, parent_id: EntityId) -> std::slice::Iter<'_, usize> {
        self.children
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
    }

    /// Assemble the subtree below `root`, depth first and in input order.
    ///
    /// Runs on an explicit frame stack, so hierarchy depth is bounded by
    /// memory only. `path` holds the ids of the open frames.
    fn assemble(&self, root_id: EntityId, root: N) -> TreeResult<N> {
        let mut root = Frame::new(root_id, root, 1, self.child_positions(root_id));
        let mut stack: Vec<Frame<'_, N>> = Vec::new();
        let mut path = HashSet::from([root_id]);

        loop {
            let frame = stack.last_mut().unwrap_or(&mut root);
            if let Some(&pos) = frame.pending.next() {
                let depth = frame.depth + 1;
                let entity = &self.entities[pos];
                let Some(node) = (self.make_node)(&entity.payload) else {
                    trace!(id = entity.id, "entity suppressed with its subtree");
                    continue;
                };
                self.check_depth(entity.id, depth)?;

                if !path.insert(entity.id) {
                    return Err(DomainError::CycleDetected(entity.id));
                }
                stack.push(Frame::new(
                    entity.id,
                    node,
                    depth,
                    self.child_positions(entity.id),
                ));
            } else if let Some(done) = stack.pop() {
                path.remove(&done.id);
                let node = self.finish(done);
                stack.last_mut().unwrap_or(&mut root).children.push(node);
            } else {
                break;
            }
        }

        Ok(self.finish(root))
    }

    fn finish(&self, frame: Frame<'_, N>) -> N {
        let Frame {
            mut node, children, ..
        } = frame;
        if !children.is_empty() {
            (self.attach)(&mut node, children);
        }
        node
    }

    fn check_depth(&self, id: EntityId, depth: usize) -> TreeResult<()> {
        match self.options.max_depth {
            Some(limit) if depth > limit => Err(DomainError::DepthExceeded { id, limit }),
            _ => Ok(()),
        }
    }
}

impl<T: fmt::Debug, N, F, A> fmt::Debug for TreeBuilder<T, N, F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("entities", &self.entities)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
