//! Tests for TreeBuilder

use std::cell::{Cell, RefCell};

use treebuilder::domain::{BuildOptions, DomainError, DuplicatePolicy, Entity, TreeBuilder};
use treebuilder::util::testing;

#[derive(Debug, Clone)]
struct ExampleData {
    id: i64,
    parent_id: i64,
    name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ExampleTree {
    id: i64,
    parent_id: i64,
    name: String,
    children: Vec<ExampleTree>,
}

impl ExampleTree {
    fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }
}

fn data(id: i64, parent_id: i64, name: &'static str) -> ExampleData {
    ExampleData {
        id,
        parent_id,
        name,
    }
}

fn example_data() -> Vec<ExampleData> {
    vec![
        data(1, 0, "01"),
        data(2, 1, "01-02"),
        data(3, 1, "01-03"),
        data(4, 2, "01-02-04"),
        data(5, 2, "01-02-05"),
        data(6, 5, "01-02-05-06"),
    ]
}

fn to_tree(data: &ExampleData) -> Option<ExampleTree> {
    Some(ExampleTree {
        id: data.id,
        parent_id: data.parent_id,
        name: data.name.to_string(),
        children: Vec::new(),
    })
}

fn append_children(parent: &mut ExampleTree, children: Vec<ExampleTree>) {
    parent.children.extend(children);
}

/// Parent id 0 means "no parent", as in the sample data.
fn to_entity(data: ExampleData) -> Entity<ExampleData> {
    let parent_id = (data.parent_id != 0).then_some(data.parent_id);
    Entity::new(data.id, parent_id, data)
}

fn builder_for(
    items: Vec<ExampleData>,
) -> TreeBuilder<
    ExampleData,
    ExampleTree,
    fn(&ExampleData) -> Option<ExampleTree>,
    fn(&mut ExampleTree, Vec<ExampleTree>),
> {
    TreeBuilder::new(
        items,
        to_tree as fn(&ExampleData) -> Option<ExampleTree>,
        append_children as fn(&mut ExampleTree, Vec<ExampleTree>),
        to_entity,
    )
}

// ============================================================
// Construction
// ============================================================

#[test]
fn given_items_when_constructing_then_converts_each_once_in_order() {
    testing::init_test_setup();
    let seen = RefCell::new(Vec::new());

    let builder = TreeBuilder::new(
        example_data(),
        to_tree,
        append_children,
        |item: ExampleData| {
            seen.borrow_mut().push(item.id);
            to_entity(item)
        },
    );

    assert_eq!(*seen.borrow(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(builder.len(), 6);
    let ids: Vec<i64> = builder.entities().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert!(builder.entities()[0].is_root());
}

#[test]
fn given_no_items_when_building_then_no_tree() {
    let builder = builder_for(Vec::new());
    assert!(builder.is_empty());
    assert_eq!(builder.build_tree(1).unwrap(), None);
    assert!(builder.build_forest().unwrap().is_empty());
}

// ============================================================
// BuildTree
// ============================================================

#[test]
fn given_example_data_when_building_root_then_returns_full_hierarchy() {
    testing::init_test_setup();
    let builder = builder_for(example_data());

    let root = builder.build_tree(1).unwrap().expect("root 1 exists");

    assert_eq!(root.name, "01");
    assert_eq!(root.child_names(), vec!["01-02", "01-03"]);

    let n02 = &root.children[0];
    assert_eq!(n02.child_names(), vec!["01-02-04", "01-02-05"]);
    assert!(root.children[1].children.is_empty());

    let n05 = &n02.children[1];
    assert_eq!(n05.child_names(), vec!["01-02-05-06"]);
    assert!(n05.children[0].children.is_empty());
}

#[test]
fn given_inner_root_when_building_then_returns_only_reachable_subtree() {
    let builder = builder_for(example_data());

    let root = builder.build_tree(2).unwrap().unwrap();

    assert_eq!(root.name, "01-02");
    assert_eq!(root.child_names(), vec!["01-02-04", "01-02-05"]);
    assert_eq!(root.children[1].child_names(), vec!["01-02-05-06"]);
}

#[test]
fn given_unknown_root_when_building_then_no_tree() {
    let builder = builder_for(example_data());
    assert_eq!(builder.build_tree(99).unwrap(), None);
}

#[test]
fn given_shuffled_input_when_building_then_children_follow_input_order() {
    let builder = builder_for(vec![
        data(3, 1, "c"),
        data(1, 0, "root"),
        data(4, 1, "d"),
        data(2, 1, "b"),
    ]);

    let root = builder.build_tree(1).unwrap().unwrap();

    assert_eq!(root.child_names(), vec!["c", "d", "b"]);
}

#[test]
fn given_same_builder_when_building_twice_then_trees_are_equal() {
    let builder = builder_for(example_data());

    let first = builder.build_tree(1).unwrap();
    let second = builder.build_tree(1).unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn given_leaf_nodes_when_building_then_attach_only_called_with_children() {
    let calls = Cell::new(0);
    let builder = TreeBuilder::new(
        example_data(),
        to_tree,
        |parent: &mut ExampleTree, children: Vec<ExampleTree>| {
            assert!(!children.is_empty(), "attach called without children");
            calls.set(calls.get() + 1);
            parent.children.extend(children);
        },
        to_entity,
    );

    builder.build_tree(1).unwrap();

    // 01, 01-02 and 01-02-05 have children
    assert_eq!(calls.get(), 3);
}

// ============================================================
// Suppression
// ============================================================

#[test]
fn given_suppressed_inner_node_when_building_then_drops_its_subtree() {
    let builder = TreeBuilder::new(
        example_data(),
        |data: &ExampleData| (data.id != 5).then(|| to_tree(data)).flatten(),
        append_children,
        to_entity,
    );

    let root = builder.build_tree(1).unwrap().unwrap();

    assert_eq!(root.child_names(), vec!["01-02", "01-03"]);
    // 01-02-05 is gone and 01-02-05-06 is not reparented
    assert_eq!(root.children[0].child_names(), vec!["01-02-04"]);
    assert!(root.children[0].children[0].children.is_empty());
}

#[test]
fn given_suppressed_root_when_building_then_no_tree_and_no_attach() {
    let calls = Cell::new(0);
    let builder = TreeBuilder::new(
        example_data(),
        |data: &ExampleData| (data.id != 1).then(|| to_tree(data)).flatten(),
        |parent: &mut ExampleTree, children: Vec<ExampleTree>| {
            calls.set(calls.get() + 1);
            parent.children.extend(children);
        },
        to_entity,
    );

    assert_eq!(builder.build_tree(1).unwrap(), None);
    assert_eq!(calls.get(), 0);
}

// ============================================================
// Malformed hierarchies
// ============================================================

#[test]
fn given_parent_cycle_when_building_then_cycle_detected() {
    let builder = builder_for(vec![data(1, 3, "a"), data(2, 1, "b"), data(3, 2, "c")]);

    let result = builder.build_tree(1);

    assert_eq!(result, Err(DomainError::CycleDetected(1)));
}

#[test]
fn given_self_parent_when_building_then_cycle_detected() {
    let builder = builder_for(vec![data(7, 7, "self")]);

    assert_eq!(builder.build_tree(7), Err(DomainError::CycleDetected(7)));
}

#[test]
fn given_cycle_below_suppressed_node_when_building_then_not_reached() {
    let builder = TreeBuilder::new(
        vec![
            data(1, 0, "root"),
            data(2, 1, "skip"),
            data(5, 2, "below"),
            data(2, 5, "back-edge"),
        ],
        |data: &ExampleData| (data.name != "skip").then(|| to_tree(data)).flatten(),
        append_children,
        to_entity,
    );

    let root = builder.build_tree(1).unwrap().unwrap();

    assert!(root.children.is_empty());
}

#[test]
fn given_duplicate_ids_when_building_then_first_occurrence_is_root() {
    let builder = builder_for(vec![
        data(1, 0, "first"),
        data(1, 0, "second"),
        data(2, 1, "child"),
    ]);

    let root = builder.build_tree(1).unwrap().unwrap();

    assert_eq!(root.name, "first");
    assert_eq!(root.child_names(), vec!["child"]);
    assert_eq!(builder.get(1).map(|e| e.payload.name), Some("first"));
}

#[test]
fn given_duplicate_child_ids_when_building_then_both_are_children() {
    let builder = builder_for(vec![data(1, 0, "root"), data(2, 1, "a"), data(2, 1, "b")]);

    let root = builder.build_tree(1).unwrap().unwrap();

    assert_eq!(root.child_names(), vec!["a", "b"]);
}

#[test]
fn given_reject_policy_when_ids_repeat_then_construction_fails() {
    let result = TreeBuilder::with_options(
        vec![data(1, 0, "a"), data(2, 1, "b"), data(1, 0, "c")],
        to_tree,
        append_children,
        to_entity,
        BuildOptions {
            duplicates: DuplicatePolicy::Reject,
            ..BuildOptions::default()
        },
    );

    assert_eq!(result.err(), Some(DomainError::DuplicateId(1)));
}

#[test]
fn given_reject_policy_when_ids_unique_then_builds() {
    let builder = TreeBuilder::with_options(
        example_data(),
        to_tree,
        append_children,
        to_entity,
        BuildOptions {
            duplicates: DuplicatePolicy::Reject,
            ..BuildOptions::default()
        },
    )
    .unwrap();

    assert_eq!(builder.options().duplicates, DuplicatePolicy::Reject);
    assert!(builder.build_tree(1).unwrap().is_some());
}

#[test]
fn given_depth_limit_when_tree_is_deeper_then_depth_exceeded() {
    let with_limit = |limit| {
        TreeBuilder::with_options(
            example_data(),
            to_tree,
            append_children,
            to_entity,
            BuildOptions {
                max_depth: Some(limit),
                ..BuildOptions::default()
            },
        )
        .unwrap()
    };

    // 01 -> 01-02 -> 01-02-05 -> 01-02-05-06
    assert!(with_limit(4).build_tree(1).unwrap().is_some());
    assert_eq!(
        with_limit(3).build_tree(1),
        Err(DomainError::DepthExceeded { id: 6, limit: 3 })
    );
    assert_eq!(
        with_limit(0).build_tree(1),
        Err(DomainError::DepthExceeded { id: 1, limit: 0 })
    );
}

// ============================================================
// Forest
// ============================================================

#[test]
fn given_several_roots_when_listing_then_includes_orphans_in_order() {
    let builder = builder_for(vec![
        data(10, 0, "a"),
        data(11, 10, "a-1"),
        data(20, 42, "orphan"),
        data(30, 0, "b"),
        data(30, 0, "b-dup"),
    ]);

    assert_eq!(builder.root_ids(), vec![10, 20, 30]);
}

#[test]
fn given_several_roots_when_building_forest_then_one_tree_each() {
    let builder = TreeBuilder::new(
        vec![
            data(10, 0, "a"),
            data(11, 10, "a-1"),
            data(20, 0, "hidden"),
            data(30, 0, "b"),
        ],
        |data: &ExampleData| (data.name != "hidden").then(|| to_tree(data)).flatten(),
        append_children,
        to_entity,
    );

    let forest = builder.build_forest().unwrap();

    let names: Vec<&str> = forest.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(forest[0].child_names(), vec!["a-1"]);
}

#[test]
fn given_cycle_without_root_when_building_forest_then_cycle_detected() {
    let builder = builder_for(vec![data(1, 0, "root"), data(2, 3, "x"), data(3, 2, "y")]);

    assert_eq!(builder.root_ids(), vec![1]);
    assert_eq!(builder.build_forest(), Err(DomainError::CycleDetected(2)));
}

#[test]
fn given_entity_below_rootless_cycle_when_checking_then_first_in_input_order_reported() {
    let builder = builder_for(vec![
        data(1, 0, "root"),
        data(4, 2, "tail"),
        data(2, 3, "x"),
        data(3, 2, "y"),
    ]);

    assert_eq!(builder.check_rooted(), Err(DomainError::CycleDetected(4)));
}

#[test]
fn given_every_entity_reaches_a_root_when_checking_then_ok() {
    let builder = builder_for(vec![
        data(1, 0, "root"),
        data(2, 1, "a"),
        data(3, 42, "orphan"),
        data(4, 3, "orphan-child"),
    ]);

    assert_eq!(builder.check_rooted(), Ok(()));
    assert_eq!(builder.build_forest().unwrap().len(), 2);
}

// ============================================================
// Deep hierarchies
// ============================================================

const CHAIN_LEVELS: i64 = 100_000;

/// Chain 1 <- 2 <- ... <- `levels`.
fn chain(levels: i64) -> impl Iterator<Item = ExampleData> {
    (1..=levels).map(|i| data(i, i - 1, "link"))
}

/// Counts the nodes below it instead of owning them, so dropping stays flat.
#[derive(Debug)]
struct Subtree {
    id: i64,
    size: usize,
}

fn to_subtree(data: &ExampleData) -> Option<Subtree> {
    Some(Subtree {
        id: data.id,
        size: 1,
    })
}

#[test]
fn given_deep_chain_when_building_then_completes() {
    // Arrange
    let attached = Cell::new(0);
    let builder = TreeBuilder::new(
        chain(CHAIN_LEVELS),
        to_subtree,
        |parent: &mut Subtree, children: Vec<Subtree>| {
            attached.set(attached.get() + 1);
            parent.size += children.iter().map(|c| c.size).sum::<usize>();
        },
        to_entity,
    );

    // Act
    let root = builder.build_tree(1).unwrap().unwrap();

    // Assert
    assert_eq!(root.id, 1);
    assert_eq!(root.size, CHAIN_LEVELS as usize);
    assert_eq!(attached.get(), CHAIN_LEVELS as usize - 1);
}

#[test]
fn given_deep_chain_when_limit_is_one_short_then_depth_exceeded_at_last_link() {
    let limit = CHAIN_LEVELS as usize - 1;
    let builder = TreeBuilder::with_options(
        chain(CHAIN_LEVELS),
        to_subtree,
        |_: &mut Subtree, _: Vec<Subtree>| {},
        to_entity,
        BuildOptions {
            max_depth: Some(limit),
            ..BuildOptions::default()
        },
    )
    .unwrap();

    assert_eq!(
        builder.build_tree(1).err(),
        Some(DomainError::DepthExceeded {
            id: CHAIN_LEVELS,
            limit
        })
    );
}

#[test]
fn given_deep_chain_closed_into_cycle_when_building_then_cycle_detected() {
    let mut items: Vec<ExampleData> = chain(CHAIN_LEVELS).collect();
    items.push(data(CHAIN_LEVELS + 1, CHAIN_LEVELS, "loop"));
    items[0].parent_id = CHAIN_LEVELS + 1;
    let builder = TreeBuilder::new(
        items,
        to_subtree,
        |_: &mut Subtree, _: Vec<Subtree>| {},
        to_entity,
    );

    assert_eq!(builder.build_tree(1).err(), Some(DomainError::CycleDetected(1)));
}

// ============================================================
// Concurrency
// ============================================================

#[test]
fn given_shared_builder_when_building_from_threads_then_trees_are_equal() {
    let builder = builder_for(example_data());
    let expected = builder.build_tree(1).unwrap();
    let shared = &builder;

    let trees: Vec<Option<ExampleTree>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(move || shared.build_tree(1).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(trees.iter().all(|tree| *tree == expected));
}
