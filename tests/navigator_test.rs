//! Navigation and path lookup over built trees.

use std::sync::Arc;

use rstest::{fixture, rstest};

use memtree::infrastructure::traits::RealFileSystem;
use memtree::infrastructure::TomlSource;
use memtree::util::testing;
use memtree::{DomainError, NodeId, PathLookup, Payload, Record, Tree, TreeOptions};

fn id(raw: u64) -> NodeId {
    NodeId::new(raw)
}

fn names<'a>(nodes: impl IntoIterator<Item = &'a memtree::Node>) -> Vec<String> {
    nodes
        .into_iter()
        .filter_map(|node| node.name().map(str::to_string))
        .collect()
}

#[fixture]
fn abc() -> Tree {
    testing::init_test_setup();
    Tree::from_records(
        vec![
            Record::new(1, 0, Payload::named("A")),
            Record::new(2, 1, Payload::named("B")),
            Record::new(3, 1, Payload::named("C")),
        ],
        TreeOptions::default(),
    )
    .unwrap()
}

#[fixture]
fn forest() -> Tree {
    testing::init_test_setup();
    let mut source = TomlSource::open("tests/resources/forest.toml", Arc::new(RealFileSystem));
    let mut tree = Tree::new(TreeOptions::default());
    tree.setup(&mut source).unwrap();
    tree
}

// ============================================================
// A/B/C example
// ============================================================

#[rstest]
fn given_abc_records_when_building_then_relations_match_example(abc: Tree) {
    let view = abc.navigator();

    assert_eq!(view.child(id(1)).unwrap().map(|n| n.id), Some(id(2)));
    assert_eq!(view.next(id(2)).unwrap().map(|n| n.id), Some(id(3)));
    assert_eq!(view.previous(id(3)).unwrap().map(|n| n.id), Some(id(2)));
    assert_eq!(view.level(id(3)).unwrap(), 1);
    assert_eq!(view.id_by_path("A/C").unwrap(), Some(id(3)));
    assert_eq!(view.parent(id(1)).unwrap(), None);
}

#[rstest]
fn given_abc_tree_when_asking_for_path_then_returns_root_first(abc: Tree) {
    let path = abc.navigator().path(id(3)).unwrap();
    assert_eq!(names(path), vec!["A", "C"]);
}

#[rstest]
fn given_unknown_id_when_navigating_then_fails_with_not_found(abc: Tree) {
    let view = abc.navigator();
    assert_eq!(view.parent(id(42)).unwrap_err(), DomainError::NotFound(id(42)));
    assert_eq!(view.level(id(42)).unwrap_err(), DomainError::NotFound(id(42)));
    assert!(!view.is_node(id(42)));
}

// ============================================================
// Sibling order and levels
// ============================================================

#[rstest]
fn given_prev_chain_when_building_then_siblings_follow_chain_not_file_order(forest: Tree) {
    let view = forest.navigator();
    assert_eq!(names(view.children(id(1), 1).unwrap()), vec!["nginx", "apache"]);
    assert_eq!(names(view.roots()), vec!["etc", "var"]);
}

#[rstest]
fn given_forest_when_checking_levels_then_child_is_parent_plus_one(forest: Tree) {
    let view = forest.navigator();
    for node in view.nodes(None, 0).unwrap() {
        let level = view.level(node.id).unwrap();
        match view.parent(node.id).unwrap() {
            Some(parent) => assert_eq!(level, view.level(parent.id).unwrap() + 1),
            None => assert_eq!(level, 0),
        }
    }
    assert_eq!(view.depth(), 2);
}

#[rstest]
fn given_forest_when_following_parents_then_every_walk_ends_at_root_level(forest: Tree) {
    let view = forest.navigator();
    for node in view.nodes(None, 0).unwrap() {
        let mut steps = 0;
        let mut cursor = node.id;
        while let Some(parent) = view.parent(cursor).unwrap() {
            cursor = parent.id;
            steps += 1;
            assert!(steps <= view.len(), "parent chain does not terminate");
        }
        assert!(view.get(cursor).unwrap().is_root_level());
    }
}

// ============================================================
// Children and traversal
// ============================================================

#[rstest]
#[case(1, vec!["nginx", "apache"])]
#[case(2, vec!["nginx", "apache", "conf"])]
#[case(0, vec!["nginx", "apache", "conf"])]
fn given_depth_when_listing_children_then_limits_levels(
    forest: Tree,
    #[case] depth: usize,
    #[case] expected: Vec<&str>,
) {
    let children = forest.navigator().children(id(1), depth).unwrap();
    assert_eq!(names(children), expected);
}

#[rstest]
fn given_several_ids_when_listing_children_then_skips_leaves(forest: Tree) {
    let result = forest
        .navigator()
        .children_of(&[id(1), id(4), id(5)], 1)
        .unwrap();

    let parents: Vec<NodeId> = result.iter().map(|(parent, _)| *parent).collect();
    assert_eq!(parents, vec![id(1), id(5)]);
    assert_eq!(names(result[1].1.iter().copied()), vec!["log"]);
}

#[rstest]
#[case(None, 0, vec!["etc", "nginx", "apache", "conf", "var", "log"])]
#[case(None, 1, vec!["etc", "var"])]
#[case(Some(1), 2, vec!["etc", "nginx", "apache"])]
#[case(Some(2), 0, vec!["apache", "conf"])]
fn given_start_and_depth_when_iterating_then_yields_preorder(
    forest: Tree,
    #[case] start: Option<u64>,
    #[case] depth: usize,
    #[case] expected: Vec<&str>,
) {
    let nodes = forest.navigator().nodes(start.map(id), depth).unwrap();
    assert_eq!(names(nodes), expected);
}

#[rstest]
fn given_huge_depth_when_listing_then_behaves_as_unlimited(forest: Tree) {
    let view = forest.navigator();

    assert_eq!(names(view.children(id(1), usize::MAX).unwrap()), vec!["nginx", "apache", "conf"]);
    assert_eq!(names(view.nodes(Some(id(2)), usize::MAX).unwrap()), vec!["apache", "conf"]);
    assert_eq!(view.nodes(None, usize::MAX).unwrap().count(), view.len());
}

#[rstest]
fn given_iterator_when_restarted_then_yields_same_sequence(forest: Tree) {
    let view = forest.navigator();
    let first: Vec<NodeId> = view.nodes(None, 0).unwrap().map(|n| n.id).collect();
    let second: Vec<NodeId> = view.nodes(None, 0).unwrap().map(|n| n.id).collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), view.len());
}

#[rstest]
fn given_visitor_when_walking_then_collects_only_some_results(forest: Tree) {
    let deep = forest
        .navigator()
        .walk(None, 0, |node, level| (level >= 1).then(|| node.id))
        .unwrap();
    assert_eq!(deep, vec![id(3), id(2), id(4), id(6)]);
}

// ============================================================
// Path lookup
// ============================================================

#[rstest]
#[case("etc/apache/conf", Some(4))]
#[case("/var/log", Some(6))]
#[case("var", Some(5))]
#[case("etc/missing", None)]
#[case("etc/nginx/conf", None)]
fn given_path_when_resolving_then_walks_siblings_and_descends(
    forest: Tree,
    #[case] path: &str,
    #[case] expected: Option<u64>,
) {
    assert_eq!(forest.navigator().id_by_path(path).unwrap(), expected.map(id));
}

#[rstest]
fn given_every_node_when_round_tripping_path_then_resolves_to_itself(forest: Tree) {
    let view = forest.navigator();
    for node in view.nodes(None, 0).unwrap() {
        let path = view.path_string(node.id, "name", "/").unwrap();
        assert_eq!(view.id_by_path(&path).unwrap(), Some(node.id), "path {path}");
    }
}

#[rstest]
fn given_start_field_and_separator_when_resolving_then_uses_them(forest: Tree) {
    let lookup = PathLookup::default()
        .starting_at(id(1))
        .field("port")
        .separator("::");
    assert_eq!(forest.navigator().id_by_path_with("80", &lookup).unwrap(), Some(id(2)));

    let by_name = PathLookup::default().starting_at(id(1)).separator("::");
    assert_eq!(
        forest.navigator().id_by_path_with("apache::conf", &by_name).unwrap(),
        Some(id(4))
    );
}

#[rstest]
fn given_duplicate_names_when_resolving_then_first_sibling_wins() {
    let tree = Tree::from_records(
        vec![
            Record::new(1, 0, Payload::named("dup")),
            Record::new(2, 0, Payload::named("dup")),
        ],
        TreeOptions::default(),
    )
    .unwrap();
    assert_eq!(tree.navigator().id_by_path("dup").unwrap(), Some(id(1)));
}

#[rstest]
fn given_nameless_node_when_round_tripping_path_then_empty_segment_matches_it() {
    let tree = Tree::from_records(
        vec![
            Record::new(1, 0, Payload::named("A")),
            Record::new(2, 1, Payload::new().with("kind", "group")),
            Record::new(3, 2, Payload::named("x")),
        ],
        TreeOptions::default(),
    )
    .unwrap();
    let view = tree.navigator();

    let path = view.path_string(id(3), "name", "/").unwrap();

    assert_eq!(path, "A//x");
    assert_eq!(view.id_by_path(&path).unwrap(), Some(id(3)));
    assert_eq!(view.id_by_path("A/").unwrap(), Some(id(2)));
}

#[rstest]
fn given_empty_tree_when_resolving_then_finds_nothing() {
    let tree = Tree::new(TreeOptions::default());
    assert_eq!(tree.navigator().id_by_path("a").unwrap(), None);
    assert!(tree.navigator().first_root().is_none());
}

// ============================================================
// Field access
// ============================================================

#[rstest]
fn given_payload_fields_when_reading_then_returns_values(forest: Tree) {
    let view = forest.navigator();
    assert_eq!(view.field(id(3), "port").unwrap(), Some("8080"));
    assert_eq!(view.field(id(4), "port").unwrap(), None);
    assert_eq!(view.field_by_path("etc/apache", "port").unwrap(), Some("80"));
    assert_eq!(
        view.fields(&[id(2), id(3)], "port").unwrap(),
        vec![Some("80"), Some("8080")]
    );
    assert_eq!(view.first_root().map(|n| n.id), Some(id(1)));
}
