//! Unit tests for the dependency graph.

use super::*;
use rstest::{fixture, rstest};

fn graph_of(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph<()> {
    let mut graph = DependencyGraph::new();
    for node in nodes {
        graph.add_node(*node, ());
    }
    for (from, to) in edges {
        graph.add_edge(from, to).expect("edge");
    }
    graph
}

/// `base` feeds `left` and `right`, which both feed `top`.
#[fixture]
fn diamond() -> DependencyGraph<()> {
    graph_of(
        &["top", "left", "right", "base"],
        &[("base", "left"), ("base", "right"), ("left", "top"), ("right", "top")],
    )
}

#[rstest]
fn diamond_orders_dependencies_first(diamond: DependencyGraph<()>) {
    assert_eq!(
        diamond.topological_sort().expect("sort"),
        vec!["base", "left", "right", "top"]
    );
    assert!(!diamond.has_cycles());
}

/// Insert `from -> to` without the reachability check `add_edge` performs.
fn force_edge(graph: &mut DependencyGraph<()>, from: &str, to: &str) {
    graph
        .edges
        .entry(from.to_owned())
        .or_default()
        .insert(to.to_owned());
    graph
        .reverse_edges
        .entry(to.to_owned())
        .or_default()
        .insert(from.to_owned());
}

#[test]
fn ordering_reports_nodes_stuck_in_a_cycle() {
    let mut graph = graph_of(&["a", "b", "c"], &[("a", "b")]);
    force_edge(&mut graph, "b", "a");
    assert!(graph.has_cycles());
    assert_eq!(
        graph.topological_sort(),
        Err(GraphError::CycleDetected {
            nodes: vec!["a".into(), "b".into()]
        })
    );
}

#[test]
fn independent_nodes_keep_insertion_order() {
    let graph = graph_of(&["c", "a", "b"], &[]);
    assert_eq!(graph.topological_sort().expect("sort"), vec!["c", "a", "b"]);
}

#[test]
fn empty_graph_sorts_to_nothing() {
    let graph: DependencyGraph<()> = DependencyGraph::new();
    assert!(graph.topological_sort().expect("sort").is_empty());
    assert!(graph.is_empty());
}

#[rstest]
fn back_edge_is_rejected_and_graph_unchanged(mut diamond: DependencyGraph<()>) {
    let before = diamond.topological_sort().expect("sort");
    let err = diamond.add_edge("top", "base").expect_err("cycle");
    assert_eq!(
        err,
        GraphError::Cycle {
            from: "top".into(),
            to: "base".into(),
        }
    );
    assert!(diamond.dependents("top").expect("top").is_empty());
    assert!(diamond.dependencies("base").expect("base").is_empty());
    assert_eq!(diamond.topological_sort().expect("sort"), before);
}

#[test]
fn self_loop_is_rejected() {
    let mut graph = graph_of(&["a"], &[]);
    assert!(matches!(
        graph.add_edge("a", "a"),
        Err(GraphError::Cycle { .. })
    ));
    assert!(!graph.has_cycles());
}

#[test]
fn two_node_cycle_is_rejected() {
    let mut graph = graph_of(&["a", "b"], &[("a", "b")]);
    assert!(graph.add_edge("b", "a").is_err());
}

#[rstest]
#[case("ghost", "a")]
#[case("a", "ghost")]
fn edges_need_both_endpoints(#[case] from: &str, #[case] to: &str) {
    let mut graph = graph_of(&["a"], &[]);
    assert_eq!(
        graph.add_edge(from, to),
        Err(GraphError::UnknownNode { id: "ghost".into() })
    );
}

#[test]
fn re_adding_a_node_replaces_payload_and_keeps_edges() {
    let mut graph = DependencyGraph::new();
    graph.add_node("a", 1);
    graph.add_node("b", 2);
    graph.add_edge("a", "b").expect("edge");
    graph.add_node("a", 10);
    assert_eq!(graph.payload("a"), Ok(&10));
    assert_eq!(graph.len(), 2);
    assert!(graph.dependents("a").expect("a").contains("b"));
}

#[rstest]
fn neighbour_queries(diamond: DependencyGraph<()>) {
    let deps: Vec<_> = diamond.dependencies("top").expect("top").iter().cloned().collect();
    assert_eq!(deps, vec!["left", "right"]);
    let dependents: Vec<_> = diamond.dependents("base").expect("base").iter().cloned().collect();
    assert_eq!(dependents, vec!["left", "right"]);
    assert!(diamond.dependencies("ghost").is_err());
    assert!(diamond.payload("ghost").is_err());
    assert!(diamond.contains("base"));
    assert!(!diamond.contains("ghost"));
}

#[rstest]
fn closure_covers_transitive_dependencies(diamond: DependencyGraph<()>) {
    let closure = diamond.dependency_closure("top").expect("closure");
    let mut names: Vec<_> = closure.into_iter().collect();
    names.sort();
    assert_eq!(names, vec!["base", "left", "right", "top"]);

    let left = diamond.dependency_closure("left").expect("closure");
    assert!(left.contains("base"));
    assert!(!left.contains("right"));
    assert!(diamond.dependency_closure("ghost").is_err());
}

#[rstest]
fn all_paths_through_a_diamond(diamond: DependencyGraph<()>) {
    let paths = diamond.find_all_paths("base", "top").expect("paths");
    assert_eq!(
        paths,
        vec![
            vec!["base".to_owned(), "left".into(), "top".into()],
            vec!["base".to_owned(), "right".into(), "top".into()],
        ]
    );
}

#[rstest]
fn path_queries_at_the_edges(diamond: DependencyGraph<()>) {
    assert_eq!(
        diamond.find_all_paths("top", "top").expect("paths"),
        vec![vec!["top".to_owned()]]
    );
    assert!(diamond.find_all_paths("top", "base").expect("paths").is_empty());
    assert!(diamond.find_all_paths("left", "right").expect("paths").is_empty());
    assert!(diamond.find_all_paths("ghost", "top").is_err());
}

#[test]
fn dot_output_lists_nodes_then_edges() {
    let graph = graph_of(
        &["@/lib/core", "@/app/server"],
        &[("@/lib/core", "@/app/server")],
    );
    insta::assert_snapshot!(graph.to_dot(), @r#"
    digraph dependencies {
        rankdir=LR;
        "@/lib/core";
        "@/app/server";
        "@/lib/core" -> "@/app/server";
    }
    "#);
}
