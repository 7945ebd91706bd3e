//! Graph cache round-trip scenarios: build, encode, decode, corrupt.

use maku_kernel::cache;
use maku_kernel::graph::Graph;
use maku_types::{MakuError, NodeId, Rule, RuleSet};

fn rule(name: &str, deps: &[&str], commands: &[&str]) -> Rule {
    Rule {
        name: name.to_string(),
        deps: deps.iter().map(|s| s.to_string()).collect(),
        commands: commands.iter().map(|s| s.to_string()).collect(),
    }
}

fn sample_ruleset() -> RuleSet {
    RuleSet {
        rules: vec![
            rule("gen", &[], &["./configure", "./gen-tables"]),
            rule("lib.o", &["gen"], &["cc -c lib.c"]),
            rule("app.o", &["gen"], &["cc -c app.c"]),
            rule("app", &["app.o", "lib.o"], &["cc -o app app.o lib.o"]),
            rule("check", &["app"], &["./app --self-test"]),
        ],
        phony: vec!["gen".to_string(), "check".to_string()],
    }
}

#[test]
fn round_trip_preserves_the_graph() {
    let graph = Graph::build(&sample_ruleset()).unwrap();
    let decoded = Graph::decode(&graph.encode().unwrap()).unwrap();
    assert_eq!(decoded, graph);
}

#[test]
fn round_trip_preserves_every_query() {
    let graph = Graph::build(&sample_ruleset()).unwrap();
    let decoded = Graph::decode(&graph.encode().unwrap()).unwrap();

    assert_eq!(decoded.len(), graph.len());
    for i in 0..graph.len() {
        let id = NodeId(i as u32);
        assert_eq!(decoded.name_of(id), graph.name_of(id));
        assert_eq!(decoded.commands_of(id), graph.commands_of(id));
        assert_eq!(decoded.children_of(id), graph.children_of(id));
        assert_eq!(decoded.parents_of(id), graph.parents_of(id));
        assert_eq!(decoded.is_phony(id), graph.is_phony(id));
        assert_eq!(decoded.id_of(graph.name_of(id)), Some(id));
    }
}

#[test]
fn round_trip_keeps_adjacency_symmetric() {
    let graph = Graph::build(&sample_ruleset()).unwrap();
    let decoded = Graph::decode(&graph.encode().unwrap()).unwrap();

    for i in 0..decoded.len() {
        let u = NodeId(i as u32);
        for &v in decoded.children_of(u) {
            assert!(decoded.parents_of(v).contains(&u));
        }
        for &p in decoded.parents_of(u) {
            assert!(decoded.children_of(p).contains(&u));
        }
    }
}

#[test]
fn corrupt_version_is_rejected() {
    let graph = Graph::build(&sample_ruleset()).unwrap();
    let mut bytes = graph.encode().unwrap();
    bytes[0] ^= 0xff;

    assert!(matches!(
        Graph::decode(&bytes),
        Err(MakuError::CacheVersionMismatch { .. })
    ));
}

#[test]
fn trailing_byte_is_rejected() {
    let graph = Graph::build(&sample_ruleset()).unwrap();
    let mut bytes = graph.encode().unwrap();
    bytes.push(0);

    assert!(matches!(Graph::decode(&bytes), Err(MakuError::CacheCorrupt(_))));
}

#[test]
fn truncated_payload_is_rejected() {
    let graph = Graph::build(&sample_ruleset()).unwrap();
    let mut bytes = graph.encode().unwrap();
    bytes.truncate(bytes.len() - 3);

    assert!(matches!(Graph::decode(&bytes), Err(MakuError::CacheCorrupt(_))));
}

#[test]
fn out_of_range_id_is_rejected() {
    use maku_kernel::codec::Encode;
    use std::collections::HashMap;

    // a one-node graph whose phony list names node 7
    let mut bytes = Vec::new();
    maku_kernel::GRAPH_FORMAT_VERSION.encode(&mut bytes).unwrap();
    vec![vec!["true".to_string()]].encode(&mut bytes).unwrap();
    vec![Vec::<NodeId>::new()].encode(&mut bytes).unwrap();
    vec![Vec::<NodeId>::new()].encode(&mut bytes).unwrap();
    HashMap::from([("a".to_string(), NodeId(0))]).encode(&mut bytes).unwrap();
    vec![NodeId(7)].encode(&mut bytes).unwrap();
    vec!["a".to_string()].encode(&mut bytes).unwrap();

    assert!(matches!(
        Graph::decode(&bytes),
        Err(MakuError::CacheCorrupt(_))
    ));
}

#[test]
fn mismatched_array_lengths_are_rejected() {
    use maku_kernel::codec::Encode;
    use std::collections::HashMap;

    // two command entries but one of everything else
    let mut bytes = Vec::new();
    maku_kernel::GRAPH_FORMAT_VERSION.encode(&mut bytes).unwrap();
    vec![vec!["true".to_string()], vec![]].encode(&mut bytes).unwrap();
    vec![Vec::<NodeId>::new()].encode(&mut bytes).unwrap();
    vec![Vec::<NodeId>::new()].encode(&mut bytes).unwrap();
    HashMap::from([("a".to_string(), NodeId(0))]).encode(&mut bytes).unwrap();
    Vec::<NodeId>::new().encode(&mut bytes).unwrap();
    vec!["a".to_string()].encode(&mut bytes).unwrap();

    assert_eq!(Graph::decode(&bytes), Err(MakuError::SizeMismatch));
}

#[test]
fn cache_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(cache::CACHE_FILE);
    let graph = Graph::build(&sample_ruleset()).unwrap();

    cache::store(&path, &graph).unwrap();
    assert_eq!(cache::load(&path).unwrap(), graph);
}

#[test]
fn garbage_cache_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(cache::CACHE_FILE);
    std::fs::write(&path, b"not a graph cache").unwrap();

    assert!(cache::load(&path).is_err());
}
