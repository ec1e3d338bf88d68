//! Relationship traversal tests: direction, typed relationships,
//! variable-length paths, OPTIONAL MATCH nullability, UNWIND, EXISTS
//! (spec.md §4.3.1 patterns, §8 scenario 5).

use neo4j_rs::{Graph, PropertyMap, SqliteStore, Value};

async fn new_graph() -> Graph<SqliteStore> {
    Graph::open_memory().await.unwrap()
}

fn string_col(row: &neo4j_rs::ResultRow, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        other => panic!("{key}: expected string, got {other:?}"),
    }
}

async fn build_chain(graph: &Graph<SqliteStore>) {
    // A -[:NEXT]-> B -[:NEXT]-> C -[:NEXT]-> D
    assert!(
        graph
            .execute(
                "CREATE (a:Node {name: 'A'})-[:NEXT]->(b:Node {name: 'B'})-[:NEXT]->(c:Node {name: 'C'})-[:NEXT]->(d:Node {name: 'D'})",
                PropertyMap::new(),
            )
            .await
            .success
    );
}

#[tokio::test]
async fn outgoing_direction_matches_one_hop() {
    let graph = new_graph().await;
    build_chain(&graph).await;

    let result = graph
        .execute(
            "MATCH (a:Node {name: 'A'})-[:NEXT]->(b) RETURN b.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("b_name"), Some(&Value::String("B".into())));
}

#[tokio::test]
async fn incoming_direction_reverses_traversal() {
    let graph = new_graph().await;
    build_chain(&graph).await;

    let result = graph
        .execute(
            "MATCH (b:Node {name: 'B'})<-[:NEXT]-(a) RETURN a.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("a_name"), Some(&Value::String("A".into())));
}

#[tokio::test]
async fn undirected_pattern_matches_either_direction() {
    let graph = new_graph().await;
    build_chain(&graph).await;

    let result = graph
        .execute("MATCH (b:Node {name: 'B'})-[:NEXT]-(n) RETURN n.name", PropertyMap::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    let mut names: Vec<String> = result.data.iter().map(|r| string_col(r, "n_name")).collect();
    names.sort();
    assert_eq!(names, vec!["A", "C"], "undirected step sees both neighbours of B");
}

#[tokio::test]
async fn relationship_type_filter_excludes_other_types() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute(
                "CREATE (a:Person {name: 'Alice'})-[:KNOWS]->(b:Person {name: 'Bob'})",
                PropertyMap::new(),
            )
            .await
            .success
    );
    assert!(
        graph
            .execute(
                "MATCH (a:Person {name: 'Alice'}), (b:Person {name: 'Bob'}) CREATE (a)-[:BLOCKS]->(b)",
                PropertyMap::new(),
            )
            .await
            .success
    );

    let knows = graph
        .execute("MATCH (a)-[:KNOWS]->(b) RETURN b.name", PropertyMap::new())
        .await;
    assert_eq!(knows.data.len(), 1);

    let either = graph
        .execute("MATCH (a)-[r]->(b) RETURN b.name", PropertyMap::new())
        .await;
    assert_eq!(either.data.len(), 2, "untyped relationship pattern matches both edges");
}

// spec.md §8 scenario 5: chain traversal A -> B -> C -> D via NEXT,
// `*1..2` reaches B and C but not D.
#[tokio::test]
async fn variable_length_path_within_bounds() {
    let graph = new_graph().await;
    build_chain(&graph).await;

    let result = graph
        .execute(
            "MATCH (a:Node {name: 'A'})-[:NEXT*1..2]->(t) RETURN t.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    let mut names: Vec<String> = result.data.iter().map(|r| string_col(r, "t_name")).collect();
    names.sort();
    assert_eq!(names, vec!["B", "C"]);
}

#[tokio::test]
async fn variable_length_path_unbounded_reaches_whole_chain() {
    let graph = new_graph().await;
    build_chain(&graph).await;

    let result = graph
        .execute("MATCH (a:Node {name: 'A'})-[:NEXT*]->(t) RETURN t.name", PropertyMap::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    let mut names: Vec<String> = result.data.iter().map(|r| string_col(r, "t_name")).collect();
    names.sort();
    assert_eq!(names, vec!["B", "C", "D"]);
}

#[tokio::test]
async fn variable_length_path_does_not_revisit_cycle() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute(
                "CREATE (a:Node {name: 'A'})-[:NEXT]->(b:Node {name: 'B'})-[:NEXT]->(a)",
                PropertyMap::new(),
            )
            .await
            .success
    );

    let result = graph
        .execute("MATCH (a:Node {name: 'A'})-[:NEXT*1..5]->(t) RETURN t.name", PropertyMap::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    // visited-set means each node is reachable only once, even on a cycle
    let mut names: Vec<String> = result.data.iter().map(|r| string_col(r, "t_name")).collect();
    names.sort();
    assert_eq!(names, vec!["A", "B"]);
}

// OPTIONAL MATCH pads missing variables with NULL instead of dropping the row.
#[tokio::test]
async fn optional_match_pads_missing_relationship_with_null() {
    let graph = new_graph().await;
    assert!(graph.execute("CREATE (a:Person {name: 'Alice'})", PropertyMap::new()).await.success);
    assert!(graph.execute("CREATE (b:Person {name: 'Bob'})", PropertyMap::new()).await.success);

    let result = graph
        .execute(
            "MATCH (a:Person) OPTIONAL MATCH (a)-[:KNOWS]->(b) RETURN a.name, b",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 2);
    for row in &result.data {
        assert_eq!(row.get("b"), Some(&Value::Null));
    }
}

#[tokio::test]
async fn optional_match_keeps_row_when_pattern_found() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute(
                "CREATE (a:Person {name: 'Alice'})-[:KNOWS]->(b:Person {name: 'Bob'})",
                PropertyMap::new(),
            )
            .await
            .success
    );

    let result = graph
        .execute(
            "MATCH (a:Person) OPTIONAL MATCH (a)-[:KNOWS]->(b) RETURN a.name, b.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("a_name"), Some(&Value::String("Alice".into())));
    assert_eq!(result.data[0].get("b_name"), Some(&Value::String("Bob".into())));
}

#[tokio::test]
async fn unwind_expands_list_into_one_row_per_item() {
    let graph = new_graph().await;
    let result = graph
        .execute("UNWIND [1, 2, 3] AS x RETURN x", PropertyMap::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 3);
    let values: Vec<i64> = result
        .data
        .iter()
        .map(|r| match r.get("x") {
            Some(Value::Int(i)) => *i,
            other => panic!("{other:?}"),
        })
        .collect();
    assert_eq!(values, vec![1, 2, 3]);
}

#[tokio::test]
async fn unwind_then_create_builds_nodes_from_a_list() {
    let graph = new_graph().await;
    let result = graph
        .execute(
            "UNWIND ['Alice', 'Bob', 'Charlie'] AS name CREATE (n:Person {name: name})",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.meta.changes, 3);

    let count = graph.execute("MATCH (n:Person) RETURN count(n)", PropertyMap::new()).await;
    assert_eq!(count.data[0].get("count"), Some(&Value::Int(3)));
}

#[tokio::test]
async fn exists_pattern_predicate_filters_rows() {
    let graph = new_graph().await;
    assert!(graph.execute("CREATE (a:Person {name: 'Alice'})", PropertyMap::new()).await.success);
    assert!(
        graph
            .execute(
                "CREATE (b:Person {name: 'Bob'})-[:KNOWS]->(c:Person {name: 'Carl'})",
                PropertyMap::new(),
            )
            .await
            .success
    );

    let result = graph
        .execute(
            "MATCH (n:Person) WHERE EXISTS((n)-[:KNOWS]->()) RETURN n.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("n_name"), Some(&Value::String("Bob".into())));
}

// A variable-length step does not need to be the pattern's only step: the
// fixed hop a->b joins normally, then the *1..2 step walks from b onward.
#[tokio::test]
async fn variable_length_step_inside_a_longer_chain() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute(
                "CREATE (a:Node {name: 'A'})-[:LEADS]->(b:Node {name: 'B'})-[:NEXT]->(c:Node {name: 'C'})-[:NEXT]->(d:Node {name: 'D'})",
                PropertyMap::new(),
            )
            .await
            .success
    );

    let result = graph
        .execute(
            "MATCH (a:Node {name: 'A'})-[:LEADS]->(b)-[:NEXT*1..2]->(t) RETURN t.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    let mut names: Vec<String> = result.data.iter().map(|r| string_col(r, "t_name")).collect();
    names.sort();
    assert_eq!(names, vec!["C", "D"]);
}

#[tokio::test]
async fn path_pattern_with_multiple_relationship_types() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute(
                "CREATE (a:Person {name: 'Alice'})-[:KNOWS]->(b:Person {name: 'Bob'})",
                PropertyMap::new(),
            )
            .await
            .success
    );

    let result = graph
        .execute(
            "MATCH (a:Person {name: 'Alice'})-[:KNOWS|LIKES]->(b) RETURN b.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("b_name"), Some(&Value::String("Bob".into())));
}
