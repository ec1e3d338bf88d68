//! End-to-end integration tests for the core Cypher pipeline: parse,
//! translate, execute against an in-memory `SqliteStore`, shape rows.
//!
//! `Graph::execute` is infallible — every failure mode (parse, translate,
//! store) comes back inside `ExecutionResult`, never as an `Err`.

use neo4j_rs::{Graph, PropertyMap, SqliteStore, Value};

async fn new_graph() -> Graph<SqliteStore> {
    Graph::open_memory().await.unwrap()
}

fn node_label<'a>(row: &'a neo4j_rs::ResultRow, var: &str) -> &'a str {
    match row.get(var) {
        Some(Value::Node(n)) => &n.label,
        other => panic!("{var} is not a node: {other:?}"),
    }
}

// 1. CREATE a node, then MATCH it back.
#[tokio::test]
async fn create_and_query_node() {
    let graph = new_graph().await;

    let create = graph.execute("CREATE (n:Person)", PropertyMap::new()).await;
    assert!(create.success, "{:?}", create.error);

    let result = graph.execute("MATCH (n:Person) RETURN n", PropertyMap::new()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(node_label(&result.data[0], "n"), "Person");
}

// 2. CREATE with properties, query back properties (spec.md §8 scenario 1).
#[tokio::test]
async fn create_with_properties_round_trips() {
    let graph = new_graph().await;

    let create = graph
        .execute("CREATE (n:Person {name: 'Alice', age: 30})", PropertyMap::new())
        .await;
    assert!(create.success);

    let result = graph
        .execute("MATCH (n:Person) RETURN n.name, n.age", PropertyMap::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("n_name"), Some(&Value::String("Alice".into())));
    assert_eq!(result.data[0].get("n_age"), Some(&Value::Int(30)));
}

// 3. Multiple nodes, WHERE filter on a numeric property.
#[tokio::test]
async fn match_with_where_filter() {
    let graph = new_graph().await;

    for (name, age) in [("Ada", 3), ("Bob", 30), ("Charlie", 25)] {
        let q = format!("CREATE (n:Person {{name: '{name}', age: {age}}})");
        assert!(graph.execute(&q, PropertyMap::new()).await.success);
    }

    let result = graph
        .execute("MATCH (n:Person) WHERE n.age > 10 RETURN n.name", PropertyMap::new())
        .await;
    assert!(result.success);
    assert_eq!(result.data.len(), 2);

    let names: Vec<String> = result
        .data
        .iter()
        .map(|row| match row.get("n_name") {
            Some(Value::String(s)) => s.clone(),
            other => panic!("{other:?}"),
        })
        .collect();
    assert!(names.contains(&"Bob".to_string()));
    assert!(names.contains(&"Charlie".to_string()));
    assert!(!names.contains(&"Ada".to_string()));
}

// 4. count(n) aggregate.
#[tokio::test]
async fn count_aggregate() {
    let graph = new_graph().await;
    for name in ["Ada", "Bob", "Charlie"] {
        let q = format!("CREATE (n:Person {{name: '{name}'}})");
        assert!(graph.execute(&q, PropertyMap::new()).await.success);
    }

    let result = graph.execute("MATCH (n:Person) RETURN count(n)", PropertyMap::new()).await;
    assert!(result.success);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("count"), Some(&Value::Int(3)));
}

// 5. RETURN with LIMIT.
#[tokio::test]
async fn match_with_limit() {
    let graph = new_graph().await;
    for i in 0..5 {
        let q = format!("CREATE (n:Person {{name: 'Person{i}'}})");
        assert!(graph.execute(&q, PropertyMap::new()).await.success);
    }

    let result = graph
        .execute("MATCH (n:Person) RETURN n LIMIT 2", PropertyMap::new())
        .await;
    assert!(result.success);
    assert_eq!(result.data.len(), 2);
}

// 6. CREATE nodes plus a relationship in one pattern, then traverse (spec.md
// §8 scenario 2).
#[tokio::test]
async fn create_and_match_relationship() {
    let graph = new_graph().await;

    let create = graph
        .execute(
            "CREATE (a:Person {name: 'Alice'})-[:KNOWS]->(b:Person {name: 'Bob'})",
            PropertyMap::new(),
        )
        .await;
    assert!(create.success, "{:?}", create.error);

    let result = graph
        .execute(
            "MATCH (a:Person {name: 'Alice'})-[:KNOWS]->(b) RETURN b.name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("b_name"), Some(&Value::String("Bob".into())));
}

// 7. MATCH, SET a property, verify the change through a fresh MATCH.
#[tokio::test]
async fn match_set_property() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute("CREATE (n:Person {name: 'Ada', age: 3})", PropertyMap::new())
            .await
            .success
    );

    let set = graph
        .execute("MATCH (n:Person) WHERE n.name = 'Ada' SET n.age = 4", PropertyMap::new())
        .await;
    assert!(set.success, "{:?}", set.error);
    assert_eq!(set.meta.changes, 1);

    let result = graph
        .execute("MATCH (n:Person) WHERE n.name = 'Ada' RETURN n.age", PropertyMap::new())
        .await;
    assert_eq!(result.data[0].get("n_age"), Some(&Value::Int(4)));
}

// 8. DETACH DELETE removes the node (and, if present, incident edges); a
// later MATCH no longer sees it.
#[tokio::test]
async fn detach_delete_removes_node() {
    let graph = new_graph().await;
    assert!(graph.execute("CREATE (n:Person {name: 'Ada'})", PropertyMap::new()).await.success);
    assert!(graph.execute("CREATE (n:Person {name: 'Bob'})", PropertyMap::new()).await.success);

    let delete = graph
        .execute("MATCH (n:Person) WHERE n.name = 'Ada' DETACH DELETE n", PropertyMap::new())
        .await;
    assert!(delete.success, "{:?}", delete.error);

    let result = graph.execute("MATCH (n:Person) RETURN n.name", PropertyMap::new()).await;
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("n_name"), Some(&Value::String("Bob".into())));
}

// 9. DELETE without DETACH fails, and without side effects, when the node
// still has incident edges (spec.md §8 invariant).
#[tokio::test]
async fn plain_delete_fails_with_incident_edges() {
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

    let delete = graph
        .execute("MATCH (a:Person {name: 'Alice'}) DELETE a", PropertyMap::new())
        .await;
    assert!(!delete.success, "deleting a node with incident edges should fail");

    let result = graph.execute("MATCH (n:Person) RETURN n", PropertyMap::new()).await;
    assert_eq!(result.data.len(), 2, "failed DELETE must not remove the node");
}

// 10. RETURN multiple projected properties in one row.
#[tokio::test]
async fn return_multiple_columns() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute("CREATE (n:Person {name: 'Ada', age: 3})", PropertyMap::new())
            .await
            .success
    );

    let result = graph
        .execute("MATCH (n:Person) RETURN n.name, n.age", PropertyMap::new())
        .await;
    assert!(result.success);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("n_name"), Some(&Value::String("Ada".into())));
    assert_eq!(result.data[0].get("n_age"), Some(&Value::Int(3)));
}

// 11. Query parameters bind through `$name`.
#[tokio::test]
async fn query_parameters_bind() {
    let graph = new_graph().await;
    assert!(
        graph
            .execute("CREATE (n:Person {name: 'Ada'})", PropertyMap::new())
            .await
            .success
    );

    let mut params = PropertyMap::new();
    params.insert("name".into(), Value::String("Ada".into()));
    let result = graph
        .execute("MATCH (n:Person {name: $name}) RETURN n.name", params)
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("n_name"), Some(&Value::String("Ada".into())));
}

// 12. The convenience facade (spec.md §6) builds the equivalent Cypher text.
#[tokio::test]
async fn facade_create_get_update_delete() {
    let graph = new_graph().await;

    let mut props = PropertyMap::new();
    props.insert("name".into(), Value::from("Ada"));
    let created = graph.create_node("Person", props).await;
    assert!(created.success, "{:?}", created.error);
    let id = match created.data[0].get("n") {
        Some(Value::Node(n)) => n.id.as_str().to_string(),
        other => panic!("{other:?}"),
    };

    let fetched = graph.get_node(&id).await;
    assert!(fetched.success);
    assert_eq!(fetched.data.len(), 1);

    let mut update_props = PropertyMap::new();
    update_props.insert("age".into(), Value::from(5));
    let updated = graph.update_node(&id, update_props).await;
    assert!(updated.success, "{:?}", updated.error);
    match updated.data[0].get("n") {
        Some(Value::Node(n)) => assert_eq!(n.properties.get("age"), Some(&Value::Int(5))),
        other => panic!("{other:?}"),
    }

    let deleted = graph.delete_node(&id).await;
    assert!(deleted.success, "{:?}", deleted.error);

    let gone = graph.get_node(&id).await;
    assert_eq!(gone.data.len(), 0);
}

// 13. Parse errors surface inside `ExecutionResult`, never as a panic or `Err`.
#[tokio::test]
async fn syntax_error_surfaces_in_result() {
    let graph = new_graph().await;
    let result = graph.execute("MATCH (n:Person RETURN n", PropertyMap::new()).await;
    assert!(!result.success);
    let err = result.error.unwrap();
    assert!(err.position.is_some());
    assert!(err.line.is_some());
    assert!(err.column.is_some());
}

#[tokio::test]
async fn empty_query_is_a_syntax_error() {
    let graph = new_graph().await;
    let result = graph.execute("", PropertyMap::new()).await;
    assert!(!result.success);
    assert_eq!(result.error.unwrap().message, "Empty query");
}
