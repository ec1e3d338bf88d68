//! Aggregation, grouping, DISTINCT and result-ordering tests (spec.md
//! §4.3.4 aggregates, §4.3.2 RETURN/WITH, §8 invariants).

use neo4j_rs::{Graph, PropertyMap, SqliteStore, Value};

async fn setup_people() -> Graph<SqliteStore> {
    let graph = Graph::open_memory().await.unwrap();
    for (name, age) in [("Alice", 25), ("Bob", 30), ("Charlie", 35), ("Diana", 28), ("Eve", 22)] {
        let q = format!("CREATE (n:Person {{name: '{name}', age: {age}}})");
        assert!(graph.execute(&q, PropertyMap::new()).await.success);
    }
    graph
}

fn string_col(row: &neo4j_rs::ResultRow, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        other => panic!("{key}: expected string, got {other:?}"),
    }
}

fn int_col(row: &neo4j_rs::ResultRow, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Int(i)) => *i,
        other => panic!("{key}: expected int, got {other:?}"),
    }
}

#[tokio::test]
async fn count_all_nodes() {
    let graph = setup_people().await;
    let result = graph.execute("MATCH (n:Person) RETURN count(n)", PropertyMap::new()).await;
    assert!(result.success);
    assert_eq!(result.data[0].get("count"), Some(&Value::Int(5)));
}

#[tokio::test]
async fn count_with_where_filter() {
    let graph = setup_people().await;
    let result = graph
        .execute("MATCH (n:Person) WHERE n.age > 27 RETURN count(n)", PropertyMap::new())
        .await;
    assert!(result.success);
    // Bob(30), Charlie(35), Diana(28)
    assert_eq!(result.data[0].get("count"), Some(&Value::Int(3)));
}

#[tokio::test]
async fn sum_aggregate() {
    let graph = Graph::open_memory().await.unwrap();
    for (name, price) in [("Widget", 10), ("Gadget", 25), ("Doohickey", 15)] {
        let q = format!("CREATE (n:Item {{name: '{name}', price: {price}}})");
        assert!(graph.execute(&q, PropertyMap::new()).await.success);
    }

    let result = graph.execute("MATCH (n:Item) RETURN sum(n.price)", PropertyMap::new()).await;
    assert!(result.success);
    assert_eq!(result.data[0].get("sum"), Some(&Value::Int(50)));
}

#[tokio::test]
async fn sum_on_empty_result_is_zero() {
    let graph = Graph::open_memory().await.unwrap();
    let result = graph.execute("MATCH (n:Item) RETURN sum(n.price)", PropertyMap::new()).await;
    assert!(result.success);
    assert_eq!(result.data.len(), 1, "sum() on empty input still yields one row");
    assert_eq!(result.data[0].get("sum"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn count_on_empty_result_is_zero() {
    let graph = Graph::open_memory().await.unwrap();
    let result = graph.execute("MATCH (n:Person) RETURN count(n)", PropertyMap::new()).await;
    assert!(result.success);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].get("count"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn distinct_removes_duplicate_rows() {
    let graph = Graph::open_memory().await.unwrap();
    for name in ["Alice", "Alice", "Bob", "Bob", "Charlie"] {
        let q = format!("CREATE (n:Person {{name: '{name}'}})");
        assert!(graph.execute(&q, PropertyMap::new()).await.success);
    }

    let result = graph
        .execute("MATCH (n:Person) RETURN DISTINCT n.name", PropertyMap::new())
        .await;
    assert!(result.success);
    let mut names: Vec<String> = result.data.iter().map(|r| string_col(r, "n_name")).collect();
    names.sort();
    assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
}

#[tokio::test]
async fn count_distinct_counts_unique_values() {
    let graph = Graph::open_memory().await.unwrap();
    graph.execute("CREATE (n:Person {name: 'Alice', dept: 'Eng'})", PropertyMap::new()).await;
    graph.execute("CREATE (n:Person {name: 'Bob', dept: 'Eng'})", PropertyMap::new()).await;
    graph.execute("CREATE (n:Person {name: 'Charlie', dept: 'Sales'})", PropertyMap::new()).await;

    let result = graph
        .execute("MATCH (n:Person) RETURN count(DISTINCT n.dept)", PropertyMap::new())
        .await;
    assert!(result.success);
    assert_eq!(result.data[0].get("count"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn order_by_ascending_default() {
    let graph = setup_people().await;
    let result = graph
        .execute("MATCH (n:Person) RETURN n.name ORDER BY n.name", PropertyMap::new())
        .await;
    assert!(result.success);
    let names: Vec<String> = result.data.iter().map(|r| string_col(r, "n_name")).collect();
    assert_eq!(names, vec!["Alice", "Bob", "Charlie", "Diana", "Eve"]);
}

#[tokio::test]
async fn order_by_descending() {
    let graph = setup_people().await;
    let result = graph
        .execute("MATCH (n:Person) RETURN n.name ORDER BY n.name DESC", PropertyMap::new())
        .await;
    assert!(result.success);
    let names: Vec<String> = result.data.iter().map(|r| string_col(r, "n_name")).collect();
    assert_eq!(names, vec!["Eve", "Diana", "Charlie", "Bob", "Alice"]);
}

#[tokio::test]
async fn order_by_numeric_field() {
    let graph = setup_people().await;
    let result = graph
        .execute("MATCH (n:Person) RETURN n.age ORDER BY n.age", PropertyMap::new())
        .await;
    assert!(result.success);
    let ages: Vec<i64> = result.data.iter().map(|r| int_col(r, "n_age")).collect();
    assert_eq!(ages, vec![22, 25, 28, 30, 35]);
}

#[tokio::test]
async fn order_by_with_limit_is_top_n() {
    let graph = setup_people().await;
    let result = graph
        .execute(
            "MATCH (n:Person) RETURN n.name, n.age ORDER BY n.age DESC LIMIT 2",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.data.len(), 2);
    assert_eq!(string_col(&result.data[0], "n_name"), "Charlie");
    assert_eq!(int_col(&result.data[0], "n_age"), 35);
    assert_eq!(string_col(&result.data[1], "n_name"), "Bob");
    assert_eq!(int_col(&result.data[1], "n_age"), 30);
}

// SKIP m then LIMIT n paginates rows [m, m+n) (spec.md §8 invariant).
#[tokio::test]
async fn skip_then_limit_paginates() {
    let graph = setup_people().await;
    let ordered = graph
        .execute("MATCH (n:Person) RETURN n.name ORDER BY n.name", PropertyMap::new())
        .await;
    let all_names: Vec<String> = ordered.data.iter().map(|r| string_col(r, "n_name")).collect();

    let result = graph
        .execute(
            "MATCH (n:Person) RETURN n.name ORDER BY n.name SKIP 2 LIMIT 2",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.data.len(), 2);
    let page: Vec<String> = result.data.iter().map(|r| string_col(r, "n_name")).collect();
    assert_eq!(page, all_names[2..4]);
}

#[tokio::test]
async fn limit_alone_caps_row_count() {
    let graph = setup_people().await;
    let result = graph.execute("MATCH (n:Person) RETURN n LIMIT 3", PropertyMap::new()).await;
    assert_eq!(result.data.len(), 3);
}

#[tokio::test]
async fn skip_alone_drops_leading_rows() {
    let graph = setup_people().await;
    let result = graph.execute("MATCH (n:Person) RETURN n SKIP 3", PropertyMap::new()).await;
    assert_eq!(result.data.len(), 2, "5 total - 3 skipped = 2 remaining");
}

#[tokio::test]
async fn collect_aggregate() {
    let graph = Graph::open_memory().await.unwrap();
    for name in ["Alice", "Bob", "Charlie"] {
        let q = format!("CREATE (n:Person {{name: '{name}'}})");
        graph.execute(&q, PropertyMap::new()).await;
    }

    let result = graph
        .execute("MATCH (n:Person) RETURN collect(n.name)", PropertyMap::new())
        .await;
    assert!(result.success);
    let collected = match result.data[0].get("collect") {
        Some(Value::List(items)) => items.clone(),
        other => panic!("{other:?}"),
    };
    assert_eq!(collected.len(), 3);
    let names: Vec<&str> = collected.iter().filter_map(|v| v.as_str()).collect();
    assert!(names.contains(&"Alice"));
    assert!(names.contains(&"Bob"));
    assert!(names.contains(&"Charlie"));
}

#[tokio::test]
async fn min_and_max_aggregates() {
    let graph = setup_people().await;
    let min = graph.execute("MATCH (n:Person) RETURN min(n.age)", PropertyMap::new()).await;
    assert_eq!(min.data[0].get("min"), Some(&Value::Int(22)));

    let max = graph.execute("MATCH (n:Person) RETURN max(n.age)", PropertyMap::new()).await;
    assert_eq!(max.data[0].get("max"), Some(&Value::Int(35)));
}

#[tokio::test]
async fn avg_aggregate() {
    let graph = setup_people().await;
    let result = graph.execute("MATCH (n:Person) RETURN avg(n.age)", PropertyMap::new()).await;
    assert!(result.success);
    match result.data[0].get("avg") {
        Some(Value::Float(f)) => assert!((*f - 28.0).abs() < 0.001, "expected avg 28.0, got {f}"),
        other => panic!("{other:?}"),
    }
}

#[tokio::test]
async fn multiple_aggregates_in_one_return() {
    let graph = setup_people().await;
    let result = graph
        .execute("MATCH (n:Person) RETURN count(n), min(n.age), max(n.age)", PropertyMap::new())
        .await;
    assert!(result.success);
    assert_eq!(result.data[0].get("count"), Some(&Value::Int(5)));
    assert_eq!(result.data[0].get("min"), Some(&Value::Int(22)));
    assert_eq!(result.data[0].get("max"), Some(&Value::Int(35)));
}

// Implicit grouping: a non-aggregate projection alongside an aggregate
// groups by the non-aggregate column (spec.md §4.3.2).
#[tokio::test]
async fn implicit_grouping_by_non_aggregate_column() {
    let graph = Graph::open_memory().await.unwrap();
    for (name, dept) in [("Alice", "Eng"), ("Bob", "Eng"), ("Charlie", "Sales")] {
        let q = format!("CREATE (n:Person {{name: '{name}', dept: '{dept}'}})");
        graph.execute(&q, PropertyMap::new()).await;
    }

    let result = graph
        .execute("MATCH (n:Person) RETURN n.dept, count(n)", PropertyMap::new())
        .await;
    assert!(result.success);
    assert_eq!(result.data.len(), 2, "one group per distinct n.dept");
    for row in &result.data {
        let dept = string_col(row, "n_dept");
        let count = int_col(row, "count");
        match dept.as_str() {
            "Eng" => assert_eq!(count, 2),
            "Sales" => assert_eq!(count, 1),
            other => panic!("unexpected dept {other}"),
        }
    }
}

// collect(x) then UNWIND ... AS y RETURN y yields the same multiset back
// (spec.md §8 round-trip law).
#[tokio::test]
async fn collect_then_unwind_round_trips() {
    let graph = setup_people().await;
    let collected = graph
        .execute("MATCH (n:Person) RETURN collect(n.name) AS names", PropertyMap::new())
        .await;
    assert!(collected.success);

    let result = graph
        .execute(
            "MATCH (n:Person) WITH collect(n.name) AS names UNWIND names AS name RETURN name",
            PropertyMap::new(),
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    let mut names: Vec<String> = result
        .data
        .iter()
        .map(|r| match r.get("name") {
            Some(Value::String(s)) => s.clone(),
            other => panic!("{other:?}"),
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["Alice", "Bob", "Charlie", "Diana", "Eve"]);
}
