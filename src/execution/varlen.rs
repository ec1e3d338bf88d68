//! Variable-length relationship traversal (`-[:TYPE*min..max]->`).
//!
//! A var-length step can't be expressed as one join, so
//! `planner::pattern::split_pattern_segments` carves it out of its
//! surrounding pattern as its own segment and the executor drives it
//! separately from here: an iterative, cycle-guarded breadth-first
//! expansion, one hop of SQL per iteration, driven by `compile_varlen_hop`.

use std::collections::HashSet;

use crate::cypher::ast::{NodePattern, Pattern, PatternDirection, PatternElement, RelPattern};
use crate::model::{Node, NodeId, PropertyMap, Value};
use crate::planner::expr::{eval_expr, Row};
use crate::planner::pattern::{compile_pattern_join, compile_varlen_hop};
use crate::planner::scope::Scope;
use crate::storage::Store;
use crate::{Error, Result};

/// Hops beyond which an unbounded `*` traversal stops, guarding against
/// runaway expansion on cyclic graphs.
const SAFETY_CAP: usize = 15;

pub async fn execute_varlen_match<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    start_np: &NodePattern,
    rp: &RelPattern,
    end_np: &NodePattern,
    scope: &mut Scope,
    row: &Row,
    params: &PropertyMap,
) -> Result<Vec<Row>> {
    let var_length = rp.var_length.expect("execute_varlen_match called on a fixed-length relationship");
    let min = var_length.min.unwrap_or(1).max(0);
    let max = var_length.max.unwrap_or(SAFETY_CAP).min(SAFETY_CAP);

    let start_pattern = Pattern { elements: vec![PatternElement::Node(start_np.clone())] };
    let compiled_start = compile_pattern_join(&start_pattern, scope, row, params)?;
    let start_result = store.execute(tx, &compiled_start.sql, &compiled_start.params).await?;

    let mut out_rows = Vec::new();
    for cols in start_result.rows {
        let base_row = crate::execution::shape::merge_bound_columns(row, &compiled_start.bindings, cols)?;
        let start_id = match start_np.alias.as_deref().and_then(|v| base_row.get(v)) {
            Some(Value::Node(n)) => n.id.as_str().to_string(),
            _ => continue,
        };

        if min == 0 {
            if let Some(end_row) = fetch_node_if_matches(store, tx, end_np, &start_id, &base_row, params).await? {
                out_rows.push(bind_end(&base_row, end_np, end_row));
            }
        }

        let mut frontier: Vec<String> = vec![start_id.clone()];
        let mut visited: HashSet<String> = HashSet::from([start_id]);
        let mut depth = 0usize;
        while depth < max && !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for node_id in &frontier {
                let (sql, bind) = compile_varlen_hop(rp, node_id);
                let hop = store.execute(tx, &sql, &bind).await?;
                for cols in hop.rows {
                    let source_id = as_string(&cols[2])?;
                    let target_id = as_string(&cols[3])?;
                    let next_id = match rp.direction {
                        PatternDirection::Right => target_id,
                        PatternDirection::Left => source_id,
                        PatternDirection::Both => {
                            if source_id == *node_id {
                                target_id
                            } else {
                                source_id
                            }
                        }
                    };
                    if visited.contains(&next_id) {
                        continue;
                    }
                    visited.insert(next_id.clone());
                    next_frontier.push(next_id);
                }
            }
            depth += 1;
            if depth >= min && depth <= max {
                for node_id in &next_frontier {
                    if let Some(end_row) = fetch_node_if_matches(store, tx, end_np, node_id, &base_row, params).await? {
                        out_rows.push(bind_end(&base_row, end_np, end_row));
                    }
                }
            }
            frontier = next_frontier;
        }
    }
    Ok(out_rows)
}

fn bind_end(base_row: &Row, end_np: &NodePattern, end_row: Node) -> Row {
    let mut merged = base_row.clone();
    if let Some(v) = &end_np.alias {
        merged.insert(v.clone(), Value::Node(Box::new(end_row)));
    }
    merged
}

fn as_string(v: &Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::TypeError { expected: "string column".into(), got: other.type_name().into() }),
    }
}

/// Fetch a node by id and check it against the end pattern's labels/properties.
async fn fetch_node_if_matches<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    np: &NodePattern,
    id: &str,
    row: &Row,
    params: &PropertyMap,
) -> Result<Option<Node>> {
    let mut sql = "SELECT id, label, properties -> '$' FROM nodes WHERE id = ?".to_string();
    let mut bind = vec![Value::String(id.to_string())];
    if !np.labels.is_empty() {
        sql.push_str(" AND label = ?");
        bind.push(Value::String(np.labels.join(":")));
    }
    for (key, expr) in &np.properties {
        sql.push_str(&format!(" AND json_extract(properties,'$.{key}') = ?"));
        bind.push(eval_expr(expr, row, params)?);
    }
    let result = store.execute(tx, &sql, &bind).await?;
    let Some(cols) = result.rows.into_iter().next() else {
        return Ok(None);
    };
    let id = as_string(&cols[0])?;
    let label = as_string(&cols[1])?;
    let properties = match &cols[2] {
        Value::Map(m) => m.clone(),
        _ => PropertyMap::new(),
    };
    Ok(Some(Node { id: NodeId(id), label, properties }))
}
