//! MERGE: match-or-create, driven by the store's own affected-row count.
//!
//! Each node/relationship in the pattern gets an `INSERT ... WHERE NOT
//! EXISTS (...)` attempt; `changes()` tells us whether that element was
//! just created or already existed. If any element in the pattern had to be
//! created, the whole MERGE counts as "created" and `ON CREATE SET` runs;
//! otherwise `ON MATCH SET` runs. This mirrors the ordering constraint in
//! spec.md §5: the `changes()` probe must happen before any ON-branch
//! decision.

use crate::cypher::ast::{MergeClause, NodePattern, Pattern, PatternDirection, PatternElement, RelPattern};
use crate::model::{Node, NodeId, PropertyMap, RelId, Relationship, Value};
use crate::planner::clause::{self};
use crate::planner::expr::{eval_expr, Row};
use crate::planner::scope::Scope;
use crate::storage::Store;
use crate::{Error, Result};

pub async fn execute_merge<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    m: &MergeClause,
    rows: Vec<Row>,
    _scope: &mut Scope,
    params: &PropertyMap,
) -> Result<(Vec<Row>, usize)> {
    let mut out_rows = Vec::with_capacity(rows.len());
    let mut changes = 0usize;
    for mut row in rows {
        let created = merge_pattern(store, tx, &m.pattern, &mut row, params, &mut changes).await?;
        let set_items = if created { &m.on_create } else { &m.on_match };
        if !set_items.is_empty() {
            let stmts = clause::compile_set_items(set_items, &mut row, params)?;
            for (sql, bind) in stmts {
                let r = store.execute(tx, &sql, &bind).await?;
                changes += r.changes;
            }
        }
        out_rows.push(row);
    }
    Ok((out_rows, changes))
}

async fn merge_pattern<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    pattern: &Pattern,
    row: &mut Row,
    params: &PropertyMap,
    changes: &mut usize,
) -> Result<bool> {
    let mut any_created = false;
    let mut prev_id: Option<NodeId> = None;
    let mut i = 0;
    while i < pattern.elements.len() {
        match &pattern.elements[i] {
            PatternElement::Node(np) => {
                let (id, created) = merge_node(store, tx, np, row, params, changes).await?;
                any_created |= created;
                prev_id = Some(id);
                i += 1;
            }
            PatternElement::Relationship(rp) => {
                let next_np = match pattern.elements.get(i + 1) {
                    Some(PatternElement::Node(n)) => n,
                    _ => return Err(Error::SemanticError("relationship without a following node".into())),
                };
                let prev = prev_id
                    .clone()
                    .ok_or_else(|| Error::SemanticError("relationship without a preceding node".into()))?;
                let (next_id, next_created) = merge_node(store, tx, next_np, row, params, changes).await?;
                any_created |= next_created;
                let (src, dst) = match rp.direction {
                    PatternDirection::Left => (next_id.clone(), prev.clone()),
                    _ => (prev.clone(), next_id.clone()),
                };
                let rel_created = merge_rel(store, tx, rp, &src, &dst, row, params, changes).await?;
                any_created |= rel_created;
                prev_id = Some(next_id);
                i += 2;
            }
        }
    }
    Ok(any_created)
}

fn label_of(np: &NodePattern) -> String {
    np.labels.join(":")
}

async fn merge_node<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    np: &NodePattern,
    row: &mut Row,
    params: &PropertyMap,
    changes: &mut usize,
) -> Result<(NodeId, bool)> {
    if let Some(v) = &np.alias {
        if let Some(Value::Node(n)) = row.get(v) {
            return Ok((n.id.clone(), false));
        }
    }

    let label = label_of(np);
    let mut properties = PropertyMap::new();
    let mut match_preds = Vec::new();
    let mut match_bind = Vec::new();
    if !label.is_empty() {
        match_preds.push("label = ?".to_string());
        match_bind.push(Value::String(label.clone()));
    }
    for (key, expr) in &np.properties {
        let val = eval_expr(expr, row, params)?;
        match_preds.push(format!("json_extract(properties,'$.{key}') = ?"));
        match_bind.push(val.clone());
        properties.insert(key.clone(), val);
    }
    let where_not_exists = if match_preds.is_empty() {
        "0".to_string()
    } else {
        format!("SELECT 1 FROM nodes WHERE {}", match_preds.join(" AND "))
    };

    let id = NodeId::new();
    let insert_sql = format!(
        "INSERT INTO nodes (id, label, properties) SELECT ?, ?, json(?) WHERE NOT EXISTS ({where_not_exists})"
    );
    let mut insert_bind = vec![
        Value::String(id.as_str().to_string()),
        Value::String(label.clone()),
        Value::String(Value::Map(properties.clone()).to_json().to_string()),
    ];
    insert_bind.extend(match_bind.clone());

    let result = store.execute(tx, &insert_sql, &insert_bind).await?;
    *changes += result.changes;

    if result.changes > 0 {
        let node = Node { id: id.clone(), label, properties };
        if let Some(v) = &np.alias {
            row.insert(v.clone(), Value::Node(Box::new(node)));
        }
        return Ok((id, true));
    }

    let select_sql = format!(
        "SELECT id, label, properties -> '$' FROM nodes WHERE {}",
        if match_preds.is_empty() { "1 = 1".to_string() } else { match_preds.join(" AND ") }
    );
    let existing = store.execute(tx, &select_sql, &match_bind).await?;
    let cols = existing
        .rows
        .into_iter()
        .next()
        .ok_or_else(|| Error::ExecutionError("MERGE: no existing row found after a failed insert".into()))?;
    let existing_id = as_string(&cols[0])?;
    let existing_label = as_string(&cols[1])?;
    let existing_props = match &cols[2] {
        Value::Map(m) => m.clone(),
        _ => PropertyMap::new(),
    };
    let node_id = NodeId(existing_id);
    let node = Node { id: node_id.clone(), label: existing_label, properties: existing_props };
    if let Some(v) = &np.alias {
        row.insert(v.clone(), Value::Node(Box::new(node)));
    }
    Ok((node_id, false))
}

async fn merge_rel<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    rp: &RelPattern,
    src: &NodeId,
    dst: &NodeId,
    row: &mut Row,
    params: &PropertyMap,
    changes: &mut usize,
) -> Result<bool> {
    if let Some(v) = &rp.alias {
        if let Some(Value::Relationship(r)) = row.get(v) {
            if r.src == *src && r.dst == *dst {
                return Ok(false);
            }
        }
    }

    let rel_type = rp.rel_types.first().cloned().unwrap_or_default();
    let mut properties = PropertyMap::new();
    let mut match_preds = vec!["type = ?".to_string(), "source_id = ?".to_string(), "target_id = ?".to_string()];
    let mut match_bind = vec![
        Value::String(rel_type.clone()),
        Value::String(src.as_str().to_string()),
        Value::String(dst.as_str().to_string()),
    ];
    for (key, expr) in &rp.properties {
        let val = eval_expr(expr, row, params)?;
        match_preds.push(format!("json_extract(properties,'$.{key}') = ?"));
        match_bind.push(val.clone());
        properties.insert(key.clone(), val);
    }

    let id = RelId::new();
    let insert_sql = format!(
        "INSERT INTO edges (id, type, source_id, target_id, properties) \
         SELECT ?, ?, ?, ?, json(?) WHERE NOT EXISTS (SELECT 1 FROM edges WHERE {})",
        match_preds.join(" AND ")
    );
    let mut insert_bind = vec![
        Value::String(id.as_str().to_string()),
        Value::String(rel_type.clone()),
        Value::String(src.as_str().to_string()),
        Value::String(dst.as_str().to_string()),
        Value::String(Value::Map(properties.clone()).to_json().to_string()),
    ];
    insert_bind.extend(match_bind.clone());

    let result = store.execute(tx, &insert_sql, &insert_bind).await?;
    *changes += result.changes;

    if result.changes > 0 {
        let rel = Relationship { id, src: src.clone(), dst: dst.clone(), rel_type, properties };
        if let Some(v) = &rp.alias {
            row.insert(v.clone(), Value::Relationship(Box::new(rel)));
        }
        return Ok(true);
    }

    let select_sql = format!(
        "SELECT id, type, source_id, target_id, properties -> '$' FROM edges WHERE {}",
        match_preds.join(" AND ")
    );
    let existing = store.execute(tx, &select_sql, &match_bind).await?;
    let cols = existing
        .rows
        .into_iter()
        .next()
        .ok_or_else(|| Error::ExecutionError("MERGE: no existing edge found after a failed insert".into()))?;
    let rel = Relationship {
        id: RelId(as_string(&cols[0])?),
        rel_type: as_string(&cols[1])?,
        src: NodeId(as_string(&cols[2])?),
        dst: NodeId(as_string(&cols[3])?),
        properties: match &cols[4] {
            Value::Map(m) => m.clone(),
            _ => PropertyMap::new(),
        },
    };
    if let Some(v) = &rp.alias {
        row.insert(v.clone(), Value::Relationship(Box::new(rel)));
    }
    Ok(false)
}

fn as_string(v: &Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::TypeError { expected: "string column".into(), got: other.type_name().into() }),
    }
}
