//! Compiles CREATE/SET/REMOVE/DELETE clause bodies into parameterised SQL,
//! mutating the in-flight row's bound values to match so later clauses in
//! the same query see fresh data without re-reading the store.

use crate::cypher::ast::{NodePattern, Pattern, PatternDirection, PatternElement, RelPattern, RemoveItem, SetItem};
use crate::model::{Node, NodeId, PropertyMap, RelId, Relationship, Value};
use crate::{Error, Result};

use super::expr::{eval_expr, Row};

fn join_label(labels: &[String]) -> String {
    labels.join(":")
}

fn build_node_value(np: &NodePattern, row: &Row, params: &PropertyMap) -> Result<Node> {
    let mut node = Node::new(NodeId::new(), join_label(&np.labels));
    for (k, e) in &np.properties {
        node.properties.insert(k.clone(), eval_expr(e, row, params)?);
    }
    Ok(node)
}

fn build_rel_value(rp: &RelPattern, src: NodeId, dst: NodeId, row: &Row, params: &PropertyMap) -> Result<Relationship> {
    let rel_type = rp.rel_types.first().cloned().unwrap_or_default();
    let mut rel = Relationship::new(RelId::new(), src, dst, rel_type);
    for (k, e) in &rp.properties {
        rel.properties.insert(k.clone(), eval_expr(e, row, params)?);
    }
    Ok(rel)
}

fn insert_node_sql(node: &Node) -> (String, Vec<Value>) {
    (
        "INSERT INTO nodes (id, label, properties) VALUES (?, ?, json(?))".to_string(),
        vec![
            Value::String(node.id.as_str().to_string()),
            Value::String(node.label.clone()),
            Value::String(Value::Map(node.properties.clone()).to_json().to_string()),
        ],
    )
}

fn insert_rel_sql(rel: &Relationship) -> (String, Vec<Value>) {
    (
        "INSERT INTO edges (id, type, source_id, target_id, properties) VALUES (?, ?, ?, ?, json(?))".to_string(),
        vec![
            Value::String(rel.id.as_str().to_string()),
            Value::String(rel.rel_type.clone()),
            Value::String(rel.src.as_str().to_string()),
            Value::String(rel.dst.as_str().to_string()),
            Value::String(Value::Map(rel.properties.clone()).to_json().to_string()),
        ],
    )
}

/// Compile a CREATE pattern. Variables already bound in `row` (reused from
/// an earlier clause) are not re-inserted, only referenced as edge
/// endpoints; newly created nodes/relationships are written into `row`
/// under their alias, if named.
pub fn compile_create(pattern: &Pattern, row: &mut Row, params: &PropertyMap) -> Result<Vec<(String, Vec<Value>)>> {
    let mut statements = Vec::new();
    let mut prev_id: Option<NodeId> = None;
    let mut i = 0;
    while i < pattern.elements.len() {
        match &pattern.elements[i] {
            PatternElement::Node(np) => {
                let id = create_or_reuse_node(np, row, params, &mut statements)?;
                prev_id = Some(id);
                i += 1;
            }
            PatternElement::Relationship(rp) => {
                let next_np = match pattern.elements.get(i + 1) {
                    Some(PatternElement::Node(n)) => n,
                    _ => return Err(Error::SemanticError("relationship without a following node".into())),
                };
                let prev = prev_id.clone().ok_or_else(|| {
                    Error::SemanticError("relationship without a preceding node".into())
                })?;
                let next_id = create_or_reuse_node(next_np, row, params, &mut statements)?;
                let (src, dst) = match rp.direction {
                    PatternDirection::Left => (next_id.clone(), prev.clone()),
                    _ => (prev.clone(), next_id.clone()),
                };
                let rel = build_rel_value(rp, src, dst, row, params)?;
                statements.push(insert_rel_sql(&rel));
                if let Some(v) = &rp.alias {
                    row.insert(v.clone(), Value::Relationship(Box::new(rel)));
                }
                prev_id = Some(next_id);
                i += 2;
            }
        }
    }
    Ok(statements)
}

fn create_or_reuse_node(
    np: &NodePattern,
    row: &mut Row,
    params: &PropertyMap,
    statements: &mut Vec<(String, Vec<Value>)>,
) -> Result<NodeId> {
    if let Some(v) = &np.alias {
        if let Some(Value::Node(n)) = row.get(v) {
            return Ok(n.id.clone());
        }
    }
    let node = build_node_value(np, row, params)?;
    statements.push(insert_node_sql(&node));
    let id = node.id.clone();
    if let Some(v) = &np.alias {
        row.insert(v.clone(), Value::Node(Box::new(node)));
    }
    Ok(id)
}

fn node_id(row: &Row, var: &str) -> Result<NodeId> {
    match row.get(var) {
        Some(Value::Node(n)) => Ok(n.id.clone()),
        Some(other) => Err(Error::TypeError { expected: "node".into(), got: other.type_name().into() }),
        None => Err(Error::SemanticError(format!("unknown variable: {var}"))),
    }
}

enum TargetKind {
    Node,
    Relationship,
}

fn target_kind(row: &Row, var: &str) -> Result<TargetKind> {
    match row.get(var) {
        Some(Value::Node(_)) => Ok(TargetKind::Node),
        Some(Value::Relationship(_)) => Ok(TargetKind::Relationship),
        Some(other) => Err(Error::TypeError { expected: "node or relationship".into(), got: other.type_name().into() }),
        None => Err(Error::SemanticError(format!("unknown variable: {var}"))),
    }
}

fn target_id(row: &Row, var: &str) -> Result<String> {
    match row.get(var) {
        Some(Value::Node(n)) => Ok(n.id.as_str().to_string()),
        Some(Value::Relationship(r)) => Ok(r.id.as_str().to_string()),
        Some(other) => Err(Error::TypeError { expected: "node or relationship".into(), got: other.type_name().into() }),
        None => Err(Error::SemanticError(format!("unknown variable: {var}"))),
    }
}

/// Compile SET assignments; each item both yields an UPDATE statement and
/// mutates the row's bound value in place so later RETURN in the same
/// query sees the new property without a re-fetch.
pub fn compile_set_items(
    items: &[SetItem],
    row: &mut Row,
    params: &PropertyMap,
) -> Result<Vec<(String, Vec<Value>)>> {
    let mut statements = Vec::new();
    for item in items {
        match item {
            SetItem::Property { variable, key, value } => {
                let val = eval_expr(value, row, params)?;
                let table = match target_kind(row, variable)? {
                    TargetKind::Node => "nodes",
                    TargetKind::Relationship => "edges",
                };
                let id = target_id(row, variable)?;
                statements.push((
                    format!("UPDATE {table} SET properties = json_set(properties, '$.{key}', json(?)) WHERE id = ?"),
                    vec![Value::String(val.to_json().to_string()), Value::String(id)],
                ));
                match row.get_mut(variable) {
                    Some(Value::Node(n)) => {
                        n.properties.insert(key.clone(), val);
                    }
                    Some(Value::Relationship(r)) => {
                        r.properties.insert(key.clone(), val);
                    }
                    _ => {}
                }
            }
            SetItem::AllProperties { variable, value } => {
                let val = eval_expr(value, row, params)?;
                let map = match &val {
                    Value::Map(m) => m.clone(),
                    other => {
                        return Err(Error::TypeError {
                            expected: "map".into(),
                            got: other.type_name().into(),
                        })
                    }
                };
                let table = match target_kind(row, variable)? {
                    TargetKind::Node => "nodes",
                    TargetKind::Relationship => "edges",
                };
                let id = target_id(row, variable)?;
                statements.push((
                    format!("UPDATE {table} SET properties = ? WHERE id = ?"),
                    vec![Value::String(val.to_json().to_string()), Value::String(id)],
                ));
                match row.get_mut(variable) {
                    Some(Value::Node(n)) => n.properties = map,
                    Some(Value::Relationship(r)) => r.properties = map,
                    _ => {}
                }
            }
            SetItem::Label { variable, label } => {
                let id = node_id(row, variable)?;
                let new_label = match row.get(variable) {
                    Some(Value::Node(n)) if n.label.split(':').any(|l| l == label) => n.label.clone(),
                    Some(Value::Node(n)) if n.label.is_empty() => label.clone(),
                    Some(Value::Node(n)) => format!("{}:{}", n.label, label),
                    _ => label.clone(),
                };
                statements.push((
                    "UPDATE nodes SET label = ? WHERE id = ?".to_string(),
                    vec![Value::String(new_label.clone()), Value::String(id.as_str().to_string())],
                ));
                if let Some(Value::Node(n)) = row.get_mut(variable) {
                    n.label = new_label;
                }
            }
        }
    }
    Ok(statements)
}

/// Compile REMOVE items. Single-label model: removing the current label
/// clears it to the empty string rather than tracking a label set.
pub fn compile_remove_items(items: &[RemoveItem], row: &mut Row) -> Result<Vec<(String, Vec<Value>)>> {
    let mut statements = Vec::new();
    for item in items {
        match item {
            RemoveItem::Property { variable, key } => {
                let table = match target_kind(row, variable)? {
                    TargetKind::Node => "nodes",
                    TargetKind::Relationship => "edges",
                };
                let id = target_id(row, variable)?;
                statements.push((
                    format!("UPDATE {table} SET properties = json_remove(properties, '$.{key}') WHERE id = ?"),
                    vec![Value::String(id)],
                ));
                match row.get_mut(variable) {
                    Some(Value::Node(n)) => {
                        n.properties.remove(key);
                    }
                    Some(Value::Relationship(r)) => {
                        r.properties.remove(key);
                    }
                    _ => {}
                }
            }
            RemoveItem::Label { variable, label } => {
                let id = node_id(row, variable)?;
                let new_label = match row.get(variable) {
                    Some(Value::Node(n)) => n
                        .label
                        .split(':')
                        .filter(|l| l != label)
                        .collect::<Vec<_>>()
                        .join(":"),
                    _ => String::new(),
                };
                statements.push((
                    "UPDATE nodes SET label = ? WHERE id = ?".to_string(),
                    vec![Value::String(new_label.clone()), Value::String(id.as_str().to_string())],
                ));
                if let Some(Value::Node(n)) = row.get_mut(variable) {
                    n.label = new_label;
                }
            }
        }
    }
    Ok(statements)
}

/// Compile DELETE / DETACH DELETE. Referential integrity for a plain DELETE
/// on a node with incident edges is enforced by the store's own foreign-key
/// constraint — no Rust-side pre-check is needed, the INSERT/DELETE simply
/// fails and the transaction rolls back.
///
/// Relationship deletes are always emitted before node deletes, regardless
/// of the order `variables` names them in. Without this, `DELETE a, r` where
/// `r` is an edge incident to `a` would try to delete the node first and
/// hit the FK constraint even though `r` is being deleted in the same
/// clause.
pub fn compile_delete(detach: bool, variables: &[String], row: &Row) -> Result<Vec<(String, Vec<Value>)>> {
    let mut rel_statements = Vec::new();
    let mut node_statements = Vec::new();
    for var in variables {
        let id = target_id(row, var)?;
        match target_kind(row, var)? {
            TargetKind::Node => {
                if detach {
                    rel_statements.push((
                        "DELETE FROM edges WHERE source_id = ? OR target_id = ?".to_string(),
                        vec![Value::String(id.clone()), Value::String(id.clone())],
                    ));
                }
                node_statements.push(("DELETE FROM nodes WHERE id = ?".to_string(), vec![Value::String(id)]));
            }
            TargetKind::Relationship => {
                rel_statements.push(("DELETE FROM edges WHERE id = ?".to_string(), vec![Value::String(id)]));
            }
        }
    }
    rel_statements.extend(node_statements);
    Ok(rel_statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher::parse;
    use crate::cypher::ast::Clause;

    #[test]
    fn compile_create_emits_node_insert() {
        let stmt = parse("CREATE (n:Person {name: 'Alice'})").unwrap();
        let c = match &stmt.first.clauses[0] {
            Clause::Create(c) => c,
            _ => panic!(),
        };
        let mut row = Row::new();
        let params = PropertyMap::new();
        let stmts = compile_create(&c.patterns[0], &mut row, &params).unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].0.contains("INSERT INTO nodes"));
        assert!(matches!(row.get("n"), Some(Value::Node(_))));
    }

    #[test]
    fn compile_set_updates_row_in_place() {
        let node = Node::new(NodeId::new(), "Person");
        let mut row = Row::new();
        row.insert("n".into(), Value::Node(Box::new(node)));
        let items = vec![SetItem::Property {
            variable: "n".into(),
            key: "age".into(),
            value: crate::cypher::ast::Expr::Literal(crate::cypher::ast::Literal::Int(30)),
        }];
        let params = PropertyMap::new();
        let stmts = compile_set_items(&items, &mut row, &params).unwrap();
        assert_eq!(stmts.len(), 1);
        match row.get("n") {
            Some(Value::Node(n)) => assert_eq!(n.properties.get("age"), Some(&Value::Int(30))),
            _ => panic!(),
        }
    }
}
