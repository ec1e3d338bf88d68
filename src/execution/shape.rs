//! Converts raw SQL result columns into bound `Node`/`Relationship` values,
//! and null-pads rows for unmatched `OPTIONAL MATCH` patterns.

use crate::model::{Node, NodeId, PropertyMap, RelId, Relationship, Value};
use crate::planner::expr::Row;
use crate::planner::pattern::PatternBinding;
use crate::{Error, Result};

fn as_properties(v: Value) -> PropertyMap {
    match v {
        Value::Map(m) => m,
        _ => PropertyMap::new(),
    }
}

/// Merge one SQL result row into `row` according to `bindings`, producing a
/// new, extended row. Each `PatternBinding::Node` consumes 3 columns
/// (id, label, properties); each `PatternBinding::Relationship` consumes 5
/// (id, type, source_id, target_id, properties).
pub fn merge_bound_columns(row: &Row, bindings: &[PatternBinding], cols: Vec<Value>) -> Result<Row> {
    let mut out = row.clone();
    let mut i = 0;
    for binding in bindings {
        match binding {
            PatternBinding::Node { var, .. } => {
                let id = take_string(&cols, i)?;
                let label = take_string(&cols, i + 1)?;
                let properties = as_properties(cols.get(i + 2).cloned().unwrap_or(Value::Null));
                i += 3;
                if let Some(v) = var {
                    out.insert(v.clone(), Value::Node(Box::new(Node { id: NodeId(id), label, properties })));
                }
            }
            PatternBinding::Relationship { var, .. } => {
                let id = take_string(&cols, i)?;
                let rel_type = take_string(&cols, i + 1)?;
                let source_id = take_string(&cols, i + 2)?;
                let target_id = take_string(&cols, i + 3)?;
                let properties = as_properties(cols.get(i + 4).cloned().unwrap_or(Value::Null));
                i += 5;
                if let Some(v) = var {
                    out.insert(
                        v.clone(),
                        Value::Relationship(Box::new(Relationship {
                            id: RelId(id),
                            src: NodeId(source_id),
                            dst: NodeId(target_id),
                            rel_type,
                            properties,
                        })),
                    );
                }
            }
        }
    }
    Ok(out)
}

/// Extend `row` with `Value::Null` for every named alias a pattern
/// introduced, used when an `OPTIONAL MATCH` finds no rows.
pub fn null_pad(row: &Row, bindings: &[PatternBinding]) -> Row {
    let mut out = row.clone();
    for binding in bindings {
        let var = match binding {
            PatternBinding::Node { var, .. } => var,
            PatternBinding::Relationship { var, .. } => var,
        };
        if let Some(v) = var {
            out.insert(v.clone(), Value::Null);
        }
    }
    out
}

fn take_string(cols: &[Value], idx: usize) -> Result<String> {
    match cols.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::TypeError { expected: "string column".into(), got: other.type_name().into() }),
        None => Err(Error::ExecutionError(format!("missing result column at index {idx}"))),
    }
}
