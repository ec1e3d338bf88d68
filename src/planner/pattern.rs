//! Pattern compilation: turns a Cypher `Pattern` into parameterised SQL
//! against `nodes`/`edges`, plus a description of which new variables the
//! result columns bind.
//!
//! Compilation is pure — it only builds SQL text and a parameter vector, it
//! never talks to the store. The one exception is reading values already
//! bound in the current row (`bound`), needed to pin a variable a previous
//! clause already matched; that's still a pure lookup, not I/O.

use std::collections::HashMap;

use crate::cypher::ast::{NodePattern, Pattern, PatternDirection, PatternElement, RelPattern};
use crate::model::Value;
use crate::{Error, Result};

use super::expr::{eval_expr, Row};
use super::scope::{Scope, VarKind};

/// One column group the compiled query returns, to be merged into the row.
#[derive(Debug, Clone)]
pub enum PatternBinding {
    Node { var: Option<String>, sql_alias: String },
    Relationship { var: Option<String>, sql_alias: String },
}

/// A pattern split at its variable-length steps. A fixed-length stretch
/// compiles to one SQL join; a variable-length step is driven iteratively
/// from the executor instead. `*` can appear on any relationship in a
/// chain, not only as the pattern's sole step — `(a)-[:R1]->(b)-[:R2*1..2]->(c)`
/// splits into `Fixed(a-R1-b)` then `VarLen(b, R2*1..2, c)`.
#[derive(Debug, Clone)]
pub enum PatternSegment {
    Fixed(Pattern),
    VarLen { start: NodePattern, rel: RelPattern, end: NodePattern },
}

/// Split a pattern into alternating fixed/variable-length segments. Adjacent
/// segments share their boundary node: a fixed segment binds it normally,
/// and the following variable-length segment pins it by id (or, if it's the
/// very first segment, matches it fresh) via the same `already_pinned`
/// machinery `compile_node_element` already uses for cross-clause variables.
pub fn split_pattern_segments(pattern: &Pattern) -> Result<Vec<PatternSegment>> {
    let mut segments = Vec::new();
    let mut current: Vec<PatternElement> = Vec::new();
    let mut i = 0;
    while i < pattern.elements.len() {
        match &pattern.elements[i] {
            PatternElement::Relationship(rp) if rp.var_length.is_some() => {
                let start_np = match current.last() {
                    Some(PatternElement::Node(n)) => n.clone(),
                    _ => return Err(Error::SemanticError("relationship without a preceding node".into())),
                };
                if current.len() > 1 {
                    segments.push(PatternSegment::Fixed(Pattern { elements: std::mem::take(&mut current) }));
                } else {
                    current.clear();
                }
                let end_np = match pattern.elements.get(i + 1) {
                    Some(PatternElement::Node(n)) => n.clone(),
                    _ => return Err(Error::SemanticError("relationship without a following node".into())),
                };
                segments.push(PatternSegment::VarLen { start: start_np, rel: rp.clone(), end: end_np.clone() });
                current.push(PatternElement::Node(end_np));
                i += 2;
            }
            other => {
                current.push(other.clone());
                i += 1;
            }
        }
    }
    if !current.is_empty() && (current.len() > 1 || segments.is_empty()) {
        segments.push(PatternSegment::Fixed(Pattern { elements: current }));
    }
    Ok(segments)
}

pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub bindings: Vec<PatternBinding>,
}

fn join_label(labels: &[String]) -> String {
    labels.join(":")
}

/// Evaluate a pattern's property map to concrete bind values. A property
/// expression may reference a variable an earlier pattern element in the
/// same clause already bound (e.g. `(a)-[:OWNS {tag: a.name}]->(x)`), so
/// this evaluates against the in-flight `bound` row, not an empty one.
fn property_predicates(
    sql_alias: &str,
    properties: &HashMap<String, crate::cypher::ast::Expr>,
    bound: &Row,
    params: &crate::model::PropertyMap,
    out_params: &mut Vec<Value>,
) -> Result<Vec<String>> {
    let mut preds = Vec::new();
    for (key, expr) in properties {
        let value = eval_expr(expr, bound, params)?;
        preds.push(format!("json_extract({sql_alias}.properties,'$.{key}') = ?"));
        out_params.push(value);
    }
    Ok(preds)
}

/// Compile a full join pattern (no variable-length step) into one SQL
/// SELECT. Every *new* node/relationship variable becomes a `PatternBinding`
/// whose columns appear, in order, in the SELECT list. Variables already
/// bound in `bound` are pinned via an equality predicate instead of being
/// re-selected.
pub fn compile_pattern_join(
    pattern: &Pattern,
    scope: &mut Scope,
    bound: &Row,
    params: &crate::model::PropertyMap,
) -> Result<CompiledQuery> {
    if pattern.elements.is_empty() {
        return Err(Error::SemanticError("empty pattern".into()));
    }

    let mut from_clauses = Vec::new();
    let mut where_preds = Vec::new();
    let mut bind_params = Vec::new();
    let mut select_cols = Vec::new();
    let mut bindings = Vec::new();
    let mut prev_node_alias: Option<String> = None;

    let mut i = 0;
    while i < pattern.elements.len() {
        match &pattern.elements[i] {
            PatternElement::Node(np) => {
                let alias = compile_node_element(
                    np,
                    scope,
                    bound,
                    params,
                    &mut from_clauses,
                    &mut where_preds,
                    &mut bind_params,
                    &mut select_cols,
                    &mut bindings,
                )?;
                prev_node_alias = Some(alias);
                i += 1;
            }
            PatternElement::Relationship(rp) => {
                if rp.var_length.is_some() {
                    return Err(Error::PlanError(
                        "variable-length relationships must be the sole step in a pattern".into(),
                    ));
                }
                let next_node = match pattern.elements.get(i + 1) {
                    Some(PatternElement::Node(n)) => n,
                    _ => return Err(Error::SemanticError("relationship without a following node".into())),
                };
                let prev = prev_node_alias.clone().ok_or_else(|| {
                    Error::SemanticError("relationship without a preceding node".into())
                })?;
                let rel_alias = compile_rel_element(
                    rp,
                    &prev,
                    scope,
                    bound,
                    params,
                    &mut from_clauses,
                    &mut where_preds,
                    &mut bind_params,
                    &mut select_cols,
                    &mut bindings,
                )?;
                let next_alias = compile_node_element(
                    next_node,
                    scope,
                    bound,
                    params,
                    &mut from_clauses,
                    &mut where_preds,
                    &mut bind_params,
                    &mut select_cols,
                    &mut bindings,
                )?;
                bind_rel_direction(&rel_alias, &prev, &next_alias, rp.direction, &mut where_preds);
                prev_node_alias = Some(next_alias);
                i += 2;
            }
        }
    }

    let select = if select_cols.is_empty() {
        "1".to_string()
    } else {
        select_cols.join(", ")
    };
    let mut sql = format!("SELECT {select} FROM {}", from_clauses.join(", "));
    if !where_preds.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_preds.join(" AND "));
    }

    Ok(CompiledQuery { sql, params: bind_params, bindings })
}

#[allow(clippy::too_many_arguments)]
fn compile_node_element(
    np: &NodePattern,
    scope: &mut Scope,
    bound: &Row,
    params: &crate::model::PropertyMap,
    from_clauses: &mut Vec<String>,
    where_preds: &mut Vec<String>,
    bind_params: &mut Vec<Value>,
    select_cols: &mut Vec<String>,
    bindings: &mut Vec<PatternBinding>,
) -> Result<String> {
    let already_pinned = np.alias.as_deref().map(|v| bound.contains_key(v)).unwrap_or(false);
    let sql_alias = scope.fresh_alias("n");
    from_clauses.push(format!("nodes {sql_alias}"));

    if already_pinned {
        let var = np.alias.as_ref().unwrap();
        let id = match bound.get(var) {
            Some(Value::Node(n)) => n.id.as_str().to_string(),
            Some(other) => return Err(Error::TypeError {
                expected: "node".into(),
                got: other.type_name().into(),
            }),
            None => unreachable!(),
        };
        where_preds.push(format!("{sql_alias}.id = ?"));
        bind_params.push(Value::String(id));
    } else {
        if !np.labels.is_empty() {
            where_preds.push(format!("{sql_alias}.label = ?"));
            bind_params.push(Value::String(join_label(&np.labels)));
        }
        where_preds.extend(property_predicates(&sql_alias, &np.properties, bound, params, bind_params)?);
        select_cols.push(format!("{sql_alias}.id"));
        select_cols.push(format!("{sql_alias}.label"));
        select_cols.push(format!("{sql_alias}.properties -> '$'"));
        bindings.push(PatternBinding::Node { var: np.alias.clone(), sql_alias: sql_alias.clone() });
        if let Some(v) = &np.alias {
            scope.bind(v, VarKind::Node);
        }
    }
    Ok(sql_alias)
}

#[allow(clippy::too_many_arguments)]
fn compile_rel_element(
    rp: &RelPattern,
    _prev_node_alias: &str,
    scope: &mut Scope,
    bound: &Row,
    params: &crate::model::PropertyMap,
    from_clauses: &mut Vec<String>,
    where_preds: &mut Vec<String>,
    bind_params: &mut Vec<Value>,
    select_cols: &mut Vec<String>,
    bindings: &mut Vec<PatternBinding>,
) -> Result<String> {
    let already_pinned = rp.alias.as_deref().map(|v| bound.contains_key(v)).unwrap_or(false);
    let sql_alias = scope.fresh_alias("e");
    from_clauses.push(format!("edges {sql_alias}"));

    if already_pinned {
        let var = rp.alias.as_ref().unwrap();
        let id = match bound.get(var) {
            Some(Value::Relationship(r)) => r.id.as_str().to_string(),
            Some(other) => return Err(Error::TypeError {
                expected: "relationship".into(),
                got: other.type_name().into(),
            }),
            None => unreachable!(),
        };
        where_preds.push(format!("{sql_alias}.id = ?"));
        bind_params.push(Value::String(id));
    } else {
        if !rp.rel_types.is_empty() {
            let placeholders = vec!["?"; rp.rel_types.len()].join(", ");
            where_preds.push(format!("{sql_alias}.type IN ({placeholders})"));
            for t in &rp.rel_types {
                bind_params.push(Value::String(t.clone()));
            }
        }
        where_preds.extend(property_predicates(&sql_alias, &rp.properties, bound, params, bind_params)?);
        select_cols.push(format!("{sql_alias}.id"));
        select_cols.push(format!("{sql_alias}.type"));
        select_cols.push(format!("{sql_alias}.source_id"));
        select_cols.push(format!("{sql_alias}.target_id"));
        select_cols.push(format!("{sql_alias}.properties -> '$'"));
        bindings.push(PatternBinding::Relationship { var: rp.alias.clone(), sql_alias: sql_alias.clone() });
        if let Some(v) = &rp.alias {
            scope.bind(v, VarKind::Relationship);
        }
    }
    Ok(sql_alias)
}

fn bind_rel_direction(
    rel_alias: &str,
    from_alias: &str,
    to_alias: &str,
    direction: PatternDirection,
    where_preds: &mut Vec<String>,
) {
    let pred = match direction {
        PatternDirection::Right => {
            format!("{rel_alias}.source_id = {from_alias}.id AND {rel_alias}.target_id = {to_alias}.id")
        }
        PatternDirection::Left => {
            format!("{rel_alias}.source_id = {to_alias}.id AND {rel_alias}.target_id = {from_alias}.id")
        }
        PatternDirection::Both => format!(
            "(({rel_alias}.source_id = {from_alias}.id AND {rel_alias}.target_id = {to_alias}.id) OR \
              ({rel_alias}.source_id = {to_alias}.id AND {rel_alias}.target_id = {from_alias}.id))"
        ),
    };
    where_preds.push(pred);
}

/// Single-hop adjacency SQL used to drive variable-length traversal
/// iteratively from the executor (one hop per iteration, cycle-guarded by a
/// visited set held at the call site).
pub fn compile_varlen_hop(rp: &RelPattern, from_id: &str) -> (String, Vec<Value>) {
    let mut sql = "SELECT id, type, source_id, target_id, properties -> '$' FROM edges WHERE ".to_string();
    let mut params = Vec::new();
    match rp.direction {
        PatternDirection::Right => {
            sql.push_str("source_id = ?");
            params.push(Value::String(from_id.to_string()));
        }
        PatternDirection::Left => {
            sql.push_str("target_id = ?");
            params.push(Value::String(from_id.to_string()));
        }
        PatternDirection::Both => {
            sql.push_str("(source_id = ? OR target_id = ?)");
            params.push(Value::String(from_id.to_string()));
            params.push(Value::String(from_id.to_string()));
        }
    }
    if !rp.rel_types.is_empty() {
        let placeholders = vec!["?"; rp.rel_types.len()].join(", ");
        sql.push_str(&format!(" AND type IN ({placeholders})"));
        for t in &rp.rel_types {
            params.push(Value::String(t.clone()));
        }
    }
    (sql, params)
}
