//! Per-statement executor.
//!
//! Walks a parsed [`Statement`] clause by clause, compiling each one to SQL
//! through `planner::{pattern,clause,plan}` and running it against the
//! `Store`. Row-streams (`Vec<Row>`) thread from clause to clause; `WITH`
//! re-scopes them to exactly its own projections, `RETURN` shapes the final
//! stream into the library's output rows.

pub mod merge;
pub mod predicate;
pub mod shape;
pub mod varlen;

use std::collections::BTreeSet;

use crate::cypher::ast::{CallClause, Clause, Expr, MatchClause, Query, ReturnClause, ReturnItem, Statement, WithClause};
use crate::model::{PropertyMap, Value};
use crate::planner::expr::{eval_expr, values_equal, Row};
use crate::planner::pattern::{compile_pattern_join, split_pattern_segments, PatternSegment};
use crate::planner::plan::{apply_distinct, apply_order_by, apply_skip_limit, project};
use crate::planner::{clause, Scope, VarKind};
use crate::storage::Store;
use crate::{Error, Result, ResultRow};

pub struct QueryOutput {
    pub rows: Vec<ResultRow>,
    pub changes: usize,
}

pub async fn execute_statement<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    stmt: &Statement,
    params: &PropertyMap,
) -> Result<QueryOutput> {
    let mut output = execute_query(store, tx, &stmt.first, params).await?;
    if stmt.unions.is_empty() {
        return Ok(output);
    }
    let mut all_all = true;
    for (all, query) in &stmt.unions {
        let next = execute_query(store, tx, query, params).await?;
        output.changes += next.changes;
        output.rows.extend(next.rows);
        all_all &= *all;
    }
    if !all_all {
        output.rows = dedup_rows(output.rows);
    }
    Ok(output)
}

fn dedup_rows(rows: Vec<ResultRow>) -> Vec<ResultRow> {
    let mut out: Vec<ResultRow> = Vec::new();
    for row in rows {
        let dup = out.iter().any(|existing| result_rows_equal(existing, &row));
        if !dup {
            out.push(row);
        }
    }
    out
}

fn result_rows_equal(a: &ResultRow, b: &ResultRow) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).map(|bv| values_equal(v, bv)).unwrap_or(false))
}

async fn execute_query<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    query: &Query,
    params: &PropertyMap,
) -> Result<QueryOutput> {
    let mut scope = Scope::new();
    let mut rows: Vec<Row> = vec![Row::new()];
    let mut changes = 0usize;
    let mut returned: Option<Vec<ResultRow>> = None;

    for stmt_clause in &query.clauses {
        match stmt_clause {
            Clause::Create(c) => {
                let mut next = Vec::with_capacity(rows.len());
                for mut row in rows {
                    for pattern in &c.patterns {
                        let statements = clause::compile_create(pattern, &mut row, params)?;
                        for (sql, bind) in statements {
                            let r = store.execute(tx, &sql, &bind).await?;
                            changes += r.changes;
                        }
                    }
                    next.push(row);
                }
                rows = next;
            }
            Clause::Match(m) => {
                rows = execute_match(store, tx, m, &mut scope, rows, params).await?;
            }
            Clause::Merge(m) => {
                let (next, c) = merge::execute_merge(store, tx, m, rows, &mut scope, params).await?;
                rows = next;
                changes += c;
            }
            Clause::Set(s) => {
                let mut next = Vec::with_capacity(rows.len());
                for mut row in rows {
                    let statements = clause::compile_set_items(&s.items, &mut row, params)?;
                    for (sql, bind) in statements {
                        let r = store.execute(tx, &sql, &bind).await?;
                        changes += r.changes;
                    }
                    next.push(row);
                }
                rows = next;
            }
            Clause::Remove(rm) => {
                let mut next = Vec::with_capacity(rows.len());
                for mut row in rows {
                    let statements = clause::compile_remove_items(&rm.items, &mut row)?;
                    for (sql, bind) in statements {
                        let r = store.execute(tx, &sql, &bind).await?;
                        changes += r.changes;
                    }
                    next.push(row);
                }
                rows = next;
            }
            Clause::Delete(d) => {
                let mut next = Vec::with_capacity(rows.len());
                for row in rows {
                    let statements = clause::compile_delete(d.detach, &d.variables, &row)?;
                    for (sql, bind) in statements {
                        let r = store.execute(tx, &sql, &bind).await?;
                        changes += r.changes;
                    }
                    next.push(row);
                }
                rows = next;
            }
            Clause::Unwind(u) => {
                let mut next = Vec::new();
                for row in rows {
                    let val = eval_expr(&u.expr, &row, params)?;
                    match val {
                        Value::List(items) => {
                            for item in items {
                                let mut r = row.clone();
                                r.insert(u.alias.clone(), item);
                                next.push(r);
                            }
                        }
                        Value::Null => {}
                        other => {
                            let mut r = row.clone();
                            r.insert(u.alias.clone(), other);
                            next.push(r);
                        }
                    }
                }
                rows = next;
            }
            Clause::Call(c) => {
                rows = execute_call(store, tx, c, rows, params).await?;
            }
            Clause::With(w) => {
                rows = execute_with(store, tx, w, &mut scope, rows, params).await?;
            }
            Clause::Return(r) => {
                returned = Some(finish_return(r, rows, params)?);
                rows = Vec::new();
            }
        }
    }

    Ok(QueryOutput { rows: returned.unwrap_or_default(), changes })
}

// ============================================================================
// MATCH / OPTIONAL MATCH
// ============================================================================

async fn execute_match<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    m: &MatchClause,
    scope: &mut Scope,
    rows: Vec<Row>,
    params: &PropertyMap,
) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut candidates = vec![row.clone()];
        let mut introduced = Vec::new();
        for pattern in &m.patterns {
            let segments = split_pattern_segments(pattern)?;
            let mut next = Vec::new();
            for r in &candidates {
                let mut seg_rows = vec![r.clone()];
                for segment in &segments {
                    let mut seg_next = Vec::new();
                    match segment {
                        PatternSegment::VarLen { start, rel, end } => {
                            introduced.push(start.alias.clone());
                            introduced.push(end.alias.clone());
                            for sr in &seg_rows {
                                let matched =
                                    varlen::execute_varlen_match(store, tx, start, rel, end, scope, sr, params)
                                        .await?;
                                seg_next.extend(matched);
                            }
                        }
                        PatternSegment::Fixed(p) => {
                            for sr in &seg_rows {
                                let compiled = compile_pattern_join(p, scope, sr, params)?;
                                for binding in &compiled.bindings {
                                    introduced.push(match binding {
                                        crate::planner::pattern::PatternBinding::Node { var, .. }
                                        | crate::planner::pattern::PatternBinding::Relationship { var, .. } => {
                                            var.clone()
                                        }
                                    });
                                }
                                let result = store.execute(tx, &compiled.sql, &compiled.params).await?;
                                for cols in result.rows {
                                    seg_next.push(shape::merge_bound_columns(sr, &compiled.bindings, cols)?);
                                }
                            }
                        }
                    }
                    seg_rows = seg_next;
                }
                next.extend(seg_rows);
            }
            candidates = next;
        }

        let mut matched = Vec::with_capacity(candidates.len());
        for r in candidates {
            let keep = match &m.where_clause {
                Some(w) => predicate::eval_with_exists(store, tx, w, &r, params).await?.is_truthy(),
                None => true,
            };
            if keep {
                matched.push(r);
            }
        }

        if matched.is_empty() {
            if m.optional {
                let mut padded = row;
                for var in introduced.into_iter().flatten() {
                    padded.insert(var, Value::Null);
                }
                out.push(padded);
            }
        } else {
            out.extend(matched);
        }
    }
    Ok(out)
}

// ============================================================================
// WITH
// ============================================================================

async fn execute_with<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    w: &WithClause,
    scope: &mut Scope,
    rows: Vec<Row>,
    params: &PropertyMap,
) -> Result<Vec<Row>> {
    let items = expand_star(&w.items, &rows);
    let mut projected = project(&items, rows, params)?;

    if let Some(where_expr) = &w.where_clause {
        let mut kept = Vec::with_capacity(projected.len());
        for pr in projected {
            let keep = predicate::eval_with_exists(store, tx, where_expr, &pr.data, params).await?.is_truthy();
            if keep {
                kept.push(pr);
            }
        }
        projected = kept;
    }
    if w.distinct {
        projected = apply_distinct(projected);
    }
    apply_order_by(&mut projected, &w.order_by, params)?;
    let projected = apply_skip_limit(projected, w.skip.as_ref(), w.limit.as_ref(), params)?;

    scope.clear();
    let mut out = Vec::with_capacity(projected.len());
    for pr in projected {
        for (k, v) in &pr.data {
            let kind = match v {
                Value::Node(_) => VarKind::Node,
                Value::Relationship(_) => VarKind::Relationship,
                _ => VarKind::Scalar,
            };
            scope.bind(k, kind);
        }
        out.push(pr.data);
    }
    Ok(out)
}

// ============================================================================
// RETURN
// ============================================================================

fn finish_return(r: &ReturnClause, rows: Vec<Row>, params: &PropertyMap) -> Result<Vec<ResultRow>> {
    let items = expand_star(&r.items, &rows);
    let mut projected = project(&items, rows, params)?;
    if r.distinct {
        projected = apply_distinct(projected);
    }
    apply_order_by(&mut projected, &r.order_by, params)?;
    let projected = apply_skip_limit(projected, r.skip.as_ref(), r.limit.as_ref(), params)?;
    Ok(projected.into_iter().map(|pr| pr.data).collect())
}

/// `RETURN *` / `WITH *` expand to every variable bound in the current row,
/// in a deterministic (sorted) order — the parser only ever produces the
/// solus `[Expr::Star]` item for this form.
fn expand_star(items: &[ReturnItem], rows: &[Row]) -> Vec<ReturnItem> {
    if items.len() == 1 && matches!(items[0].expr, Expr::Star) {
        let mut keys: Vec<String> = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
        keys.sort();
        return keys
            .into_iter()
            .map(|k| ReturnItem { expr: Expr::Variable(k.clone()), alias: Some(k) })
            .collect();
    }
    items.to_vec()
}

// ============================================================================
// CALL db.*
// ============================================================================

async fn execute_call<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    c: &CallClause,
    rows: Vec<Row>,
    params: &PropertyMap,
) -> Result<Vec<Row>> {
    let produced = match c.name.as_str() {
        "db.labels" => {
            let result = store.execute(tx, "SELECT DISTINCT label FROM nodes", &[]).await?;
            let mut labels = BTreeSet::new();
            for cols in result.rows {
                if let Value::String(raw) = &cols[0] {
                    labels.extend(raw.split(':').map(|s| s.to_string()));
                }
            }
            labels
                .into_iter()
                .map(|l| {
                    let mut row = Row::new();
                    row.insert("label".to_string(), Value::String(l));
                    row
                })
                .collect::<Vec<_>>()
        }
        "db.relationshipTypes" => {
            let result = store.execute(tx, "SELECT DISTINCT type FROM edges", &[]).await?;
            result
                .rows
                .into_iter()
                .map(|cols| {
                    let mut row = Row::new();
                    row.insert("relationshipType".to_string(), cols[0].clone());
                    row
                })
                .collect::<Vec<_>>()
        }
        "db.propertyKeys" => {
            let mut keys = BTreeSet::new();
            let nodes = store.execute(tx, "SELECT properties -> '$' FROM nodes", &[]).await?;
            for cols in nodes.rows {
                if let Value::Map(m) = &cols[0] {
                    keys.extend(m.keys().cloned());
                }
            }
            let edges = store.execute(tx, "SELECT properties -> '$' FROM edges", &[]).await?;
            for cols in edges.rows {
                if let Value::Map(m) = &cols[0] {
                    keys.extend(m.keys().cloned());
                }
            }
            keys.into_iter()
                .map(|k| {
                    let mut row = Row::new();
                    row.insert("propertyKey".to_string(), Value::String(k));
                    row
                })
                .collect::<Vec<_>>()
        }
        other => return Err(Error::SemanticError(format!("unknown procedure: {other}"))),
    };

    let produced: Vec<Row> = if c.yield_items.is_empty() {
        produced
    } else {
        produced
            .into_iter()
            .map(|row| {
                let mut out = Row::new();
                for y in &c.yield_items {
                    if let Some(v) = row.get(y) {
                        out.insert(y.clone(), v.clone());
                    }
                }
                out
            })
            .collect()
    };

    let mut filtered = Vec::with_capacity(produced.len());
    for row in produced {
        let keep = match &c.where_clause {
            Some(expr) => predicate::eval_with_exists(store, tx, expr, &row, params).await?.is_truthy(),
            None => true,
        };
        if keep {
            filtered.push(row);
        }
    }

    let mut out = Vec::with_capacity(rows.len() * filtered.len());
    for base in &rows {
        for prow in &filtered {
            let mut merged = base.clone();
            merged.extend(prow.clone());
            out.push(merged);
        }
    }
    Ok(out)
}
