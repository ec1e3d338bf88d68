//! Projection shaping: default alias synthesis, RETURN/WITH aggregation and
//! grouping, and the DISTINCT / ORDER BY / SKIP / LIMIT pipeline applied at
//! every RETURN and WITH boundary.

use std::collections::HashMap;

use crate::cypher::ast::{is_aggregate, Expr, OrderExpr, ReturnItem};
use crate::model::{PropertyMap, Value};
use crate::{Error, Result};

use super::expr::{eval_expr, values_equal, Row};

/// One shaped output row: the final `alias -> value` projection, plus a
/// representative binding row (original variables + the projected aliases)
/// that ORDER BY can still evaluate expressions against.
#[derive(Debug, Clone)]
pub struct ProjectedRow {
    pub data: HashMap<String, Value>,
    pub eval_row: Row,
}

fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::FunctionCall { name, args, .. } => {
            is_aggregate(name) || args.iter().any(contains_aggregate)
        }
        Expr::BinaryOp { left, right, .. } => contains_aggregate(left) || contains_aggregate(right),
        Expr::UnaryOp { expr, .. } => contains_aggregate(expr),
        Expr::Property { expr, .. } => contains_aggregate(expr),
        Expr::List(items) => items.iter().any(contains_aggregate),
        Expr::Case { operand, whens, else_expr } => {
            operand.as_deref().map(contains_aggregate).unwrap_or(false)
                || whens.iter().any(|(c, r)| contains_aggregate(c) || contains_aggregate(r))
                || else_expr.as_deref().map(contains_aggregate).unwrap_or(false)
        }
        _ => false,
    }
}

/// Default projection alias per §4.3.3: `n.k` -> `n_k`, an aggregate call ->
/// its function name, the first bare non-aliased expression -> `expr`,
/// subsequent ones -> `expr_<n>`.
pub fn default_alias(expr: &Expr, anon_index: &mut usize) -> String {
    match expr {
        Expr::Variable(name) => name.clone(),
        Expr::Property { expr, key } => match expr.as_ref() {
            Expr::Variable(v) => format!("{v}_{key}"),
            _ => anon_alias(anon_index),
        },
        Expr::FunctionCall { name, .. } => name.to_ascii_lowercase(),
        _ => anon_alias(anon_index),
    }
}

fn anon_alias(anon_index: &mut usize) -> String {
    let alias = if *anon_index == 0 { "expr".to_string() } else { format!("expr_{anon_index}") };
    *anon_index += 1;
    alias
}

/// Project `rows` through `items`, grouping implicitly by the non-aggregate
/// projections when at least one item is an aggregate (§4.3.2/§4.3.4's
/// simple implicit-grouping rule).
pub fn project(items: &[ReturnItem], rows: Vec<Row>, params: &PropertyMap) -> Result<Vec<ProjectedRow>> {
    let aliases: Vec<String> = {
        let mut anon = 0usize;
        items.iter().map(|i| i.alias.clone().unwrap_or_else(|| default_alias(&i.expr, &mut anon))).collect()
    };

    let has_aggregate = items.iter().any(|i| contains_aggregate(&i.expr));
    if !has_aggregate {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut data = HashMap::new();
            for (item, alias) in items.iter().zip(&aliases) {
                data.insert(alias.clone(), eval_expr(&item.expr, &row, params)?);
            }
            out.push(ProjectedRow { eval_row: row, data });
        }
        return Ok(out);
    }

    // Group by the non-aggregate projections' evaluated values.
    let non_agg: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, i)| !contains_aggregate(&i.expr))
        .map(|(idx, _)| idx)
        .collect();

    let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
    for row in rows {
        let mut key = Vec::with_capacity(non_agg.len());
        for &idx in &non_agg {
            key.push(eval_expr(&items[idx].expr, &row, params)?);
        }
        if let Some((_, members)) = groups.iter_mut().find(|(k, _)| keys_equal(k, &key)) {
            members.push(row);
        } else {
            groups.push((key, vec![row]));
        }
    }
    if groups.is_empty() {
        // Zero input rows still yields one aggregate row (e.g. `count(*)` = 0),
        // provided there are no non-aggregate columns to group by.
        if non_agg.is_empty() {
            groups.push((Vec::new(), Vec::new()));
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (_, members) in groups {
        let representative = members.first().cloned().unwrap_or_default();
        let mut data = HashMap::new();
        for (item, alias) in items.iter().zip(&aliases) {
            let value = if contains_aggregate(&item.expr) {
                eval_aggregate_expr(&item.expr, &members, params)?
            } else {
                eval_expr(&item.expr, &representative, params)?
            };
            data.insert(alias.clone(), value);
        }
        out.push(ProjectedRow { eval_row: representative, data });
    }
    Ok(out)
}

fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

fn eval_aggregate_expr(expr: &Expr, group: &[Row], params: &PropertyMap) -> Result<Value> {
    match expr {
        Expr::FunctionCall { name, args, distinct } if is_aggregate(name) => {
            eval_aggregate(name, args.first(), *distinct, group, params)
        }
        _ => Err(Error::SemanticError("aggregate expression nested in a non-aggregate context".into())),
    }
}

fn eval_aggregate(
    name: &str,
    arg: Option<&Expr>,
    distinct: bool,
    group: &[Row],
    params: &PropertyMap,
) -> Result<Value> {
    let lname = name.to_ascii_lowercase();
    if lname == "count" {
        let is_star = matches!(arg, None | Some(Expr::Star));
        if is_star {
            return Ok(Value::Int(group.len() as i64));
        }
        let expr = arg.unwrap();
        let mut seen: Vec<Value> = Vec::new();
        let mut count = 0i64;
        for row in group {
            let v = eval_expr(expr, row, params)?;
            if v.is_null() {
                continue;
            }
            if distinct {
                if seen.iter().any(|s| values_equal(s, &v)) {
                    continue;
                }
                seen.push(v);
            }
            count += 1;
        }
        return Ok(Value::Int(count));
    }

    let expr = arg.ok_or_else(|| Error::SemanticError(format!("{name} requires an argument")))?;
    let mut values = Vec::new();
    for row in group {
        let v = eval_expr(expr, row, params)?;
        if !v.is_null() {
            values.push(v);
        }
    }
    if distinct {
        let mut deduped: Vec<Value> = Vec::new();
        for v in values {
            if !deduped.iter().any(|d| values_equal(d, &v)) {
                deduped.push(v);
            }
        }
        values = deduped;
    }

    match lname.as_str() {
        "sum" => {
            let mut acc = Value::Int(0);
            for v in values {
                acc = acc.add(&v).ok_or_else(|| Error::TypeError {
                    expected: "numeric".into(),
                    got: v.type_name().into(),
                })?;
            }
            Ok(acc)
        }
        "avg" => {
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let sum: f64 = values
                .iter()
                .map(|v| v.as_float().ok_or_else(|| Error::TypeError { expected: "numeric".into(), got: v.type_name().into() }))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .sum();
            Ok(Value::Float(sum / values.len() as f64))
        }
        "min" => Ok(values
            .into_iter()
            .reduce(|a, b| if a.neo4j_cmp(&b) == Some(std::cmp::Ordering::Greater) { b } else { a })
            .unwrap_or(Value::Null)),
        "max" => Ok(values
            .into_iter()
            .reduce(|a, b| if a.neo4j_cmp(&b) == Some(std::cmp::Ordering::Less) { b } else { a })
            .unwrap_or(Value::Null)),
        "collect" => Ok(Value::List(values)),
        other => Err(Error::SemanticError(format!("unknown aggregate: {other}"))),
    }
}

pub fn apply_distinct(rows: Vec<ProjectedRow>) -> Vec<ProjectedRow> {
    let mut out: Vec<ProjectedRow> = Vec::new();
    for row in rows {
        let dup = out.iter().any(|existing| maps_equal(&existing.data, &row.data));
        if !dup {
            out.push(row);
        }
    }
    out
}

fn maps_equal(a: &HashMap<String, Value>, b: &HashMap<String, Value>) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).map(|bv| values_equal(v, bv)).unwrap_or(false))
}

pub fn apply_order_by(rows: &mut [ProjectedRow], order_by: &[OrderExpr], params: &PropertyMap) -> Result<()> {
    if order_by.is_empty() {
        return Ok(());
    }
    let mut keyed: Vec<(Vec<Value>, usize)> = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let mut merged = row.eval_row.clone();
        for (k, v) in &row.data {
            merged.insert(k.clone(), v.clone());
        }
        let mut key = Vec::with_capacity(order_by.len());
        for ord in order_by {
            key.push(eval_expr(&ord.expr, &merged, params)?);
        }
        keyed.push((key, idx));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for (i, ord) in order_by.iter().enumerate() {
            let ord_result = match (a[i].is_null(), b[i].is_null()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => a[i].neo4j_cmp(&b[i]).unwrap_or(std::cmp::Ordering::Equal),
            };
            let ord_result = if ord.ascending { ord_result } else { ord_result.reverse() };
            if ord_result != std::cmp::Ordering::Equal {
                return ord_result;
            }
        }
        std::cmp::Ordering::Equal
    });
    let reordered: Vec<ProjectedRow> = keyed.into_iter().map(|(_, idx)| rows[idx].clone()).collect();
    rows.clone_from_slice(&reordered);
    Ok(())
}

pub fn apply_skip_limit(
    rows: Vec<ProjectedRow>,
    skip: Option<&Expr>,
    limit: Option<&Expr>,
    params: &PropertyMap,
) -> Result<Vec<ProjectedRow>> {
    let empty = Row::new();
    let skip_n = match skip {
        Some(e) => eval_expr(e, &empty, params)?.as_int().unwrap_or(0).max(0) as usize,
        None => 0,
    };
    let limit_n = match limit {
        Some(e) => Some(eval_expr(e, &empty, params)?.as_int().unwrap_or(0).max(0) as usize),
        None => None,
    };
    let skipped: Vec<ProjectedRow> = rows.into_iter().skip(skip_n).collect();
    Ok(match limit_n {
        Some(n) => skipped.into_iter().take(n).collect(),
        None => skipped,
    })
}
