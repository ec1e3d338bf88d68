//! WHERE-clause evaluation with `EXISTS` support.
//!
//! `planner::expr::eval_expr` is pure and refuses `Expr::Exists` outright —
//! answering it needs a store round-trip. This walks the expression tree
//! once, replaces every `Exists(pattern)` with the literal boolean result of
//! running that pattern correlated to the current row, and hands the
//! Exists-free tree to `eval_expr`.

use std::future::Future;
use std::pin::Pin;

use crate::cypher::ast::{Expr, Literal};
use crate::model::{PropertyMap, Value};
use crate::planner::expr::{eval_expr, Row};
use crate::planner::pattern::compile_pattern_join;
use crate::planner::scope::Scope;
use crate::storage::Store;
use crate::Result;

pub async fn eval_with_exists<S: Store>(
    store: &S,
    tx: &mut S::Tx,
    expr: &Expr,
    row: &Row,
    params: &PropertyMap,
) -> Result<Value> {
    let resolved = resolve_exists(store, tx, expr, row, params).await?;
    eval_expr(&resolved, row, params)
}

fn resolve_exists<'a, S: Store>(
    store: &'a S,
    tx: &'a mut S::Tx,
    expr: &'a Expr,
    row: &'a Row,
    params: &'a PropertyMap,
) -> Pin<Box<dyn Future<Output = Result<Expr>> + Send + 'a>> {
    Box::pin(async move {
        match expr {
            Expr::Exists(pattern) => {
                let mut local_scope = Scope::new();
                let compiled = compile_pattern_join(pattern, &mut local_scope, row, params)?;
                let found = store.execute(tx, &compiled.sql, &compiled.params).await?;
                Ok(Expr::Literal(Literal::Bool(!found.rows.is_empty())))
            }
            Expr::BinaryOp { left, op, right } => {
                let left = resolve_exists(store, tx, left, row, params).await?;
                let right = resolve_exists(store, tx, right, row, params).await?;
                Ok(Expr::BinaryOp { left: Box::new(left), op: *op, right: Box::new(right) })
            }
            Expr::UnaryOp { op, expr } => {
                let expr = resolve_exists(store, tx, expr, row, params).await?;
                Ok(Expr::UnaryOp { op: *op, expr: Box::new(expr) })
            }
            Expr::StringOp { left, op, right } => {
                let left = resolve_exists(store, tx, left, row, params).await?;
                let right = resolve_exists(store, tx, right, row, params).await?;
                Ok(Expr::StringOp { left: Box::new(left), op: *op, right: Box::new(right) })
            }
            Expr::In { expr, list } => {
                let expr = resolve_exists(store, tx, expr, row, params).await?;
                let list = resolve_exists(store, tx, list, row, params).await?;
                Ok(Expr::In { expr: Box::new(expr), list: Box::new(list) })
            }
            Expr::IsNull { expr, negated } => {
                let expr = resolve_exists(store, tx, expr, row, params).await?;
                Ok(Expr::IsNull { expr: Box::new(expr), negated: *negated })
            }
            Expr::HasLabel { expr, label } => {
                let expr = resolve_exists(store, tx, expr, row, params).await?;
                Ok(Expr::HasLabel { expr: Box::new(expr), label: label.clone() })
            }
            Expr::Property { expr, key } => {
                let expr = resolve_exists(store, tx, expr, row, params).await?;
                Ok(Expr::Property { expr: Box::new(expr), key: key.clone() })
            }
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(resolve_exists(store, tx, item, row, params).await?);
                }
                Ok(Expr::List(out))
            }
            Expr::MapLiteral(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    out.push((k.clone(), resolve_exists(store, tx, v, row, params).await?));
                }
                Ok(Expr::MapLiteral(out))
            }
            Expr::FunctionCall { name, args, distinct } => {
                let mut out = Vec::with_capacity(args.len());
                for a in args {
                    out.push(resolve_exists(store, tx, a, row, params).await?);
                }
                Ok(Expr::FunctionCall { name: name.clone(), args: out, distinct: *distinct })
            }
            Expr::Case { operand, whens, else_expr } => {
                let operand = match operand {
                    Some(o) => Some(Box::new(resolve_exists(store, tx, o, row, params).await?)),
                    None => None,
                };
                let mut out_whens = Vec::with_capacity(whens.len());
                for (cond, result) in whens {
                    let cond = resolve_exists(store, tx, cond, row, params).await?;
                    let result = resolve_exists(store, tx, result, row, params).await?;
                    out_whens.push((cond, result));
                }
                let else_expr = match else_expr {
                    Some(e) => Some(Box::new(resolve_exists(store, tx, e, row, params).await?)),
                    None => None,
                };
                Ok(Expr::Case { operand, whens: out_whens, else_expr })
            }
            Expr::Literal(_) | Expr::Variable(_) | Expr::Parameter(_) | Expr::Star => Ok(expr.clone()),
        }
    })
}
