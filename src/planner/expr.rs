//! Pure, row-scoped expression evaluator.
//!
//! Used for WHERE predicates, RETURN/WITH projections, SET/REMOVE values and
//! UNWIND sources. Three-valued (NULL-propagating) logic throughout, matching
//! Cypher rather than SQL or Rust's own boolean rules.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cypher::ast::{BinaryOp, Expr, Literal, StringOp, UnaryOp};
use crate::model::{PropertyMap, Value};
use crate::{Error, Result};

/// One row of bound variables: node/relationship values, or scalars
/// projected by an earlier WITH/UNWIND.
pub type Row = HashMap<String, Value>;

pub fn eval_expr(expr: &Expr, row: &Row, params: &PropertyMap) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Star => Ok(Value::Null),
        Expr::Variable(name) => row
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SemanticError(format!("unknown variable: {name}"))),
        Expr::Parameter(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SemanticError(format!("unknown parameter: ${name}"))),
        Expr::Property { expr, key } => {
            let base = eval_expr(expr, row, params)?;
            Ok(property_of(&base, key))
        }
        Expr::FunctionCall { name, args, distinct: _ } => eval_function(name, args, row, params),
        Expr::BinaryOp { left, op, right } => {
            let l = eval_expr(left, row, params)?;
            let r = eval_expr(right, row, params)?;
            eval_binary(*op, l, r)
        }
        Expr::UnaryOp { op, expr } => {
            let v = eval_expr(expr, row, params)?;
            Ok(match op {
                UnaryOp::Not => match v {
                    Value::Null => Value::Null,
                    other => Value::Bool(!other.is_truthy()),
                },
                UnaryOp::Negate => match v {
                    Value::Int(i) => Value::Int(-i),
                    Value::Float(f) => Value::Float(-f),
                    Value::Null => Value::Null,
                    other => {
                        return Err(Error::TypeError {
                            expected: "numeric".into(),
                            got: other.type_name().into(),
                        })
                    }
                },
            })
        }
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for i in items {
                out.push(eval_expr(i, row, params)?);
            }
            Ok(Value::List(out))
        }
        Expr::MapLiteral(entries) => {
            let mut out = std::collections::HashMap::new();
            for (k, e) in entries {
                out.insert(k.clone(), eval_expr(e, row, params)?);
            }
            Ok(Value::Map(out))
        }
        Expr::Case { operand, whens, else_expr } => {
            let subject = operand.as_ref().map(|o| eval_expr(o, row, params)).transpose()?;
            for (cond, result) in whens {
                let matched = match &subject {
                    Some(s) => {
                        let c = eval_expr(cond, row, params)?;
                        values_equal(s, &c)
                    }
                    None => eval_expr(cond, row, params)?.is_truthy(),
                };
                if matched {
                    return eval_expr(result, row, params);
                }
            }
            match else_expr {
                Some(e) => eval_expr(e, row, params),
                None => Ok(Value::Null),
            }
        }
        Expr::Exists(_) => Err(Error::SemanticError(
            "EXISTS must be resolved before generic evaluation".into(),
        )),
        Expr::In { expr, list } => {
            let needle = eval_expr(expr, row, params)?;
            let haystack = eval_expr(list, row, params)?;
            match haystack {
                Value::List(items) => Ok(Value::Bool(items.iter().any(|v| values_equal(v, &needle)))),
                Value::Null => Ok(Value::Null),
                other => Err(Error::TypeError { expected: "list".into(), got: other.type_name().into() }),
            }
        }
        Expr::IsNull { expr, negated } => {
            let v = eval_expr(expr, row, params)?;
            Ok(Value::Bool(v.is_null() != *negated))
        }
        Expr::HasLabel { expr, label } => {
            let v = eval_expr(expr, row, params)?;
            match v {
                Value::Node(n) => Ok(Value::Bool(n.has_label(label))),
                Value::Null => Ok(Value::Null),
                other => Err(Error::TypeError { expected: "node".into(), got: other.type_name().into() }),
            }
        }
        Expr::StringOp { left, op, right } => {
            let l = eval_expr(left, row, params)?;
            let r = eval_expr(right, row, params)?;
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            let (ls, rs) = match (l.as_str(), r.as_str()) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(Error::TypeError { expected: "string".into(), got: "non-string".into() })
                }
            };
            Ok(Value::Bool(match op {
                StringOp::StartsWith => ls.starts_with(rs),
                StringOp::EndsWith => ls.ends_with(rs),
                StringOp::Contains => ls.contains(rs),
            }))
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn property_of(base: &Value, key: &str) -> Value {
    match base {
        Value::Node(n) => n.properties.get(key).cloned().unwrap_or(Value::Null),
        Value::Relationship(r) => r.properties.get(key).cloned().unwrap_or(Value::Null),
        Value::Map(m) => m.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match a.neo4j_cmp(b) {
        Some(Ordering::Equal) => true,
        Some(_) => false,
        None => matches!((a, b), (Value::Null, Value::Null)) || a == b,
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => l.add(&r).ok_or_else(|| Error::TypeError {
            expected: "addable pair".into(),
            got: format!("{}+{}", l.type_name(), r.type_name()),
        }),
        Sub | Mul | Div | Mod | Pow => numeric_binary(op, l, r),
        Eq => Ok(null_aware_cmp(&l, &r, |o| o == Ordering::Equal, || l == r)),
        Neq => Ok(match null_aware_cmp(&l, &r, |o| o != Ordering::Equal, || l != r) {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(b),
            other => other,
        }),
        Lt => Ok(null_aware_cmp(&l, &r, |o| o == Ordering::Less, || false)),
        Lte => Ok(null_aware_cmp(&l, &r, |o| o != Ordering::Greater, || false)),
        Gt => Ok(null_aware_cmp(&l, &r, |o| o == Ordering::Greater, || false)),
        Gte => Ok(null_aware_cmp(&l, &r, |o| o != Ordering::Less, || false)),
        And => Ok(three_valued_and(l, r)),
        Or => Ok(three_valued_or(l, r)),
        Xor => Ok(match (l.is_null(), r.is_null()) {
            (true, _) | (_, true) => Value::Null,
            _ => Value::Bool(l.is_truthy() ^ r.is_truthy()),
        }),
    }
}

fn null_aware_cmp(
    l: &Value,
    r: &Value,
    pred: impl Fn(Ordering) -> bool,
    fallback_eq: impl Fn() -> bool,
) -> Value {
    if l.is_null() || r.is_null() {
        return Value::Null;
    }
    match l.neo4j_cmp(r) {
        Some(ord) => Value::Bool(pred(ord)),
        None => Value::Bool(fallback_eq()),
    }
}

fn numeric_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let (lf, rf) = match (l.as_float(), r.as_float()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Error::TypeError {
                expected: "numeric".into(),
                got: format!("{}/{}", l.type_name(), r.type_name()),
            })
        }
    };
    let both_int = matches!(l, Value::Int(_)) && matches!(r, Value::Int(_));
    let result = match op {
        BinaryOp::Sub => lf - rf,
        BinaryOp::Mul => lf * rf,
        BinaryOp::Div => lf / rf,
        BinaryOp::Mod => lf % rf,
        BinaryOp::Pow => lf.powf(rf),
        _ => unreachable!(),
    };
    if both_int && matches!(op, BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Mod) {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Float(result))
    }
}

fn three_valued_and(l: Value, r: Value) -> Value {
    match (&l, &r) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        _ => Value::Bool(l.is_truthy() && r.is_truthy()),
    }
}

fn three_valued_or(l: Value, r: Value) -> Value {
    match (&l, &r) {
        (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        _ => Value::Bool(l.is_truthy() || r.is_truthy()),
    }
}

/// Scalar (non-aggregate) built-in functions. Aggregate functions are
/// recognised and computed one level up, over a group of rows.
fn eval_function(name: &str, args: &[Expr], row: &Row, params: &PropertyMap) -> Result<Value> {
    let lname = name.to_ascii_lowercase();
    let mut vals = Vec::with_capacity(args.len());
    for a in args {
        vals.push(eval_expr(a, row, params)?);
    }
    match lname.as_str() {
        "id" => match vals.first() {
            Some(Value::Node(n)) => Ok(Value::String(n.id.as_str().to_string())),
            Some(Value::Relationship(r)) => Ok(Value::String(r.id.as_str().to_string())),
            _ => Ok(Value::Null),
        },
        "labels" => match vals.first() {
            Some(Value::Node(n)) => Ok(Value::List(
                n.label.split(':').map(|s| Value::String(s.to_string())).collect(),
            )),
            _ => Ok(Value::Null),
        },
        "type" => match vals.first() {
            Some(Value::Relationship(r)) => Ok(Value::String(r.rel_type.clone())),
            _ => Ok(Value::Null),
        },
        "properties" => match vals.first() {
            Some(Value::Node(n)) => Ok(Value::Map(n.properties.clone())),
            Some(Value::Relationship(r)) => Ok(Value::Map(r.properties.clone())),
            _ => Ok(Value::Null),
        },
        "keys" => match vals.first() {
            Some(Value::Node(n)) => Ok(Value::List(n.properties.keys().map(|k| Value::String(k.clone())).collect())),
            Some(Value::Relationship(r)) => Ok(Value::List(r.properties.keys().map(|k| Value::String(k.clone())).collect())),
            Some(Value::Map(m)) => Ok(Value::List(m.keys().map(|k| Value::String(k.clone())).collect())),
            _ => Ok(Value::Null),
        },
        "size" | "length" => match vals.first() {
            Some(Value::List(l)) => Ok(Value::Int(l.len() as i64)),
            Some(Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
            Some(Value::Null) => Ok(Value::Null),
            _ => Err(Error::TypeError { expected: "list or string".into(), got: "other".into() }),
        },
        "head" => match vals.first() {
            Some(Value::List(l)) => Ok(l.first().cloned().unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        },
        "last" => match vals.first() {
            Some(Value::List(l)) => Ok(l.last().cloned().unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        },
        "tail" => match vals.first() {
            Some(Value::List(l)) => Ok(Value::List(l.iter().skip(1).cloned().collect())),
            _ => Ok(Value::Null),
        },
        "range" => {
            let start = vals.first().and_then(|v| v.as_int()).unwrap_or(0);
            let end = vals.get(1).and_then(|v| v.as_int()).unwrap_or(start);
            let step = vals.get(2).and_then(|v| v.as_int()).unwrap_or(1);
            if step == 0 {
                return Err(Error::TypeError { expected: "nonzero step".into(), got: "0".into() });
            }
            let mut out = Vec::new();
            let mut i = start;
            if step > 0 {
                while i <= end {
                    out.push(Value::Int(i));
                    i += step;
                }
            } else {
                while i >= end {
                    out.push(Value::Int(i));
                    i += step;
                }
            }
            Ok(Value::List(out))
        }
        "coalesce" => Ok(vals.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        "tointeger" => Ok(match vals.first() {
            Some(Value::Int(i)) => Value::Int(*i),
            Some(Value::Float(f)) => Value::Int(*f as i64),
            Some(Value::String(s)) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
            _ => Value::Null,
        }),
        "tofloat" => Ok(match vals.first() {
            Some(Value::Float(f)) => Value::Float(*f),
            Some(Value::Int(i)) => Value::Float(*i as f64),
            Some(Value::String(s)) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
            _ => Value::Null,
        }),
        "tostring" => Ok(match vals.first() {
            Some(Value::String(s)) => Value::String(s.clone()),
            Some(Value::Null) => Value::Null,
            Some(other) => Value::String(other.to_string()),
            None => Value::Null,
        }),
        "toboolean" => Ok(match vals.first() {
            Some(Value::Bool(b)) => Value::Bool(*b),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Null,
            },
            _ => Value::Null,
        }),
        _ => Err(Error::SemanticError(format!("unknown function: {name}"))),
    }
}
