//! Cypher-to-SQL translation.
//!
//! There is no separate logical-plan IR: a pattern, a SET/REMOVE/DELETE
//! body, or a projection list each compiles directly to parameterised SQL
//! (or, for projections, to an in-memory shaping step) the moment the
//! executor reaches the clause that needs it. `scope` tracks the per-query
//! variable environment and alias counter that the compilers share.

pub mod clause;
pub mod expr;
pub mod pattern;
pub mod plan;
pub mod scope;

pub use scope::{Scope, VarKind};
