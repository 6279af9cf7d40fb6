//! SQL generation for registered entities
//!
//! Identifier quoting, operators, and the SELECT/COUNT/DELETE, WHERE and
//! INSERT/UPDATE compilers of [`Builder`].

pub mod builder;
pub mod mutation;
pub mod operator;
pub mod predicate;
pub mod sanitize;

pub use builder::{Builder, Field, Relation, Statement};
pub use operator::{Arity, JsonbOperators, Operator, OperatorSet, ProvidesOperators};
pub use predicate::Arguments;
pub use sanitize::{quote_column, quote_identifier, validate_identifier};
