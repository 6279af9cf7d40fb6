//! Filter operators
//!
//! An operator turns a quoted column reference and its parameter placeholders
//! into a boolean SQL fragment. Each builder holds one operator per
//! `<column><suffix>` key, seeded from [`OperatorSet::defaults`] and extended by
//! column types implementing [`ProvidesOperators`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How many parameters an operator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No parameters (null tests)
    Nullary,
    /// Exactly one parameter
    Single,
    /// Any number of parameters, including none
    Variadic,
}

type RenderFn = dyn Fn(&str, &[String]) -> String + Send + Sync;

/// A named comparison producing a SQL boolean fragment for one column
#[derive(Clone)]
pub struct Operator {
    arity: Arity,
    normalize: bool,
    render: Arc<RenderFn>,
}

impl Operator {
    /// Operator without parameters, e.g. `IS NULL`
    pub fn nullary(render: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            arity: Arity::Nullary,
            normalize: false,
            render: Arc::new(move |column, _| render(column)),
        }
    }

    /// Operator with one parameter normalized to the column type
    pub fn single(render: impl Fn(&str, &str) -> String + Send + Sync + 'static) -> Self {
        Self {
            arity: Arity::Single,
            normalize: true,
            render: Arc::new(move |column, params| render(column, &params[0])),
        }
    }

    /// Operator with one parameter bound as given, e.g. `LIKE` patterns
    pub fn pattern(render: impl Fn(&str, &str) -> String + Send + Sync + 'static) -> Self {
        Self {
            normalize: false,
            ..Self::single(render)
        }
    }

    /// Operator receiving every element of a sequence as its own parameter
    pub fn variadic(render: impl Fn(&str, &[String]) -> String + Send + Sync + 'static) -> Self {
        Self {
            arity: Arity::Variadic,
            normalize: true,
            render: Arc::new(render),
        }
    }

    /// Bind values as given instead of normalizing to the column type
    pub fn raw(mut self) -> Self {
        self.normalize = false;
        self
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Whether bound values are normalized to the column type first
    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    /// Render the fragment; `params` length must match the arity
    pub fn render(&self, column: &str, params: &[String]) -> String {
        (self.render)(column, params)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("arity", &self.arity)
            .field("normalize", &self.normalize)
            .finish_non_exhaustive()
    }
}

fn comparison(symbol: &'static str) -> Operator {
    Operator::single(move |column, param| format!("{} {} {}", column, symbol, param))
}

fn like(keyword: &'static str) -> Operator {
    Operator::pattern(move |column, param| format!("{} {} {}", column, keyword, param))
}

/// Operators keyed by suffix (`_eq`, `_in`, ...)
#[derive(Debug, Clone, Default)]
pub struct OperatorSet {
    operators: BTreeMap<String, Operator>,
}

impl OperatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The operators every column receives
    pub fn defaults() -> Self {
        Self::new()
            .with("_eq", comparison("="))
            .with("_neq", comparison("<>"))
            .with("_gt", comparison(">"))
            .with("_gte", comparison(">="))
            .with("_lt", comparison("<"))
            .with("_lte", comparison("<="))
            .with("_like", like("LIKE"))
            .with("_nlike", like("NOT LIKE"))
            .with("_ilike", like("ILIKE"))
            .with("_nilike", like("NOT ILIKE"))
            .with(
                "_in",
                Operator::variadic(|column, params| {
                    if params.is_empty() {
                        "FALSE".to_string()
                    } else {
                        format!("{} IN ({})", column, params.join(", "))
                    }
                }),
            )
            .with(
                "_nin",
                Operator::variadic(|column, params| {
                    if params.is_empty() {
                        "TRUE".to_string()
                    } else {
                        format!("{} NOT IN ({})", column, params.join(", "))
                    }
                }),
            )
            .with("_is_null", Operator::nullary(|column| format!("{} IS NULL", column)))
            .with(
                "_is_not_null",
                Operator::nullary(|column| format!("{} IS NOT NULL", column)),
            )
    }

    /// Add or replace an operator
    pub fn with(mut self, suffix: impl Into<String>, operator: Operator) -> Self {
        self.insert(suffix, operator);
        self
    }

    pub fn insert(&mut self, suffix: impl Into<String>, operator: Operator) {
        self.operators.insert(suffix.into(), operator);
    }

    /// Merge `other` over `self`; entries in `other` win
    pub fn merge(mut self, other: OperatorSet) -> Self {
        self.operators.extend(other.operators);
        self
    }

    pub fn get(&self, suffix: &str) -> Option<&Operator> {
        self.operators.get(suffix)
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Operator)> {
        self.operators.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Implemented by column value types that contribute extra operators
pub trait ProvidesOperators {
    fn operators() -> OperatorSet;
}

/// Containment and key tests for JSONB columns
#[derive(Debug, Clone, Copy)]
pub struct JsonbOperators;

impl ProvidesOperators for JsonbOperators {
    fn operators() -> OperatorSet {
        OperatorSet::new()
            .with(
                "_contains",
                Operator::single(|column, param| format!("{} @> {}", column, param)),
            )
            .with(
                "_has_key",
                Operator::pattern(|column, param| format!("jsonb_exists({}, {})", column, param)),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("${}", i)).collect()
    }

    #[test]
    fn test_default_comparisons() {
        let ops = OperatorSet::defaults();
        assert_eq!(ops.get("_eq").unwrap().render("\"a\"", &params(1)), "\"a\" = $1");
        assert_eq!(ops.get("_neq").unwrap().render("\"a\"", &params(1)), "\"a\" <> $1");
        assert_eq!(ops.get("_gte").unwrap().render("\"a\"", &params(1)), "\"a\" >= $1");
        assert_eq!(
            ops.get("_ilike").unwrap().render("\"email\"", &params(1)),
            "\"email\" ILIKE $1"
        );
    }

    #[test]
    fn test_pattern_operators_do_not_normalize() {
        let ops = OperatorSet::defaults();
        assert!(!ops.get("_like").unwrap().normalizes());
        assert!(!ops.get("_nilike").unwrap().normalizes());
        assert!(ops.get("_eq").unwrap().normalizes());
    }

    #[test]
    fn test_in_expands_params() {
        let ops = OperatorSet::defaults();
        let op = ops.get("_in").unwrap();
        assert_eq!(op.arity(), Arity::Variadic);
        assert_eq!(op.render("\"id\"", &params(3)), "\"id\" IN ($1, $2, $3)");
    }

    #[test]
    fn test_empty_in_and_nin() {
        let ops = OperatorSet::defaults();
        assert_eq!(ops.get("_in").unwrap().render("\"id\"", &[]), "FALSE");
        assert_eq!(ops.get("_nin").unwrap().render("\"id\"", &[]), "TRUE");
    }

    #[test]
    fn test_null_tests() {
        let ops = OperatorSet::defaults();
        let is_null = ops.get("_is_null").unwrap();
        assert_eq!(is_null.arity(), Arity::Nullary);
        assert_eq!(is_null.render("\"deleted_at\"", &[]), "\"deleted_at\" IS NULL");
        assert_eq!(
            ops.get("_is_not_null").unwrap().render("\"x\"", &[]),
            "\"x\" IS NOT NULL"
        );
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let custom = OperatorSet::new().with(
            "_eq",
            Operator::single(|column, param| format!("lower({}) = lower({})", column, param)),
        );
        let ops = OperatorSet::defaults().merge(custom);
        assert_eq!(
            ops.get("_eq").unwrap().render("\"name\"", &params(1)),
            "lower(\"name\") = lower($1)"
        );
        assert!(ops.get("_in").is_some());
    }

    #[test]
    fn test_jsonb_operators() {
        let ops = JsonbOperators::operators();
        assert_eq!(
            ops.get("_contains").unwrap().render("\"tags\"", &params(1)),
            "\"tags\" @> $1"
        );
        assert_eq!(
            ops.get("_has_key").unwrap().render("\"meta\"", &params(1)),
            "jsonb_exists(\"meta\", $1)"
        );
        assert_eq!(ops.suffixes().count(), 2);
    }
}
