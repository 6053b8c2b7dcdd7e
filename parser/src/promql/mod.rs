//! PromQL parsing facade.
//!
//! Thin adapter over the `promql-parser` crate. The analyzer and the checks
//! go through this module instead of the parser API directly: it exposes
//! the node kinds they need, a generic child traversal, and fragment
//! rendering for diagnostics.

use promql_parser::parser::token::*;
use promql_parser::parser::value::ValueType;
use promql_parser::parser::{self, BinaryExpr, Expr};

pub mod printer;
pub mod source;

pub use printer::node_text;
pub use source::{ExcludedLabel, Source, SourceKind, labels_source};

/// Error returned when an expression fails to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
}

impl std::error::Error for SyntaxError {}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a PromQL expression.
pub fn parse(expr: &str) -> Result<Expr, SyntaxError> {
    parser::parse(expr).map_err(|message| SyntaxError { message })
}

/// Semantic subnodes of `node`, in source order.
///
/// Matrix selectors have no expression children: their inner vector
/// selector is a plain struct field, so walkers that care about it must
/// handle `Expr::MatrixSelector` explicitly.
pub fn children(node: &Expr) -> Vec<&Expr> {
    match node {
        Expr::Aggregate(agg) => {
            let mut nodes = Vec::with_capacity(2);
            if let Some(param) = &agg.param {
                nodes.push(param.as_ref());
            }
            nodes.push(agg.expr.as_ref());
            nodes
        }
        Expr::Unary(u) => vec![u.expr.as_ref()],
        Expr::Binary(b) => vec![b.lhs.as_ref(), b.rhs.as_ref()],
        Expr::Paren(p) => vec![p.expr.as_ref()],
        Expr::Subquery(sq) => vec![sq.expr.as_ref()],
        Expr::Call(call) => call.args.args.iter().map(|arg| arg.as_ref()).collect(),
        Expr::MatrixSelector(_)
        | Expr::NumberLiteral(_)
        | Expr::StringLiteral(_)
        | Expr::VectorSelector(_)
        | Expr::Extension(_) => Vec::new(),
    }
}

/// The binary expression at the outermost level of `node`, skipping any
/// paren and unary wrappers.
pub fn has_outer_binary(node: &Expr) -> Option<&BinaryExpr> {
    match node {
        Expr::Binary(b) => Some(b),
        Expr::Paren(p) => has_outer_binary(&p.expr),
        Expr::Unary(u) => has_outer_binary(&u.expr),
        _ => None,
    }
}

/// Static result type of a node.
pub fn value_type(node: &Expr) -> ValueType {
    match node {
        Expr::NumberLiteral(_) => ValueType::Scalar,
        Expr::StringLiteral(_) => ValueType::String,
        Expr::VectorSelector(_) => ValueType::Vector,
        Expr::MatrixSelector(_) | Expr::Subquery(_) => ValueType::Matrix,
        Expr::Paren(p) => value_type(&p.expr),
        Expr::Unary(u) => value_type(&u.expr),
        Expr::Binary(b) => {
            if value_type(&b.lhs) == ValueType::Scalar
                && value_type(&b.rhs) == ValueType::Scalar
            {
                ValueType::Scalar
            } else {
                ValueType::Vector
            }
        }
        Expr::Aggregate(_) | Expr::Extension(_) => ValueType::Vector,
        Expr::Call(call) => call.func.return_type.clone(),
    }
}

/// True for `==`, `!=`, `<`, `>`, `<=`, `>=`.
pub fn is_comparison_op(op: TokenType) -> bool {
    matches!(op.id(), T_EQLC | T_NEQ | T_LSS | T_GTR | T_LTE | T_GTE)
}

/// True for the arithmetic operators `+ - * / % ^`.
pub fn is_arithmetic_op(op: TokenType) -> bool {
    matches!(op.id(), T_ADD | T_SUB | T_MUL | T_DIV | T_MOD | T_POW)
}

/// True for the set operators `and`, `or` and `unless`, which always use
/// many-to-many vector matching even when written without any modifier.
pub fn is_set_op(op: TokenType) -> bool {
    matches!(op.id(), T_LAND | T_LOR | T_LUNLESS)
}
