//! Renders AST nodes back into PromQL text.
//!
//! The PromQL parser does not attach byte offsets to AST nodes, so
//! diagnostic fragments are produced by rendering the offending node
//! instead of slicing the original query string. Output is canonical
//! PromQL, close enough to the input for a human to find the spot.

use std::fmt::Write;
use std::time::Duration;

use promql_parser::label::{METRIC_NAME, MatchOp, Matchers};
use promql_parser::parser::token::*;
use promql_parser::parser::{
    AggregateExpr, BinaryExpr, Call, Expr, LabelModifier, MatrixSelector, SubqueryExpr,
    VectorMatchCardinality, VectorSelector,
};

/// Render any expression node as PromQL text.
pub fn node_text(node: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, node);
    out
}

/// Render a bare vector selector.
pub fn selector_text(vs: &VectorSelector) -> String {
    let mut out = String::new();
    write_selector(&mut out, vs);
    out
}

/// Render an aggregation node, e.g. `sum without(job) (foo)`.
pub fn aggregate_text(agg: &AggregateExpr) -> String {
    let mut out = String::new();
    write_aggregate(&mut out, agg);
    out
}

pub(crate) fn call_text(call: &Call) -> String {
    let mut out = String::new();
    write_call(&mut out, call);
    out
}

pub(crate) fn binary_text(b: &BinaryExpr) -> String {
    let mut out = String::new();
    write_binary(&mut out, b);
    out
}

fn write_expr(out: &mut String, node: &Expr) {
    match node {
        Expr::NumberLiteral(n) => {
            let _ = write!(out, "{}", n.val);
        }
        Expr::StringLiteral(s) => {
            let _ = write!(out, "\"{}\"", s.val);
        }
        Expr::VectorSelector(vs) => write_selector(out, vs),
        Expr::MatrixSelector(ms) => write_matrix(out, ms),
        Expr::Subquery(sq) => write_subquery(out, sq),
        Expr::Paren(p) => {
            out.push('(');
            write_expr(out, &p.expr);
            out.push(')');
        }
        Expr::Unary(u) => {
            out.push('-');
            write_expr(out, &u.expr);
        }
        Expr::Binary(b) => write_binary(out, b),
        Expr::Call(call) => write_call(out, call),
        Expr::Aggregate(agg) => write_aggregate(out, agg),
        Expr::Extension(_) => out.push_str("<extension>"),
    }
}

fn write_selector(out: &mut String, vs: &VectorSelector) {
    if let Some(name) = &vs.name {
        out.push_str(name);
    }
    write_matchers(out, &vs.matchers, vs.name.is_none());
}

fn write_matchers(out: &mut String, matchers: &Matchers, include_name: bool) {
    let mut parts: Vec<String> = Vec::new();
    for m in &matchers.matchers {
        if !include_name && m.name == METRIC_NAME {
            continue;
        }
        parts.push(format!("{}{}\"{}\"", m.name, match_op_text(&m.op), m.value));
    }
    if !parts.is_empty() {
        let _ = write!(out, "{{{}}}", parts.join(", "));
    }
}

fn match_op_text(op: &MatchOp) -> &'static str {
    match op {
        MatchOp::Equal => "=",
        MatchOp::NotEqual => "!=",
        MatchOp::Re(_) => "=~",
        MatchOp::NotRe(_) => "!~",
    }
}

fn write_matrix(out: &mut String, ms: &MatrixSelector) {
    write_selector(out, &ms.vs);
    let _ = write!(out, "[{}]", duration_text(ms.range));
}

fn write_subquery(out: &mut String, sq: &SubqueryExpr) {
    write_expr(out, &sq.expr);
    match sq.step {
        Some(step) => {
            let _ = write!(
                out,
                "[{}:{}]",
                duration_text(sq.range),
                duration_text(step)
            );
        }
        None => {
            let _ = write!(out, "[{}:]", duration_text(sq.range));
        }
    }
}

fn write_binary(out: &mut String, b: &BinaryExpr) {
    write_expr(out, &b.lhs);
    let _ = write!(out, " {}", token_text(b.op));
    if b.return_bool() {
        out.push_str(" bool");
    }
    if let Some(modifier) = &b.modifier {
        match &modifier.matching {
            Some(LabelModifier::Include(labels)) => {
                let _ = write!(out, " on({})", labels.labels.join(", "));
            }
            Some(LabelModifier::Exclude(labels)) => {
                let _ = write!(out, " ignoring({})", labels.labels.join(", "));
            }
            None => {}
        }
        match &modifier.card {
            VectorMatchCardinality::ManyToOne(labels) => {
                let _ = write!(out, " group_left({})", labels.labels.join(", "));
            }
            VectorMatchCardinality::OneToMany(labels) => {
                let _ = write!(out, " group_right({})", labels.labels.join(", "));
            }
            VectorMatchCardinality::OneToOne | VectorMatchCardinality::ManyToMany => {}
        }
    }
    out.push(' ');
    write_expr(out, &b.rhs);
}

fn write_call(out: &mut String, call: &Call) {
    out.push_str(call.func.name);
    out.push('(');
    for (i, arg) in call.args.args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, arg);
    }
    out.push(')');
}

fn write_aggregate(out: &mut String, agg: &AggregateExpr) {
    out.push_str(aggr_op_text(agg.op));
    match &agg.modifier {
        Some(LabelModifier::Include(labels)) => {
            let _ = write!(out, " by({}) ", labels.labels.join(", "));
        }
        Some(LabelModifier::Exclude(labels)) => {
            let _ = write!(out, " without({}) ", labels.labels.join(", "));
        }
        None => {}
    }
    out.push('(');
    if let Some(param) = &agg.param {
        write_expr(out, param);
        out.push_str(", ");
    }
    write_expr(out, &agg.expr);
    out.push(')');
}

/// Operator token as written in a query.
pub(crate) fn token_text(op: TokenType) -> &'static str {
    match op.id() {
        T_ADD => "+",
        T_SUB => "-",
        T_MUL => "*",
        T_DIV => "/",
        T_MOD => "%",
        T_POW => "^",
        T_EQLC => "==",
        T_NEQ => "!=",
        T_LTE => "<=",
        T_LSS => "<",
        T_GTE => ">=",
        T_GTR => ">",
        T_LAND => "and",
        T_LOR => "or",
        T_LUNLESS => "unless",
        T_ATAN2 => "atan2",
        _ => "?",
    }
}

/// Aggregation operator name, e.g. `sum` or `topk`.
pub fn aggr_op_text(op: TokenType) -> &'static str {
    match op.id() {
        T_SUM => "sum",
        T_MIN => "min",
        T_MAX => "max",
        T_AVG => "avg",
        T_GROUP => "group",
        T_STDDEV => "stddev",
        T_STDVAR => "stdvar",
        T_COUNT => "count",
        T_COUNT_VALUES => "count_values",
        T_QUANTILE => "quantile",
        T_TOPK => "topk",
        T_BOTTOMK => "bottomk",
        _ => "?",
    }
}

fn duration_text(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
