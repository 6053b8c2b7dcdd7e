//! Label-flow analysis for PromQL expressions.
//!
//! [`labels_source`] walks a query AST and computes, for every stream of
//! series the query can produce, a [`Source`] summary: which labels are
//! guaranteed to be present, which are guaranteed to be removed, whether
//! the label set is fixed, whether the stream is dead code, and the
//! constant value for pure-arithmetic branches.
//!
//! The analysis is conservative: it must never claim a label is guaranteed
//! when evaluation could return series without it. It also never fails;
//! unsupported constructs produce opaque sources instead of errors.

use std::collections::HashMap;

use promql_parser::label::{METRIC_NAME, MatchOp};
use promql_parser::parser::token::*;
use promql_parser::parser::value::ValueType;
use promql_parser::parser::{
    AggregateExpr, BinaryExpr, Call, Expr, LabelModifier, VectorMatchCardinality, VectorSelector,
};

use crate::promql::printer::{aggregate_text, binary_text, call_text, node_text};

/// What kind of node produced a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    #[default]
    Unknown,
    Number,
    String,
    Selector,
    Func,
    Aggregate,
}

/// Why a label is guaranteed to be missing from the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedLabel {
    pub reason: String,
    pub fragment: String,
}

/// Summary of one possible stream of series produced by an expression.
///
/// Sources are immutable value aggregates: every branch of the walk clones
/// and transforms its own copy, sibling branches never share one.
#[derive(Debug, Clone, Default)]
pub struct Source {
    /// Vector selectors contributing to this stream.
    pub selectors: Vec<VectorSelector>,
    /// The originating function call, when `kind` is [`SourceKind::Func`].
    pub call: Option<Call>,
    /// Reason why a label was excluded. The empty key means "every other
    /// label".
    pub exclude_reason: HashMap<String, ExcludedLabel>,
    /// Textual tag for diagnostics, e.g. `sum`, `rate` or `one-to-one`.
    pub operation: String,
    /// Value type of this stream, `None` for unsupported constructs.
    pub returns: Option<ValueType>,
    /// If `always_returns` is true these are the values that are returned.
    pub returned_numbers: Vec<f64>,
    /// Labels included by filters, present if they exist on source series.
    pub included_labels: Vec<String>,
    /// Labels guaranteed to be excluded from the results.
    pub excluded_labels: Vec<String>,
    /// Labels guaranteed to be present on the results.
    pub guaranteed_labels: Vec<String>,
    pub kind: SourceKind,
    /// Labels are fixed and only allowed labels can be present.
    pub fixed_labels: bool,
    /// True if this source cannot be reached and is dead code.
    pub is_dead: bool,
    /// True if this source always returns results.
    pub always_returns: bool,
}

/// Analyze `node` and return one source per possible result stream.
///
/// Returns more than one source when branches can produce distinct streams,
/// for example both sides of an `or`.
pub fn labels_source(node: &Expr) -> Vec<Source> {
    walk_node(node)
}

fn walk_node(node: &Expr) -> Vec<Source> {
    let mut src = Vec::new();
    match node {
        Expr::Aggregate(agg) => src.extend(walk_aggregation(agg)),

        Expr::Binary(b) => src.extend(walk_binary(b)),

        Expr::Call(call) => src.push(walk_call(call)),

        Expr::MatrixSelector(ms) => src.push(selector_source(&ms.vs)),

        Expr::Subquery(sq) => src.extend(walk_node(&sq.expr)),

        Expr::NumberLiteral(n) => {
            let mut s = Source {
                kind: SourceKind::Number,
                returns: Some(ValueType::Scalar),
                fixed_labels: true,
                always_returns: true,
                ..Default::default()
            };
            s.returned_numbers.push(n.val);
            s.exclude_reason.insert(
                String::new(),
                ExcludedLabel {
                    reason: "This returns a number value with no labels.".to_string(),
                    fragment: node_text(node),
                },
            );
            src.push(s);
        }

        Expr::Paren(p) => src.extend(walk_node(&p.expr)),

        Expr::StringLiteral(_) => {
            let mut s = Source {
                kind: SourceKind::String,
                returns: Some(ValueType::String),
                fixed_labels: true,
                always_returns: true,
                ..Default::default()
            };
            s.exclude_reason.insert(
                String::new(),
                ExcludedLabel {
                    reason: "This returns a string value with no labels.".to_string(),
                    fragment: node_text(node),
                },
            );
            src.push(s);
        }

        Expr::Unary(u) => src.extend(walk_node(&u.expr)),

        Expr::VectorSelector(vs) => src.push(selector_source(vs)),

        Expr::Extension(_) => {
            // Not produced by the parser.
        }
    }
    src
}

fn selector_source(vs: &VectorSelector) -> Source {
    let mut s = Source {
        kind: SourceKind::Selector,
        returns: Some(ValueType::Vector),
        ..Default::default()
    };
    s.selectors.push(vs.clone());
    let guaranteed = labels_from_selectors(std::slice::from_ref(vs), is_positive_matcher);
    append_unique(&mut s.guaranteed_labels, guaranteed);
    s
}

fn append_unique<I>(dst: &mut Vec<String>, values: I)
where
    I: IntoIterator<Item = String>,
{
    for v in values {
        if !dst.contains(&v) {
            dst.push(v);
        }
    }
}

fn remove_all(dst: &mut Vec<String>, values: &[String]) {
    dst.retain(|v| !values.contains(v));
}

/// Any label used in positive filters is guaranteed to be present, but only
/// if every selector filters on it.
fn labels_from_selectors<F>(selectors: &[VectorSelector], accept: F) -> Vec<String>
where
    F: Fn(&MatchOp) -> bool,
{
    let mut names: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for selector in selectors {
        for lm in &selector.matchers.matchers {
            if lm.name == METRIC_NAME {
                continue;
            }
            if !accept(&lm.op) {
                continue;
            }
            if !names.contains(&lm.name) {
                names.push(lm.name.clone());
            }
            *counts.entry(lm.name.clone()).or_insert(0) += 1;
        }
    }
    names.retain(|name| counts.get(name).copied().unwrap_or(0) == selectors.len());
    names
}

fn is_positive_matcher(op: &MatchOp) -> bool {
    matches!(op, MatchOp::Equal | MatchOp::Re(_))
}

fn is_equal_matcher(op: &MatchOp) -> bool {
    matches!(op, MatchOp::Equal)
}

fn walk_aggregation(n: &AggregateExpr) -> Vec<Source> {
    let mut src = Vec::new();
    match n.op.id() {
        T_SUM | T_MIN | T_MAX | T_AVG | T_GROUP | T_STDDEV | T_STDVAR | T_COUNT | T_QUANTILE => {
            for mut s in parse_aggregation(n) {
                s.operation = aggr_operation(n.op);
                src.push(s);
            }
        }
        T_COUNT_VALUES => {
            for mut s in parse_aggregation(n) {
                s.operation = aggr_operation(n.op);
                // Param is the label to store the count value in.
                if let Some(Expr::StringLiteral(lit)) = n.param.as_deref() {
                    append_unique(&mut s.guaranteed_labels, [lit.val.clone()]);
                    append_unique(&mut s.included_labels, [lit.val.clone()]);
                    remove_all(&mut s.excluded_labels, std::slice::from_ref(&lit.val));
                    s.exclude_reason.remove(&lit.val);
                }
                src.push(s);
            }
        }
        T_TOPK | T_BOTTOMK => {
            // topk/bottomk only samples series, the labels pass through.
            for mut s in walk_node(&n.expr) {
                s.kind = SourceKind::Aggregate;
                s.operation = aggr_operation(n.op);
                src.push(s);
            }
        }
        _ => {
            // limitk / limit_ratio need an experimental parser flag, anything
            // else cannot be produced by the parser.
        }
    }
    src
}

fn aggr_operation(op: TokenType) -> String {
    crate::promql::printer::aggr_op_text(op).to_string()
}

fn parse_aggregation(n: &AggregateExpr) -> Vec<Source> {
    let (without, grouping) = match &n.modifier {
        Some(LabelModifier::Exclude(labels)) => (true, labels.labels.clone()),
        Some(LabelModifier::Include(labels)) => (false, labels.labels.clone()),
        None => (false, Vec::new()),
    };

    let mut src = Vec::new();
    for mut s in walk_node(&n.expr) {
        if without {
            append_unique(&mut s.excluded_labels, grouping.iter().cloned());
            remove_all(&mut s.included_labels, &grouping);
            remove_all(&mut s.guaranteed_labels, &grouping);
            let reason = format!(
                "Query is using aggregation with `without({})`, all labels included inside `without(...)` will be removed from the results.",
                grouping.join(", ")
            );
            for name in &grouping {
                s.exclude_reason.insert(
                    name.clone(),
                    ExcludedLabel {
                        reason: reason.clone(),
                        fragment: aggregate_text(n),
                    },
                );
            }
        } else {
            if grouping.is_empty() {
                s.included_labels.clear();
                s.guaranteed_labels.clear();
                s.exclude_reason.insert(
                    String::new(),
                    ExcludedLabel {
                        reason: "Query is using aggregation that removes all labels."
                            .to_string(),
                        fragment: aggregate_text(n),
                    },
                );
            } else {
                // Skip the projection if the source already fixes labels.
                if !s.fixed_labels {
                    append_unique(&mut s.included_labels, grouping.iter().cloned());
                    remove_all(&mut s.excluded_labels, &grouping);
                    s.exclude_reason.insert(
                        String::new(),
                        ExcludedLabel {
                            reason: format!(
                                "Query is using aggregation with `by({})`, only labels included inside `by(...)` will be present on the results.",
                                grouping.join(", ")
                            ),
                            fragment: aggregate_text(n),
                        },
                    );
                }
                s.guaranteed_labels.retain(|name| grouping.contains(name));
            }
            s.fixed_labels = true;
        }
        s.kind = SourceKind::Aggregate;
        s.returns = Some(ValueType::Vector);
        s.call = None;
        src.push(s);
    }
    src
}

fn walk_call(n: &Call) -> Source {
    let mut s = Source {
        kind: SourceKind::Func,
        operation: n.func.name.to_string(),
        call: Some(n.clone()),
        ..Default::default()
    };

    // Gather selectors from every vector or matrix argument.
    for (i, arg) in n.args.args.iter().enumerate() {
        let Some(vt) = n.func.arg_types.get(i).or(n.func.arg_types.last()) else {
            continue;
        };
        if matches!(vt, ValueType::Vector | ValueType::Matrix) {
            for es in walk_node(arg) {
                s.selectors.extend(es.selectors);
            }
        }
    }

    match n.func.name {
        "abs" | "sgn" | "acos" | "acosh" | "asin" | "asinh" | "atan" | "atanh" | "cos"
        | "cosh" | "sin" | "sinh" | "tan" | "tanh" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "ceil" | "floor" | "round" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "changes" | "resets" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "clamp" | "clamp_max" | "clamp_min" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "absent" | "absent_over_time" => {
            s.returns = Some(ValueType::Vector);
            s.fixed_labels = true;
            for name in labels_from_selectors(&s.selectors, is_equal_matcher) {
                append_unique(&mut s.included_labels, [name.clone()]);
                append_unique(&mut s.guaranteed_labels, [name]);
            }
            s.exclude_reason.insert(
                String::new(),
                ExcludedLabel {
                    reason: format!(
                        "The [{name}()](https://prometheus.io/docs/prometheus/latest/querying/functions/#{name}) function is used to check if provided query doesn't match any time series.\n\
                         You will only get any results back if the metric selector you pass doesn't match anything.\n\
                         Since there are no matching time series there are also no labels. If some time series is missing you cannot read its labels.\n\
                         This means that the only labels you can get back from absent call are the ones you pass to it.\n\
                         If you're hoping to get instance specific labels this way and alert when some target is down then that won't work, use the `up` metric instead.",
                        name = n.func.name
                    ),
                    fragment: call_text(n),
                },
            );
        }

        "avg_over_time" | "count_over_time" | "last_over_time" | "max_over_time"
        | "min_over_time" | "present_over_time" | "quantile_over_time" | "stddev_over_time"
        | "stdvar_over_time" | "sum_over_time" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "days_in_month" | "day_of_month" | "day_of_week" | "day_of_year" | "hour" | "minute"
        | "month" | "year" => {
            s.returns = Some(ValueType::Vector);
            // No labels if we don't pass any arguments.
            // Otherwise no change to labels.
            if n.args.args.is_empty() {
                s.fixed_labels = true;
                s.always_returns = true;
                s.included_labels.clear();
                s.guaranteed_labels.clear();
                s.exclude_reason.insert(
                    String::new(),
                    ExcludedLabel {
                        reason: format!(
                            "Calling `{}()` with no arguments will return an empty time series with no labels.",
                            n.func.name
                        ),
                        fragment: call_text(n),
                    },
                );
            } else {
                let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
                append_unique(&mut s.guaranteed_labels, guaranteed);
            }
        }

        "deg" | "rad" | "ln" | "log10" | "log2" | "sqrt" | "exp" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "delta" | "idelta" | "increase" | "deriv" | "irate" | "rate" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "histogram_avg" | "histogram_count" | "histogram_sum" | "histogram_stddev"
        | "histogram_stdvar" | "histogram_fraction" | "histogram_quantile" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "holt_winters" | "predict_linear" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "label_replace" | "label_join" => {
            // One label added to the results.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
            if let Some(Expr::StringLiteral(lit)) = n.args.args.get(1).map(|a| a.as_ref()) {
                append_unique(&mut s.guaranteed_labels, [lit.val.clone()]);
            }
        }

        "pi" | "scalar" | "time" => {
            s.returns = Some(ValueType::Scalar);
            s.included_labels.clear();
            s.guaranteed_labels.clear();
            s.fixed_labels = true;
            s.always_returns = true;
            s.exclude_reason.insert(
                String::new(),
                ExcludedLabel {
                    reason: format!(
                        "Calling `{}()` will return a scalar value with no labels.",
                        n.func.name
                    ),
                    fragment: call_text(n),
                },
            );
        }

        "sort" | "sort_desc" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
        }

        "timestamp" => {
            // No change to labels.
            s.returns = Some(ValueType::Vector);
            let guaranteed = labels_from_selectors(&s.selectors, is_positive_matcher);
            append_unique(&mut s.guaranteed_labels, guaranteed);
        }

        "vector" => {
            s.returns = Some(ValueType::Vector);
            s.included_labels.clear();
            s.guaranteed_labels.clear();
            s.fixed_labels = true;
            s.always_returns = true;
            if let Some(Expr::NumberLiteral(v)) = n.args.args.first().map(|a| a.as_ref()) {
                s.returned_numbers.push(v.val);
            }
            s.exclude_reason.insert(
                String::new(),
                ExcludedLabel {
                    reason: format!(
                        "Calling `{}()` will return a vector value with no labels.",
                        n.func.name
                    ),
                    fragment: call_text(n),
                },
            );
        }

        _ => {
            // Unsupported function.
            s.returns = None;
            s.call = None;
        }
    }
    s
}

fn walk_binary(n: &BinaryExpr) -> Vec<Source> {
    // Set operators always use many-to-many matching, even when written
    // without any modifier.
    if matches!(n.op.id(), T_LAND | T_LOR | T_LUNLESS) {
        return walk_set_op(n);
    }

    if let Some(modifier) = &n.modifier {
        match &modifier.card {
            // foo{} + on(...) group_left(...) bar{}
            // labels come from the many side, here the LHS
            VectorMatchCardinality::ManyToOne(include) => {
                return group_modifier_sources(n, &n.lhs, &include.labels);
            }
            // foo{} + on(...) group_right(...) bar{}
            // labels come from the many side, here the RHS
            VectorMatchCardinality::OneToMany(include) => {
                return group_modifier_sources(n, &n.rhs, &include.labels);
            }
            // foo{} + on(...)       bar{}
            // foo{} + ignoring(...) bar{}
            VectorMatchCardinality::OneToOne if modifier.matching.is_some() => {
                return one_to_one_sources(n);
            }
            VectorMatchCardinality::OneToOne | VectorMatchCardinality::ManyToMany => {}
        }
    }

    // foo{} + 1
    // 1 + foo{}
    // foo{} > 1
    // foo{} + bar{}
    let mut src = Vec::new();
    let lhs = walk_node(&n.lhs);
    let rhs = walk_node(&n.rhs);
    for ls in &lhs {
        for rs in &rhs {
            if ls.always_returns && rs.always_returns {
                // Both sides always return something, fold the numbers.
                let mut s = ls.clone();
                for (i, lv) in ls.returned_numbers.iter().enumerate() {
                    for rv in &rs.returned_numbers {
                        let (val, dead) = calculate_static_return(*lv, *rv, n.op, s.is_dead);
                        s.returned_numbers[i] = val;
                        s.is_dead = dead;
                    }
                }
                src.push(s);
            } else if matches!(ls.returns, Some(ValueType::Vector | ValueType::Matrix)) {
                // Use labels from LHS.
                let mut s = ls.clone();
                if s.operation.is_empty()
                    && matches!(rs.returns, Some(ValueType::Vector | ValueType::Matrix))
                {
                    s.operation = "one-to-one".to_string();
                }
                src.push(s);
            } else if matches!(rs.returns, Some(ValueType::Vector | ValueType::Matrix)) {
                // Use labels from RHS.
                src.push(rs.clone());
            }
        }
    }
    src
}

fn one_to_one_sources(n: &BinaryExpr) -> Vec<Source> {
    let matching = n.modifier.as_ref().and_then(|m| m.matching.as_ref());
    let mut src = Vec::new();
    for mut s in walk_node(&n.lhs) {
        match matching {
            Some(LabelModifier::Include(on)) => {
                s.fixed_labels = true;
                append_unique(&mut s.included_labels, on.labels.iter().cloned());
                remove_all(&mut s.excluded_labels, &on.labels);
                for name in &on.labels {
                    s.exclude_reason.remove(name);
                }
                s.exclude_reason.insert(
                    String::new(),
                    ExcludedLabel {
                        reason: format!(
                            "Query is using one-to-one vector matching with `on({})`, only labels included inside `on(...)` will be present on the results.",
                            on.labels.join(", ")
                        ),
                        fragment: binary_text(n),
                    },
                );
            }
            Some(LabelModifier::Exclude(ignoring)) => {
                remove_all(&mut s.included_labels, &ignoring.labels);
                remove_all(&mut s.guaranteed_labels, &ignoring.labels);
                append_unique(&mut s.excluded_labels, ignoring.labels.iter().cloned());
                let reason = format!(
                    "Query is using one-to-one vector matching with `ignoring({})`, all labels included inside `ignoring(...)` will be removed on the results.",
                    ignoring.labels.join(", ")
                );
                for name in &ignoring.labels {
                    s.exclude_reason.insert(
                        name.clone(),
                        ExcludedLabel {
                            reason: reason.clone(),
                            fragment: binary_text(n),
                        },
                    );
                }
            }
            None => {}
        }
        if s.operation.is_empty() {
            s.operation = "one-to-one".to_string();
        }
        src.push(s);
    }
    src
}

fn group_modifier_sources(n: &BinaryExpr, many_side: &Expr, include: &[String]) -> Vec<Source> {
    let card_name = match n.modifier.as_ref().map(|m| &m.card) {
        Some(VectorMatchCardinality::ManyToOne(_)) => "many-to-one",
        Some(VectorMatchCardinality::OneToMany(_)) => "one-to-many",
        _ => "one-to-one",
    };
    let on_labels = n.modifier.as_ref().and_then(|m| match &m.matching {
        Some(LabelModifier::Include(on)) => Some(&on.labels),
        _ => None,
    });

    let mut src = Vec::new();
    for mut s in walk_node(many_side) {
        append_unique(&mut s.included_labels, include.iter().cloned());
        if let Some(on) = on_labels {
            append_unique(&mut s.included_labels, on.iter().cloned());
            for name in on {
                s.exclude_reason.remove(name);
            }
        }
        remove_all(&mut s.excluded_labels, include);
        for name in include {
            s.exclude_reason.remove(name);
        }
        if s.operation.is_empty() {
            s.operation = card_name.to_string();
        }
        src.push(s);
    }
    src
}

// foo{} and on(...)       bar{}
// foo{} and ignoring(...) bar{}
fn walk_set_op(n: &BinaryExpr) -> Vec<Source> {
    let on_labels = n.modifier.as_ref().and_then(|m| match &m.matching {
        Some(LabelModifier::Include(on)) => Some(&on.labels),
        _ => None,
    });

    let mut src = Vec::new();
    // True if any of the LHS branches can produce empty results.
    let mut lhs_can_be_empty = false;
    for mut s in walk_node(&n.lhs) {
        if let Some(on) = on_labels {
            append_unique(&mut s.included_labels, on.iter().cloned());
            for name in on {
                s.exclude_reason.remove(name);
            }
        }
        if s.operation.is_empty() {
            s.operation = "many-to-many".to_string();
        }
        if !s.always_returns {
            lhs_can_be_empty = true;
        }
        src.push(s);
    }
    if n.op.id() == T_LOR {
        for mut s in walk_node(&n.rhs) {
            if s.operation.is_empty() {
                s.operation = "many-to-many".to_string();
            }
            // If LHS can NOT be empty then RHS is dead code.
            if !lhs_can_be_empty {
                s.is_dead = true;
            }
            src.push(s);
        }
    }
    src
}

fn calculate_static_return(lv: f64, rv: f64, op: TokenType, is_dead: bool) -> (f64, bool) {
    match op.id() {
        T_EQLC => {
            if lv != rv {
                (lv, true)
            } else {
                (lv, is_dead)
            }
        }
        T_NEQ => {
            if lv == rv {
                (lv, true)
            } else {
                (lv, is_dead)
            }
        }
        T_LTE => {
            if lv > rv {
                (lv, true)
            } else {
                (lv, is_dead)
            }
        }
        T_LSS => {
            if lv >= rv {
                (lv, true)
            } else {
                (lv, is_dead)
            }
        }
        T_GTE => {
            if lv < rv {
                (lv, true)
            } else {
                (lv, is_dead)
            }
        }
        T_GTR => {
            if lv <= rv {
                (lv, true)
            } else {
                (lv, is_dead)
            }
        }
        T_ADD => (lv + rv, is_dead),
        T_SUB => (lv - rv, is_dead),
        T_MUL => (lv * rv, is_dead),
        // Division by zero follows IEEE-754 floats.
        T_DIV => (lv / rv, is_dead),
        T_MOD => (lv % rv, is_dead),
        T_POW => (lv.powf(rv), is_dead),
        _ => (lv, is_dead),
    }
}
