//! Boolean condition tree evaluated against a `MarketSnapshot`.
//!
//! Conditions are a closed sum type rather than a trait-object hierarchy:
//! every variant is known at compile time, evaluation is an exhaustive match,
//! and strategy documents deserialize into it without dynamic dispatch.
//! Evaluation is pure and fail-closed — a missing indicator value makes the
//! condition false, never an error.

use log::trace;

use super::error::TradesimError;
use super::snapshot::MarketSnapshot;

/// Absolute tolerance for `==` comparisons between floats.
pub const EQ_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub fn extract(self, snapshot: &MarketSnapshot) -> f64 {
        match self {
            PriceField::Open => snapshot.candle.open,
            PriceField::High => snapshot.candle.high,
            PriceField::Low => snapshot.candle.low,
            PriceField::Close => snapshot.candle.close,
            PriceField::Volume => snapshot.candle.volume as f64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl ComparisonOp {
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            ComparisonOp::Gt => left > right,
            ComparisonOp::Lt => left < right,
            ComparisonOp::Ge => left >= right,
            ComparisonOp::Le => left <= right,
            ComparisonOp::Eq => (left - right).abs() < EQ_EPSILON,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Le => "<=",
            ComparisonOp::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    PriceVsValue {
        field: PriceField,
        op: ComparisonOp,
        value: f64,
    },
    PriceVsPrice {
        left: PriceField,
        op: ComparisonOp,
        right: PriceField,
    },
    IndicatorVsValue {
        indicator: String,
        op: ComparisonOp,
        value: f64,
    },
    IndicatorVsIndicator {
        left: String,
        op: ComparisonOp,
        right: String,
    },
    PriceVsIndicator {
        field: PriceField,
        op: ComparisonOp,
        indicator: String,
    },
    /// Fast series was at or below slow on the previous bar and is strictly
    /// above on this bar. False whenever any of the four values is missing,
    /// including the first evaluated bar.
    CrossesAbove { fast: String, slow: String },
    CrossesBelow { fast: String, slow: String },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// Conjunction over a non-empty child list.
    pub fn and(children: Vec<Condition>) -> Result<Condition, TradesimError> {
        if children.is_empty() {
            return Err(TradesimError::StrategyInvalid {
                reason: "AND condition requires at least one child".to_string(),
            });
        }
        Ok(Condition::And(children))
    }

    /// Disjunction over a non-empty child list.
    pub fn or(children: Vec<Condition>) -> Result<Condition, TradesimError> {
        if children.is_empty() {
            return Err(TradesimError::StrategyInvalid {
                reason: "OR condition requires at least one child".to_string(),
            });
        }
        Ok(Condition::Or(children))
    }

    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> bool {
        match self {
            Condition::PriceVsValue { field, op, value } => {
                op.compare(field.extract(snapshot), *value)
            }
            Condition::PriceVsPrice { left, op, right } => {
                op.compare(left.extract(snapshot), right.extract(snapshot))
            }
            Condition::IndicatorVsValue {
                indicator,
                op,
                value,
            } => match snapshot.indicator(indicator) {
                Some(current) => op.compare(current, *value),
                None => {
                    trace!("indicator {indicator} missing at {}; condition false", snapshot.timestamp);
                    false
                }
            },
            Condition::IndicatorVsIndicator { left, op, right } => {
                match (snapshot.indicator(left), snapshot.indicator(right)) {
                    (Some(l), Some(r)) => op.compare(l, r),
                    _ => false,
                }
            }
            Condition::PriceVsIndicator {
                field,
                op,
                indicator,
            } => match snapshot.indicator(indicator) {
                Some(value) => op.compare(field.extract(snapshot), value),
                None => false,
            },
            Condition::CrossesAbove { fast, slow } => {
                match cross_inputs(snapshot, fast, slow) {
                    Some((fast_prev, slow_prev, fast_now, slow_now)) => {
                        fast_prev <= slow_prev && fast_now > slow_now
                    }
                    None => false,
                }
            }
            Condition::CrossesBelow { fast, slow } => {
                match cross_inputs(snapshot, fast, slow) {
                    Some((fast_prev, slow_prev, fast_now, slow_now)) => {
                        fast_prev >= slow_prev && fast_now < slow_now
                    }
                    None => false,
                }
            }
            Condition::And(children) => children.iter().all(|c| c.evaluate(snapshot)),
            Condition::Or(children) => children.iter().any(|c| c.evaluate(snapshot)),
        }
    }

    /// Human-readable rendering for logs and `validate` output.
    pub fn describe(&self) -> String {
        match self {
            Condition::PriceVsValue { field, op, value } => {
                format!("{} {} {}", field.as_str(), op.as_str(), value)
            }
            Condition::PriceVsPrice { left, op, right } => {
                format!("{} {} {}", left.as_str(), op.as_str(), right.as_str())
            }
            Condition::IndicatorVsValue {
                indicator,
                op,
                value,
            } => format!("{indicator} {} {value}", op.as_str()),
            Condition::IndicatorVsIndicator { left, op, right } => {
                format!("{left} {} {right}", op.as_str())
            }
            Condition::PriceVsIndicator {
                field,
                op,
                indicator,
            } => format!("{} {} {indicator}", field.as_str(), op.as_str()),
            Condition::CrossesAbove { fast, slow } => {
                format!("{fast} crosses above {slow}")
            }
            Condition::CrossesBelow { fast, slow } => {
                format!("{fast} crosses below {slow}")
            }
            Condition::And(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.describe()).collect();
                format!("({})", parts.join(" AND "))
            }
            Condition::Or(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.describe()).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    /// Collects every indicator name referenced anywhere in the tree.
    pub fn collect_indicator_names(&self, out: &mut Vec<String>) {
        match self {
            Condition::PriceVsValue { .. } | Condition::PriceVsPrice { .. } => {}
            Condition::IndicatorVsValue { indicator, .. }
            | Condition::PriceVsIndicator { indicator, .. } => push_unique(out, indicator),
            Condition::IndicatorVsIndicator { left, right, .. } => {
                push_unique(out, left);
                push_unique(out, right);
            }
            Condition::CrossesAbove { fast, slow } | Condition::CrossesBelow { fast, slow } => {
                push_unique(out, fast);
                push_unique(out, slow);
            }
            Condition::And(children) | Condition::Or(children) => {
                for child in children {
                    child.collect_indicator_names(out);
                }
            }
        }
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|existing| existing == name) {
        out.push(name.to_string());
    }
}

fn cross_inputs(
    snapshot: &MarketSnapshot,
    fast: &str,
    slow: &str,
) -> Option<(f64, f64, f64, f64)> {
    Some((
        snapshot.previous_indicator(fast)?,
        snapshot.previous_indicator(slow)?,
        snapshot.indicator(fast)?,
        snapshot.indicator(slow)?,
    ))
}
