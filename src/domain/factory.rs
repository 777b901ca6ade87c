//! Builds `Strategy` objects from JSON documents.
//!
//! Parsing is all-or-nothing: any missing field, unknown tag, or wrong type
//! fails the whole document with a `StrategyInvalid` error naming the
//! offending piece. A successfully built strategy never needs re-validation.
//!
//! Document shape:
//!
//! ```json
//! {
//!   "strategy_name": "sma-crossover",
//!   "instruments": ["ACME"],
//!   "timeframes": ["day"],
//!   "sizing": { "method": "CapitalBased", "value": 50, "is_percentage": true },
//!   "entry_rules": [
//!     { "rule_name": "golden-cross", "action": "EnterLong",
//!       "condition": { "type": "CrossesAbove", "fast": "SMA(10)", "slow": "SMA(20)" } }
//!   ],
//!   "exit_rules": [
//!     { "rule_name": "overbought", "action": "ExitLong",
//!       "condition": { "type": "Indicator", "indicator": "RSI(14)", "operator": ">", "value": 70 } }
//!   ]
//! }
//! ```

use serde_json::Value;

use super::candle::SignalAction;
use super::condition::{ComparisonOp, Condition, PriceField};
use super::error::TradesimError;
use super::indicator::parse_indicator_name;
use super::rule::Rule;
use super::strategy::{Sizing, SizingMethod, Strategy};

fn invalid(reason: impl Into<String>) -> TradesimError {
    TradesimError::StrategyInvalid {
        reason: reason.into(),
    }
}

/// Parses a JSON string and builds the strategy it describes.
pub fn strategy_from_json(text: &str) -> Result<Strategy, TradesimError> {
    let doc: Value =
        serde_json::from_str(text).map_err(|e| invalid(format!("malformed JSON: {e}")))?;
    strategy_from_value(&doc)
}

/// Builds a strategy from an already-parsed JSON document.
pub fn strategy_from_value(doc: &Value) -> Result<Strategy, TradesimError> {
    let name = require_str(doc, "strategy_name")?;
    let instruments = require_string_array(doc, "instruments")?;
    let timeframes = require_string_array(doc, "timeframes")?;

    let entry_rules = parse_rules(doc, "entry_rules", true)?;
    let exit_rules = parse_rules(doc, "exit_rules", false)?;
    let sizing = parse_sizing(doc)?;

    Strategy::new(name, instruments, timeframes, entry_rules, exit_rules, sizing)
}

fn parse_rules(doc: &Value, key: &str, required: bool) -> Result<Vec<Rule>, TradesimError> {
    let array = match doc.get(key) {
        Some(value) => value
            .as_array()
            .ok_or_else(|| invalid(format!("'{key}' must be an array")))?,
        None if required => return Err(invalid(format!("missing '{key}' array"))),
        None => return Ok(Vec::new()),
    };

    array.iter().map(|rule_doc| parse_rule(rule_doc, key)).collect()
}

fn parse_rule(doc: &Value, context: &str) -> Result<Rule, TradesimError> {
    let name = require_str(doc, "rule_name")
        .map_err(|_| invalid(format!("rule in '{context}' is missing 'rule_name'")))?;
    let action = parse_action(require_str(doc, "action")?)?;
    let condition_doc = doc
        .get("condition")
        .ok_or_else(|| invalid(format!("rule '{name}' is missing 'condition'")))?;
    let condition = parse_condition(condition_doc)?;
    Rule::new(name, condition, action)
}

fn parse_condition(doc: &Value) -> Result<Condition, TradesimError> {
    let kind = require_str(doc, "type")?;
    match kind {
        "Price" => {
            let field = parse_price_field(require_str(doc, "field")?)?;
            let op = parse_operator(require_str(doc, "operator")?)?;
            // "value" is a number for a fixed threshold, or a string naming
            // another price field.
            match doc.get("value") {
                Some(Value::String(other)) => Ok(Condition::PriceVsPrice {
                    left: field,
                    op,
                    right: parse_price_field(other)?,
                }),
                Some(value) => Ok(Condition::PriceVsValue {
                    field,
                    op,
                    value: as_f64(value, "value")?,
                }),
                None => Err(invalid("Price condition is missing 'value'")),
            }
        }
        "Indicator" => {
            let indicator = checked_indicator(require_str(doc, "indicator")?)?;
            let op = parse_operator(require_str(doc, "operator")?)?;
            match doc.get("value") {
                Some(Value::String(other)) => Ok(Condition::IndicatorVsIndicator {
                    left: indicator,
                    op,
                    right: checked_indicator(other)?,
                }),
                Some(value) => Ok(Condition::IndicatorVsValue {
                    indicator,
                    op,
                    value: as_f64(value, "value")?,
                }),
                None => Err(invalid("Indicator condition is missing 'value'")),
            }
        }
        "PriceIndicator" => Ok(Condition::PriceVsIndicator {
            field: parse_price_field(require_str(doc, "field")?)?,
            op: parse_operator(require_str(doc, "operator")?)?,
            indicator: checked_indicator(require_str(doc, "indicator")?)?,
        }),
        "CrossesAbove" => {
            let (fast, slow) = cross_operands(doc)?;
            Ok(Condition::CrossesAbove { fast, slow })
        }
        "CrossesBelow" => {
            let (fast, slow) = cross_operands(doc)?;
            Ok(Condition::CrossesBelow { fast, slow })
        }
        "AND" => Condition::and(parse_children(doc)?),
        "OR" => Condition::or(parse_children(doc)?),
        other => Err(invalid(format!("unknown condition type '{other}'"))),
    }
}

// A series can never cross itself.
fn cross_operands(doc: &Value) -> Result<(String, String), TradesimError> {
    let fast = checked_indicator(require_str(doc, "fast")?)?;
    let slow = checked_indicator(require_str(doc, "slow")?)?;
    if fast == slow {
        return Err(invalid(format!(
            "cross condition compares '{fast}' with itself"
        )));
    }
    Ok((fast, slow))
}

fn parse_children(doc: &Value) -> Result<Vec<Condition>, TradesimError> {
    doc.get("conditions")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("composite condition requires a 'conditions' array"))?
        .iter()
        .map(parse_condition)
        .collect()
}

fn parse_sizing(doc: &Value) -> Result<Sizing, TradesimError> {
    // Older documents omit sizing entirely; they trade one unit.
    let Some(sizing_doc) = doc.get("sizing") else {
        return Ok(Sizing::quantity(1.0));
    };

    let method = match require_str(sizing_doc, "method")? {
        "Quantity" => SizingMethod::Quantity,
        "CapitalBased" => SizingMethod::CapitalBased,
        other => {
            return Err(TradesimError::SizingInvalid {
                reason: format!("unknown sizing method '{other}'"),
            })
        }
    };
    let value = sizing_doc
        .get("value")
        .and_then(Value::as_f64)
        .ok_or_else(|| TradesimError::SizingInvalid {
            reason: "sizing requires a numeric 'value'".to_string(),
        })?;
    if value <= 0.0 {
        return Err(TradesimError::SizingInvalid {
            reason: format!("sizing value {value} must be positive"),
        });
    }
    let is_percentage = sizing_doc
        .get("is_percentage")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(Sizing {
        method,
        value,
        is_percentage,
    })
}

fn parse_action(s: &str) -> Result<SignalAction, TradesimError> {
    match s {
        "EnterLong" => Ok(SignalAction::EnterLong),
        "ExitLong" => Ok(SignalAction::ExitLong),
        "EnterShort" => Ok(SignalAction::EnterShort),
        "ExitShort" => Ok(SignalAction::ExitShort),
        other => Err(invalid(format!("unknown action '{other}'"))),
    }
}

fn parse_operator(s: &str) -> Result<ComparisonOp, TradesimError> {
    match s {
        ">" => Ok(ComparisonOp::Gt),
        "<" => Ok(ComparisonOp::Lt),
        ">=" => Ok(ComparisonOp::Ge),
        "<=" => Ok(ComparisonOp::Le),
        "==" => Ok(ComparisonOp::Eq),
        other => Err(invalid(format!("unknown operator '{other}'"))),
    }
}

fn parse_price_field(s: &str) -> Result<PriceField, TradesimError> {
    match s {
        "open" => Ok(PriceField::Open),
        "high" => Ok(PriceField::High),
        "low" => Ok(PriceField::Low),
        "close" => Ok(PriceField::Close),
        "volume" => Ok(PriceField::Volume),
        other => Err(invalid(format!("unknown price field '{other}'"))),
    }
}

/// Indicator names are validated at build time so a typo fails the document
/// instead of silently never matching a value at runtime.
fn checked_indicator(name: &str) -> Result<String, TradesimError> {
    parse_indicator_name(name)?;
    Ok(name.to_string())
}

fn require_str<'a>(doc: &'a Value, key: &str) -> Result<&'a str, TradesimError> {
    doc.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("missing or non-string '{key}'")))
}

fn require_string_array(doc: &Value, key: &str) -> Result<Vec<String>, TradesimError> {
    let array = doc
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("missing '{key}' array")))?;
    array
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("'{key}' entries must be strings")))
        })
        .collect()
}

fn as_f64(value: &Value, key: &str) -> Result<f64, TradesimError> {
    value
        .as_f64()
        .ok_or_else(|| invalid(format!("'{key}' must be a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_doc() -> Value {
        json!({
            "strategy_name": "breakout",
            "instruments": ["ACME"],
            "timeframes": ["day"],
            "entry_rules": [
                {
                    "rule_name": "enter",
                    "action": "EnterLong",
                    "condition": { "type": "Price", "field": "close", "operator": ">", "value": 100.0 }
                }
            ],
            "exit_rules": [
                {
                    "rule_name": "exit",
                    "action": "ExitLong",
                    "condition": { "type": "Price", "field": "close", "operator": "<", "value": 95.0 }
                }
            ],
            "sizing": { "method": "Quantity", "value": 10 }
        })
    }

    #[test]
    fn builds_minimal_strategy() {
        let strategy = strategy_from_value(&minimal_doc()).unwrap();
        assert_eq!(strategy.name(), "breakout");
        assert_eq!(strategy.instruments(), &["ACME"]);
        assert_eq!(strategy.entry_rules().len(), 1);
        assert_eq!(strategy.exit_rules().len(), 1);
        assert_eq!(strategy.sizing().method, SizingMethod::Quantity);
        assert!((strategy.sizing().value - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn builds_from_json_text() {
        let text = minimal_doc().to_string();
        assert!(strategy_from_json(&text).is_ok());
        assert!(strategy_from_json("{not json").is_err());
    }

    #[test]
    fn missing_sizing_defaults_to_one_unit() {
        let mut doc = minimal_doc();
        doc.as_object_mut().unwrap().remove("sizing");
        let strategy = strategy_from_value(&doc).unwrap();
        assert_eq!(strategy.sizing().method, SizingMethod::Quantity);
        assert!((strategy.sizing().value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exit_rules_may_be_absent() {
        let mut doc = minimal_doc();
        doc.as_object_mut().unwrap().remove("exit_rules");
        let strategy = strategy_from_value(&doc).unwrap();
        assert!(strategy.exit_rules().is_empty());
    }

    #[test]
    fn rejects_missing_required_fields() {
        for key in ["strategy_name", "instruments", "timeframes", "entry_rules"] {
            let mut doc = minimal_doc();
            doc.as_object_mut().unwrap().remove(key);
            assert!(
                strategy_from_value(&doc).is_err(),
                "expected failure without '{key}'"
            );
        }
    }

    #[test]
    fn rejects_unknown_tags() {
        let mut doc = minimal_doc();
        doc["entry_rules"][0]["condition"]["type"] = json!("Wobble");
        assert!(strategy_from_value(&doc).is_err());

        let mut doc = minimal_doc();
        doc["entry_rules"][0]["action"] = json!("GoLong");
        assert!(strategy_from_value(&doc).is_err());

        let mut doc = minimal_doc();
        doc["entry_rules"][0]["condition"]["operator"] = json!("!=");
        assert!(strategy_from_value(&doc).is_err());

        let mut doc = minimal_doc();
        doc["entry_rules"][0]["condition"]["field"] = json!("vwap");
        assert!(strategy_from_value(&doc).is_err());
    }

    #[test]
    fn rejects_bad_indicator_names() {
        let mut doc = minimal_doc();
        doc["entry_rules"][0]["condition"] = json!({
            "type": "Indicator", "indicator": "SMA", "operator": ">", "value": 1.0
        });
        assert!(strategy_from_value(&doc).is_err());
    }

    #[test]
    fn rejects_cross_of_identical_indicators() {
        for kind in ["CrossesAbove", "CrossesBelow"] {
            let mut doc = minimal_doc();
            doc["entry_rules"][0]["condition"] = json!({
                "type": kind, "fast": "SMA(10)", "slow": "SMA(10)"
            });
            assert!(
                matches!(
                    strategy_from_value(&doc),
                    Err(TradesimError::StrategyInvalid { .. })
                ),
                "{kind} of a series with itself should fail"
            );
        }
    }

    #[test]
    fn rejects_bad_sizing() {
        let mut doc = minimal_doc();
        doc["sizing"] = json!({ "method": "Martingale", "value": 10 });
        assert!(matches!(
            strategy_from_value(&doc),
            Err(TradesimError::SizingInvalid { .. })
        ));

        let mut doc = minimal_doc();
        doc["sizing"] = json!({ "method": "Quantity", "value": -5 });
        assert!(matches!(
            strategy_from_value(&doc),
            Err(TradesimError::SizingInvalid { .. })
        ));
    }

    #[test]
    fn price_vs_price_via_string_value() {
        let mut doc = minimal_doc();
        doc["entry_rules"][0]["condition"] = json!({
            "type": "Price", "field": "close", "operator": ">", "value": "open"
        });
        let strategy = strategy_from_value(&doc).unwrap();
        assert!(matches!(
            strategy.entry_rules()[0].condition(),
            Condition::PriceVsPrice { .. }
        ));
    }

    #[test]
    fn nested_composites() {
        let mut doc = minimal_doc();
        doc["entry_rules"][0]["condition"] = json!({
            "type": "AND",
            "conditions": [
                { "type": "Price", "field": "close", "operator": ">", "value": 100.0 },
                { "type": "OR", "conditions": [
                    { "type": "Indicator", "indicator": "RSI(14)", "operator": "<", "value": 30.0 },
                    { "type": "CrossesAbove", "fast": "SMA(10)", "slow": "SMA(20)" }
                ]}
            ]
        });
        let strategy = strategy_from_value(&doc).unwrap();
        assert_eq!(
            strategy.indicator_names(),
            &["RSI(14)", "SMA(10)", "SMA(20)"]
        );
    }

    #[test]
    fn empty_composite_rejected() {
        let mut doc = minimal_doc();
        doc["entry_rules"][0]["condition"] = json!({ "type": "AND", "conditions": [] });
        assert!(strategy_from_value(&doc).is_err());
    }
}
