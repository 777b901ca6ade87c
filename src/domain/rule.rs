//! A named condition bound to the action it emits.

use super::candle::SignalAction;
use super::condition::Condition;
use super::error::TradesimError;
use super::snapshot::MarketSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    name: String,
    condition: Condition,
    action: SignalAction,
}

impl Rule {
    /// Rejects empty names and the `None` action; a rule that can never
    /// emit anything is a configuration mistake.
    pub fn new(
        name: impl Into<String>,
        condition: Condition,
        action: SignalAction,
    ) -> Result<Self, TradesimError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TradesimError::StrategyInvalid {
                reason: "rule name must not be empty".to_string(),
            });
        }
        if action == SignalAction::None {
            return Err(TradesimError::StrategyInvalid {
                reason: format!("rule '{name}' must carry a non-None action"),
            });
        }
        Ok(Rule {
            name,
            condition,
            action,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> SignalAction {
        self.action
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// The rule's action if its condition holds on this bar, else `None`.
    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> SignalAction {
        if self.condition.evaluate(snapshot) {
            self.action
        } else {
            SignalAction::None
        }
    }
}
