//! Strategy: ordered rules plus the position state machine.

use log::debug;

use super::candle::{PositionState, SignalAction};
use super::error::TradesimError;
use super::rule::Rule;
use super::snapshot::MarketSnapshot;

/// How entry quantities are derived from a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMethod {
    /// Fixed number of units per entry.
    Quantity,
    /// Units derived from a capital amount divided by the fill price. When
    /// `is_percentage` is set the amount is a percentage of initial capital.
    CapitalBased,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    pub method: SizingMethod,
    pub value: f64,
    pub is_percentage: bool,
}

impl Sizing {
    pub fn quantity(value: f64) -> Self {
        Sizing {
            method: SizingMethod::Quantity,
            value,
            is_percentage: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    name: String,
    instruments: Vec<String>,
    timeframes: Vec<String>,
    indicator_names: Vec<String>,
    entry_rules: Vec<Rule>,
    exit_rules: Vec<Rule>,
    sizing: Sizing,
    position: PositionState,
}

impl Strategy {
    /// Exit rules may be empty (a strategy is allowed to hold forever);
    /// everything else must be non-empty.
    pub fn new(
        name: impl Into<String>,
        instruments: Vec<String>,
        timeframes: Vec<String>,
        entry_rules: Vec<Rule>,
        exit_rules: Vec<Rule>,
        sizing: Sizing,
    ) -> Result<Self, TradesimError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TradesimError::StrategyInvalid {
                reason: "strategy name must not be empty".to_string(),
            });
        }
        if instruments.is_empty() {
            return Err(TradesimError::StrategyInvalid {
                reason: format!("strategy '{name}' requires at least one instrument"),
            });
        }
        if timeframes.is_empty() {
            return Err(TradesimError::StrategyInvalid {
                reason: format!("strategy '{name}' requires at least one timeframe"),
            });
        }
        if entry_rules.is_empty() {
            return Err(TradesimError::StrategyInvalid {
                reason: format!("strategy '{name}' requires at least one entry rule"),
            });
        }

        let mut indicator_names = Vec::new();
        for rule in entry_rules.iter().chain(exit_rules.iter()) {
            rule.condition().collect_indicator_names(&mut indicator_names);
        }

        Ok(Strategy {
            name,
            instruments,
            timeframes,
            indicator_names,
            entry_rules,
            exit_rules,
            sizing,
            position: PositionState::Flat,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn timeframes(&self) -> &[String] {
        &self.timeframes
    }

    /// Indicator names referenced by any rule, in first-seen order.
    pub fn indicator_names(&self) -> &[String] {
        &self.indicator_names
    }

    pub fn entry_rules(&self) -> &[Rule] {
        &self.entry_rules
    }

    pub fn exit_rules(&self) -> &[Rule] {
        &self.exit_rules
    }

    pub fn sizing(&self) -> &Sizing {
        &self.sizing
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    /// Evaluates one bar and returns at most one action.
    ///
    /// Flat: scan entry rules in order, first firing rule wins. In a
    /// position: scan exit rules, taking only the first whose action matches
    /// the held side. The position state transitions here, before any sizing
    /// or execution happens, so a second signal on the same bar can never
    /// double-act.
    pub fn evaluate(&mut self, snapshot: &MarketSnapshot) -> SignalAction {
        let candidate = match self.position {
            PositionState::Flat => self
                .entry_rules
                .iter()
                .map(|rule| (rule.name(), rule.evaluate(snapshot)))
                .find(|(_, action)| *action != SignalAction::None),
            PositionState::Long => {
                first_matching_exit(&self.exit_rules, snapshot, SignalAction::ExitLong)
            }
            PositionState::Short => {
                first_matching_exit(&self.exit_rules, snapshot, SignalAction::ExitShort)
            }
        };

        let Some((rule_name, action)) = candidate else {
            return SignalAction::None;
        };

        match self.position.apply(action) {
            Some(next) => {
                debug!(
                    "strategy {}: rule '{}' fired {} at {}",
                    self.name, rule_name, action, snapshot.timestamp
                );
                self.position = next;
                action
            }
            None => SignalAction::None,
        }
    }

    /// Resets position state so the same strategy object can drive a fresh run.
    pub fn reset(&mut self) {
        self.position = PositionState::Flat;
    }
}

fn first_matching_exit<'r>(
    exit_rules: &'r [Rule],
    snapshot: &MarketSnapshot,
    wanted: SignalAction,
) -> Option<(&'r str, SignalAction)> {
    exit_rules
        .iter()
        .map(|rule| (rule.name(), rule.evaluate(snapshot)))
        .find(|(_, action)| *action == wanted)
}
