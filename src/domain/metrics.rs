//! Summary statistics derived from a finished run's ledger.

use serde::Serialize;

use super::portfolio::Portfolio;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestMetrics {
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub max_drawdown: f64,
    pub round_trip_trades: usize,
    pub total_executions: u64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win_pnl: f64,
    pub avg_loss_pnl: f64,
}

impl BacktestMetrics {
    /// Computes everything from the ledger in one pass over the trade log
    /// and one over the equity curve. Ratios degrade to 0 when their
    /// denominators are empty; profit factor is +inf for loss-free profitable
    /// runs.
    pub fn compute(portfolio: &Portfolio) -> Self {
        let initial = portfolio.initial_capital();

        let final_equity = portfolio
            .equity_curve()
            .last()
            .map(|point| point.total_equity)
            .unwrap_or(initial);
        let total_pnl = final_equity - initial;
        // Plain ratio against the starting stake; display layers scale it.
        let total_return_pct = if initial > 0.0 {
            total_pnl / initial
        } else {
            0.0
        };

        // Peak seeded at initial capital so a curve that only ever sinks
        // still shows its drawdown from the starting stake.
        let mut peak = initial;
        let mut max_drawdown: f64 = 0.0;
        for point in portfolio.equity_curve() {
            if point.total_equity > peak {
                peak = point.total_equity;
            } else if peak > 0.0 {
                let drawdown = (peak - point.total_equity) / peak;
                max_drawdown = max_drawdown.max(drawdown);
            }
        }

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;
        for trade in portfolio.trades() {
            if trade.pnl > 0.0 {
                wins += 1;
                gross_profit += trade.pnl;
            } else if trade.pnl < 0.0 {
                losses += 1;
                gross_loss += trade.pnl;
            }
            // Breakeven trades count toward the total only.
        }
        let round_trip_trades = portfolio.trades().len();

        let win_rate = if round_trip_trades > 0 {
            wins as f64 / round_trip_trades as f64
        } else {
            0.0
        };
        let profit_factor = if gross_loss.abs() > 1e-9 {
            gross_profit / gross_loss.abs()
        } else if gross_profit > 1e-9 {
            f64::INFINITY
        } else {
            0.0
        };
        let avg_win_pnl = if wins > 0 {
            gross_profit / wins as f64
        } else {
            0.0
        };
        // Kept negative: it is the mean of losing PnLs.
        let avg_loss_pnl = if losses > 0 {
            gross_loss / losses as f64
        } else {
            0.0
        };

        BacktestMetrics {
            total_pnl,
            total_return_pct,
            max_drawdown,
            round_trip_trades,
            total_executions: portfolio.total_executions(),
            win_rate,
            profit_factor,
            avg_win_pnl,
            avg_loss_pnl,
        }
    }
}
