// src/trading/risk.rs
use crate::config::SignalConfig;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{OrderBlock, RiskLevels, SignalDirection, ZoneContext};

/// Stop at the trend-overlay band
pub fn overlay_levels(
    direction: SignalDirection,
    entry: f64,
    overlay_value: f64,
    zone: &ZoneContext,
    config: &SignalConfig,
) -> EngineResult<RiskLevels> {
    levels_from_stop(direction, entry, overlay_value, zone, config)
}

/// Stop beyond the order block extreme, offset by an ATR multiple
pub fn order_block_levels(
    direction: SignalDirection,
    entry: f64,
    block: &OrderBlock,
    atr: f64,
    zone: &ZoneContext,
    config: &SignalConfig,
) -> EngineResult<RiskLevels> {
    let offset = config.order_block_atr_multiplier * atr;
    let stop = match direction {
        SignalDirection::Buy => block.price_low - offset,
        SignalDirection::Sell => block.price_high + offset,
        SignalDirection::Hold => return Err(hold_has_no_levels()),
    };
    levels_from_stop(direction, entry, stop, zone, config)
}

fn hold_has_no_levels() -> EngineError {
    EngineError::InvalidSignal("a HOLD signal carries no risk levels".to_string())
}

fn levels_from_stop(
    direction: SignalDirection,
    entry: f64,
    stop: f64,
    zone: &ZoneContext,
    config: &SignalConfig,
) -> EngineResult<RiskLevels> {
    let side = match direction {
        SignalDirection::Buy => 1.0,
        SignalDirection::Sell => -1.0,
        SignalDirection::Hold => return Err(hold_has_no_levels()),
    };

    // Positive when the stop sits on the losing side of the entry
    let risk = (entry - stop) * side;
    if !risk.is_finite() || risk <= 0.0 {
        return Err(EngineError::InvalidSignal(format!(
            "{} stop {:.6} is not on the losing side of entry {:.6}",
            direction, stop, entry
        )));
    }

    let rr_target = entry + side * risk * config.risk_reward;
    let min_target = entry + side * risk * config.min_partial_rr;

    let opposing = zone
        .fibonacci_levels
        .iter()
        .map(|l| l.price)
        .chain(match direction {
            SignalDirection::Buy => [zone.resistance, Some(zone.range_high)],
            _ => [zone.support, Some(zone.range_low)],
        }
        .into_iter()
        .flatten())
        .filter(|&level| (level - min_target) * side > 0.0);

    // nearest opposing level reached before the R-multiple target
    let first_target = opposing.fold(rr_target, |target, level| {
        if (target - level) * side > 0.0 {
            level
        } else {
            target
        }
    });

    let mut take_profit = vec![first_target];
    let extended = entry + side * risk * config.extended_risk_reward;
    if (extended - first_target) * side > 0.0 {
        take_profit.push(extended);
    }

    Ok(RiskLevels {
        stop_loss: stop,
        take_profit,
    })
}
