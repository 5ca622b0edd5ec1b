pub mod ema_bollinger;

use bandcross_core::{Strategy, StrategyError};
use ema_bollinger::{EmaBollingerConfig, EmaBollingerStrategy};

/// Registered strategy names with a one-line description.
pub const STRATEGIES: &[(&str, &str)] = &[(
    ema_bollinger::NAME,
    "EMA fast/slow crossover filtered by Bollinger Band position",
)];

/// Names of all registered strategies.
pub fn available_strategies() -> Vec<&'static str> {
    STRATEGIES.iter().map(|(name, _)| *name).collect()
}

/// Build a strategy by its registered name.
pub fn build_strategy(
    name: &str,
    config: EmaBollingerConfig,
) -> Result<Box<dyn Strategy>, StrategyError> {
    match name {
        ema_bollinger::NAME => Ok(Box::new(EmaBollingerStrategy::new(config)?)),
        _ => Err(StrategyError::UnknownStrategy {
            name: name.to_string(),
            available: available_strategies().join(", "),
        }),
    }
}
