use std::collections::BTreeMap;

use parley_core::config::{ModelPrice, PricingConfig};

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

/// Immutable snapshot of the configured price table.
///
/// Prices are dollars per million tokens. Unknown models are billed at the
/// fallback model's rate rather than silently costing zero.
#[derive(Clone, Debug)]
pub struct PriceTable {
    models: BTreeMap<String, ModelPrice>,
    fallback: ModelPrice,
}

impl PriceTable {
    /// Panics never: config validation guarantees the fallback model has an
    /// entry, but a missing one still degrades to zero-cost rather than
    /// aborting startup.
    pub fn from_config(config: &PricingConfig) -> Self {
        let fallback = config
            .models
            .get(&config.fallback_model)
            .copied()
            .unwrap_or(ModelPrice { input_per_mtok: 0.0, output_per_mtok: 0.0 });

        Self { models: config.models.clone(), fallback }
    }

    fn price_for(&self, model: &str) -> ModelPrice {
        self.models.get(model).copied().unwrap_or(self.fallback)
    }

    /// Dollar cost of one exchange.
    pub fn cost_usd(&self, model: &str, input_tokens: i64, output_tokens: i64) -> f64 {
        let price = self.price_for(model);
        let input_cost = input_tokens as f64 / TOKENS_PER_PRICE_UNIT * price.input_per_mtok;
        let output_cost = output_tokens as f64 / TOKENS_PER_PRICE_UNIT * price.output_per_mtok;
        input_cost + output_cost
    }
}

#[cfg(test)]
mod tests {
    use parley_core::config::PricingConfig;

    use super::PriceTable;

    fn table() -> PriceTable {
        PriceTable::from_config(&PricingConfig::default())
    }

    #[test]
    fn one_million_input_tokens_costs_exactly_the_listed_input_price() {
        let cost = table().cost_usd("gpt-4o-mini", 1_000_000, 0);
        assert_eq!(cost, 0.15);
    }

    #[test]
    fn input_and_output_sides_are_priced_independently() {
        let cost = table().cost_usd("gpt-4o", 1_000_000, 1_000_000);
        assert_eq!(cost, 2.50 + 10.00);
    }

    #[test]
    fn small_exchanges_produce_fractional_costs() {
        let cost = table().cost_usd("gpt-4-turbo", 500, 200);
        let expected = 500.0 / 1_000_000.0 * 10.00 + 200.0 / 1_000_000.0 * 30.00;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn unknown_model_is_billed_at_the_fallback_rate() {
        let known = table().cost_usd("gpt-4o-mini", 10_000, 2_000);
        let unknown = table().cost_usd("gpt-9-experimental", 10_000, 2_000);
        assert_eq!(known, unknown);
    }

    #[test]
    fn zero_tokens_costs_nothing() {
        assert_eq!(table().cost_usd("gpt-4o", 0, 0), 0.0);
    }
}
