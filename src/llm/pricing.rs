//! Per-model token prices
//!
//! Prices are USD per million tokens. The table is built once and shared
//! behind an `Arc`; providers receive it through their config.

use std::sync::{Arc, LazyLock};

use super::types::Usage;

/// Input/output price per million tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl ModelPrice {
    pub const fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    pub const fn free() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Cost in USD for the given usage
    pub fn cost(&self, usage: &Usage) -> f64 {
        (usage.input_tokens as f64 * self.input_per_mtok
            + usage.output_tokens as f64 * self.output_per_mtok)
            / 1_000_000.0
    }
}

/// (model, input, output)
const STANDARD_PRICES: &[(&str, f64, f64)] = &[
    ("claude-opus-4", 15.0, 75.0),
    ("claude-sonnet-4", 3.0, 15.0),
    ("claude-3-7-sonnet", 3.0, 15.0),
    ("claude-3-5-haiku", 0.8, 4.0),
    ("claude-haiku-4", 1.0, 5.0),
    ("gpt-4o-mini", 0.15, 0.6),
    ("gpt-4o", 2.5, 10.0),
    ("gpt-4.1-mini", 0.4, 1.6),
    ("gpt-4.1", 2.0, 8.0),
    ("o3-mini", 1.1, 4.4),
    ("o4-mini", 1.1, 4.4),
    ("gemini-2.5-pro", 1.25, 10.0),
    ("gemini-2.5-flash", 0.3, 2.5),
    ("gemini-2.0-flash", 0.1, 0.4),
];

/// Used for models missing from the table
const DEFAULT_PRICE: ModelPrice = ModelPrice::new(3.0, 15.0);

/// Model price table with exact and prefix lookup
#[derive(Debug, Clone)]
pub struct PriceTable {
    entries: Vec<(String, ModelPrice)>,
    default: ModelPrice,
}

static STANDARD_TABLE: LazyLock<Arc<PriceTable>> = LazyLock::new(|| {
    Arc::new(PriceTable::new(
        STANDARD_PRICES
            .iter()
            .map(|(model, input, output)| (model.to_string(), ModelPrice::new(*input, *output))),
        DEFAULT_PRICE,
    ))
});

impl PriceTable {
    pub fn new(
        entries: impl IntoIterator<Item = (String, ModelPrice)>,
        default: ModelPrice,
    ) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            default,
        }
    }

    /// The built-in table, shared process-wide
    pub fn standard() -> Arc<PriceTable> {
        STANDARD_TABLE.clone()
    }

    /// Price for a model: exact match, then longest prefix, then default
    ///
    /// Prefix matching lets dated snapshots (`gpt-4o-2024-08-06`) resolve to
    /// their family entry.
    pub fn price(&self, model: &str) -> ModelPrice {
        if let Some((_, price)) = self.entries.iter().find(|(name, _)| name == model) {
            return *price;
        }

        self.entries
            .iter()
            .filter(|(name, _)| model.starts_with(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, price)| *price)
            .unwrap_or(self.default)
    }

    /// Cost in USD of `usage` on `model`
    pub fn cost(&self, model: &str, usage: &Usage) -> f64 {
        self.price(model).cost(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_cost() {
        let table = PriceTable::standard();
        let usage = Usage::new(1_000_000, 500_000);
        let cost = table.cost("gpt-4o", &usage);
        assert!((cost - (2.5 + 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_formula() {
        let table = PriceTable::new(
            vec![("m".to_string(), ModelPrice::new(2.0, 8.0))],
            ModelPrice::free(),
        );
        let usage = Usage::new(1234, 567);
        let expected = (1234.0 * 2.0 + 567.0 * 8.0) / 1_000_000.0;
        assert!((table.cost("m", &usage) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_prefix_prefers_longest() {
        let table = PriceTable::standard();
        assert_eq!(table.price("gpt-4o-mini-2024-07-18"), ModelPrice::new(0.15, 0.6));
        assert_eq!(table.price("gpt-4o-2024-08-06"), ModelPrice::new(2.5, 10.0));
    }

    #[test]
    fn test_unknown_model_uses_default() {
        let table = PriceTable::standard();
        assert_eq!(table.price("mystery-model"), DEFAULT_PRICE);
        let usage = Usage::new(1_000_000, 1_000_000);
        assert!((table.cost("mystery-model", &usage) - 18.0).abs() < 1e-9);
    }
}
