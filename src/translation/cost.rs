/*!
 * Token usage records and cost aggregation.
 *
 * Usage is summed per model as integers before any price is applied, so the
 * resulting report does not depend on the order in which chunks completed.
 */

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::{Deserialize, Serialize};

/// Token usage of one completed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub sequence_index: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

/// Price of one model, in currency units per 1K tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Cost of the given token counts at this price
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_1k + output_tokens as f64 * self.output_per_1k) / 1000.0
    }
}

/// Prices keyed by model name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    #[serde(default = "default_models")]
    pub models: HashMap<String, ModelPrice>,

    /// Per-1K price for input and output tokens of unknown models
    #[serde(default = "default_fallback_per_1k")]
    pub fallback_per_1k: f64,
}

fn default_models() -> HashMap<String, ModelPrice> {
    [
        ("gpt-4o-mini", ModelPrice::new(0.00015, 0.000075)),
        ("gpt-4o", ModelPrice::new(0.0025, 0.00125)),
        ("o1-mini", ModelPrice::new(0.003, 0.012)),
        ("gpt-3.5-turbo", ModelPrice::new(0.003, 0.006)),
        ("gpt-4", ModelPrice::new(0.03, 0.06)),
    ]
    .into_iter()
    .map(|(name, price)| (name.to_string(), price))
    .collect()
}

fn default_fallback_per_1k() -> f64 {
    0.00002
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            models: default_models(),
            fallback_per_1k: default_fallback_per_1k(),
        }
    }
}

impl PriceTable {
    /// Price for `model`, and whether the model was known
    pub fn price_for(&self, model: &str) -> (ModelPrice, bool) {
        match self.models.get(model) {
            Some(price) => (*price, true),
            None => (ModelPrice::new(self.fallback_per_1k, self.fallback_per_1k), false),
        }
    }
}

/// Aggregated usage and cost of one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub chunk_count: usize,
    pub cost: f64,
    /// Whether the fallback price was used
    pub fallback_price: bool,
}

/// Total cost of a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub total_cost: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub per_model: BTreeMap<String, ModelCost>,
}

impl CostReport {
    /// Generate a summary of token usage and cost
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Cost Summary:\n\
             Input tokens: {}\n\
             Output tokens: {}\n\
             Total cost: ${:.6}",
            self.total_input_tokens, self.total_output_tokens, self.total_cost
        );
        for (model, cost) in &self.per_model {
            out.push_str(&format!(
                "\n  {}: {} chunks, {} in / {} out, ${:.6}{}",
                model,
                cost.chunk_count,
                cost.input_tokens,
                cost.output_tokens,
                cost.cost,
                if cost.fallback_price { " (fallback price)" } else { "" }
            ));
        }
        out
    }
}

/// Turns usage records into a cost report
#[derive(Debug, Clone, Default)]
pub struct CostAccountant {
    prices: PriceTable,
}

impl CostAccountant {
    pub fn new(prices: PriceTable) -> Self {
        Self { prices }
    }

    /// Aggregate usage records into a report
    pub fn aggregate(&self, records: &[UsageRecord]) -> CostReport {
        let mut per_model: BTreeMap<String, ModelCost> = BTreeMap::new();
        for record in records {
            let entry = per_model.entry(record.model.clone()).or_default();
            entry.input_tokens += record.input_tokens;
            entry.output_tokens += record.output_tokens;
            entry.chunk_count += 1;
        }

        let mut report = CostReport::default();
        for (model, entry) in per_model.iter_mut() {
            let (price, known) = self.prices.price_for(model);
            if !known {
                warn!(
                    "No price configured for model '{}', using fallback of {} per 1K tokens",
                    model, self.prices.fallback_per_1k
                );
            }
            entry.cost = price.cost(entry.input_tokens, entry.output_tokens);
            entry.fallback_price = !known;

            report.total_input_tokens += entry.input_tokens;
            report.total_output_tokens += entry.output_tokens;
            report.total_cost += entry.cost;
        }
        report.per_model = per_model;
        report
    }
}
