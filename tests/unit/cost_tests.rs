/*!
 * Tests for usage aggregation and pricing
 */

use texlate::translation::cost::{CostAccountant, ModelPrice, PriceTable, UsageRecord};

fn record(sequence_index: usize, input: u64, output: u64, model: &str) -> UsageRecord {
    UsageRecord {
        sequence_index,
        input_tokens: input,
        output_tokens: output,
        model: model.to_string(),
    }
}

/// Test that totals do not depend on completion order
#[test]
fn test_aggregate_withShuffledRecords_shouldGiveIdenticalReport() {
    let records: Vec<UsageRecord> = (0..40)
        .map(|i| record(i, 100 + i as u64 * 7, 50 + i as u64 * 3, if i % 3 == 0 { "gpt-4" } else { "gpt-4o" }))
        .collect();
    let accountant = CostAccountant::default();
    let expected = accountant.aggregate(&records);

    let mut reversed = records.clone();
    reversed.reverse();
    assert_eq!(accountant.aggregate(&reversed), expected);

    let mut interleaved: Vec<UsageRecord> = records.iter().step_by(2).cloned().collect();
    interleaved.extend(records.iter().skip(1).step_by(2).cloned());
    assert_eq!(accountant.aggregate(&interleaved), expected);
}

/// Test the per-thousand pricing formula for a configured model
#[test]
fn test_aggregate_withCustomPrices_shouldApplyFormula() {
    let mut prices = PriceTable::default();
    prices.models.insert("house-model".to_string(), ModelPrice::new(0.5, 2.0));
    let report = CostAccountant::new(prices).aggregate(&[
        record(0, 1500, 200, "house-model"),
        record(1, 500, 300, "house-model"),
    ]);

    // (2000 * 0.5 + 500 * 2.0) / 1000
    assert!((report.total_cost - 2.0).abs() < 1e-12);
    let model = &report.per_model["house-model"];
    assert_eq!(model.chunk_count, 2);
    assert_eq!(model.input_tokens, 2000);
    assert_eq!(model.output_tokens, 500);
    assert!(!model.fallback_price);
}

/// Test that the summary names every model
#[test]
fn test_summary_withSeveralModels_shouldListEach() {
    let report = CostAccountant::default().aggregate(&[
        record(0, 1000, 1000, "gpt-4"),
        record(1, 1000, 1000, "mystery-model"),
    ]);
    let summary = report.summary();
    assert!(summary.contains("gpt-4: 1 chunks"));
    assert!(summary.contains("mystery-model: 1 chunks"));
    assert!(summary.contains("(fallback price)"));
    assert!(summary.contains("Input tokens: 2000"));
}
