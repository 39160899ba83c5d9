//! Per-model token pricing, used to estimate the cost of an analysis run.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// (input, output) USD cost per token for a known model family.
///
/// Unknown models fall back to Sonnet pricing.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    let model = model.to_lowercase();
    if model.contains("opus") {
        (dec!(0.000015), dec!(0.000075))
    } else if model.contains("haiku") {
        (dec!(0.0000008), dec!(0.000004))
    } else {
        (dec!(0.000003), dec!(0.000015))
    }
}

/// Estimated cost of a run given its token usage.
pub fn estimate_cost(costs: (Decimal, Decimal), input_tokens: u32, output_tokens: u32) -> Decimal {
    costs.0 * Decimal::from(input_tokens) + costs.1 * Decimal::from(output_tokens)
}
