//! Static price table for rough per-call cost estimates.
//!
//! Prices are USD per million tokens. The table covers the models we
//! route by default; unknown models simply report no estimate — cost
//! tracking is advisory, never load-bearing.

use super::GenerationUsage;

struct ModelPrice {
    prefix: &'static str,
    input_per_million: f64,
    output_per_million: f64,
}

const PRICES: &[ModelPrice] = &[
    ModelPrice {
        prefix: "gemini-3-flash",
        input_per_million: 0.10,
        output_per_million: 0.40,
    },
    ModelPrice {
        prefix: "gemini-2.5-pro",
        input_per_million: 1.25,
        output_per_million: 10.00,
    },
    ModelPrice {
        prefix: "gpt-5-mini",
        input_per_million: 0.25,
        output_per_million: 2.00,
    },
    ModelPrice {
        prefix: "gpt-5",
        input_per_million: 1.25,
        output_per_million: 10.00,
    },
    ModelPrice {
        prefix: "gpt-4o-mini",
        input_per_million: 0.15,
        output_per_million: 0.60,
    },
    ModelPrice {
        prefix: "o3",
        input_per_million: 2.00,
        output_per_million: 8.00,
    },
];

/// Estimated cost of a call in USD cents, when the model is known.
///
/// Longest matching prefix wins so `gpt-5-mini` is not priced as `gpt-5`.
#[must_use]
pub fn cost_cents(model: &str, usage: GenerationUsage) -> Option<f64> {
    let lowered = model.to_lowercase();
    // OpenRouter-style ids carry a vendor prefix; match on the tail.
    let bare = lowered.rsplit('/').next().unwrap_or(&lowered);

    let price = PRICES
        .iter()
        .filter(|p| bare.starts_with(p.prefix))
        .max_by_key(|p| p.prefix.len())?;

    let usd = (usage.input_tokens as f64 / 1_000_000.0) * price.input_per_million
        + (usage.output_tokens as f64 / 1_000_000.0) * price.output_per_million;
    Some(usd * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_priced() {
        let usage = GenerationUsage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
        };
        let cents = cost_cents("gemini-3-flash-preview", usage).unwrap();
        assert!((cents - 50.0).abs() < 1e-9);
    }

    #[test]
    fn longest_prefix_wins() {
        let usage = GenerationUsage {
            input_tokens: 1_000_000,
            output_tokens: 0,
        };
        let mini = cost_cents("gpt-5-mini", usage).unwrap();
        let full = cost_cents("gpt-5", usage).unwrap();
        assert!(mini < full);
    }

    #[test]
    fn vendor_prefixed_ids_match() {
        let usage = GenerationUsage {
            input_tokens: 500_000,
            output_tokens: 0,
        };
        assert!(cost_cents("openai/gpt-5-mini", usage).is_some());
    }

    #[test]
    fn unknown_model_has_no_estimate() {
        let usage = GenerationUsage {
            input_tokens: 100,
            output_tokens: 100,
        };
        assert!(cost_cents("mystery-model-9000", usage).is_none());
    }
}
