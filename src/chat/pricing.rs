//! Per-provider token pricing.
//!
//! Rates are USD per one million tokens, split into input and output rates.
//! A [`ChatAnswer`](super::ChatAnswer) is priced exactly once, against the
//! entry of the provider that produced it.

use super::provider::Provider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// USD per one million tokens for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenRate {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl TokenRate {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Flat rate applied to both directions.
    pub const fn flat(per_million: f64) -> Self {
        Self::new(per_million, per_million)
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_million
            + output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Pricing lookup keyed by [`Provider`].
///
/// Providers without an entry are priced at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    rates: HashMap<Provider, TokenRate>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert(Provider::OpenAiGpt4oMini, TokenRate::new(0.15, 0.60));
        rates.insert(Provider::GeminiFlash, TokenRate::flat(2.0));
        rates.insert(Provider::DeepSeekChat, TokenRate::flat(2.0));
        rates.insert(Provider::ClaudeHaiku, TokenRate::flat(3.0));
        rates.insert(Provider::Summary, TokenRate::new(2.50, 10.0));
        Self { rates }
    }
}

impl PricingTable {
    /// A table with no entries; every call costs zero.
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, provider: Provider, rate: TokenRate) -> Self {
        self.rates.insert(provider, rate);
        self
    }

    pub fn rate(&self, provider: Provider) -> Option<TokenRate> {
        self.rates.get(&provider).copied()
    }

    pub fn cost(&self, provider: Provider, input_tokens: u64, output_tokens: u64) -> f64 {
        self.rate(provider)
            .map(|r| r.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }
}
