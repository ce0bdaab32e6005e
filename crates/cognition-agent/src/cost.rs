//! Fallback token counting and per-provider cost estimation (§4.6).

/// `content.len() / 4`, matching the teacher's `Message::approx_tokens`
/// heuristic. Used only when the executor doesn't report exact usage.
pub fn estimate_tokens(content: &str) -> u32 {
    (content.len() / 4) as u32
}

/// `(input_cost_per_1k, output_cost_per_1k)` in USD. Unknown providers fall
/// back to a conservative flat rate rather than reporting a bogus zero.
fn cost_per_1k(provider: &str, model: &str) -> (f64, f64) {
    match (provider, model) {
        ("anthropic", m) if m.contains("opus") => (0.015, 0.075),
        ("anthropic", m) if m.contains("sonnet") => (0.003, 0.015),
        ("anthropic", m) if m.contains("haiku") => (0.0008, 0.004),
        ("openai", m) if m.contains("gpt-4o-mini") => (0.00015, 0.0006),
        ("openai", m) if m.contains("gpt-4o") => (0.0025, 0.01),
        ("openai", m) if m.contains("o1") => (0.015, 0.06),
        _ => (0.002, 0.008),
    }
}

pub fn estimate_cost(provider: &str, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    let (input_rate, output_rate) = cost_per_1k(provider, model);
    (input_tokens as f64 / 1000.0) * input_rate + (output_tokens as f64 / 1000.0) * output_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_divides_length_by_four() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn known_provider_model_uses_specific_rate() {
        let cost = estimate_cost("anthropic", "claude-sonnet-4", 1000, 1000);
        assert!((cost - (0.003 + 0.015)).abs() < 1e-9);
    }

    #[test]
    fn unknown_provider_falls_back_to_flat_rate() {
        let cost = estimate_cost("unknown-co", "mystery-model", 1000, 0);
        assert!((cost - 0.002).abs() < 1e-9);
    }
}
