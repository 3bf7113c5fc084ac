pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Balances creative suggestions against practical, grounded advice.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Returned in place of an empty model reply. An empty reply is not a failed call.
pub const EMPTY_RESPONSE_FALLBACK: &str =
    "Sorry, I couldn't generate a response. Please try again.";

pub fn clamp_temperature(temperature: f64) -> f64 {
    if temperature.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_is_clamped_to_provider_range() {
        assert_eq!(clamp_temperature(0.7), 0.7);
        assert_eq!(clamp_temperature(-1.0), MIN_TEMPERATURE);
        assert_eq!(clamp_temperature(9.5), MAX_TEMPERATURE);
        assert_eq!(clamp_temperature(f64::NAN), DEFAULT_TEMPERATURE);
    }
}
