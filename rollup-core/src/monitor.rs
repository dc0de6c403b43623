use std::fmt;

use crate::accumulator::Accumulator;

/// Latest temperature for a city went above the configured threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdAlert {
    pub city: String,
    pub threshold_c: f64,
    pub temperature_c: f64,
}

impl fmt::Display for ThresholdAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Alert! Temperature in {} exceeded {}°C: {:.2}°C",
            self.city, self.threshold_c, self.temperature_c
        )
    }
}

/// Compare each city's most recent observation against `threshold_c`.
///
/// Nothing is remembered between calls, so a breach is reported again on
/// every check until the city is rolled up.
pub fn check_thresholds(accumulator: &Accumulator, threshold_c: f64) -> Vec<ThresholdAlert> {
    accumulator
        .cities()
        .filter_map(|city| accumulator.latest(city))
        .filter(|obs| obs.temperature_c > threshold_c)
        .map(|obs| ThresholdAlert {
            city: obs.city.clone(),
            threshold_c,
            temperature_c: obs.temperature_c,
        })
        .collect()
}
