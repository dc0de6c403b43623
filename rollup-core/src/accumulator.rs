use std::collections::BTreeMap;

use crate::model::Observation;

/// Per-city observations collected since the last rollup.
#[derive(Debug, Default)]
pub struct Accumulator {
    by_city: BTreeMap<String, Vec<Observation>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation, creating the city's sequence on first use.
    pub fn record(&mut self, observation: Observation) {
        self.by_city
            .entry(observation.city.clone())
            .or_default()
            .push(observation);
    }

    /// Take the city's sequence, leaving it empty.
    pub fn drain(&mut self, city: &str) -> Vec<Observation> {
        self.by_city
            .get_mut(city)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn latest(&self, city: &str) -> Option<&Observation> {
        self.by_city.get(city).and_then(|seq| seq.last())
    }

    /// Cities that have ever been recorded, in name order.
    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.by_city.keys().map(String::as_str)
    }

    pub fn len(&self, city: &str) -> usize {
        self.by_city.get(city).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.by_city.values().all(Vec::is_empty)
    }
}
