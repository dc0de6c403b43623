//! Reduction of accumulated observations into daily summaries.

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::info;

use crate::{
    accumulator::Accumulator,
    model::{DailySummary, Observation},
    store::SummaryStore,
};

/// Summarize one city's observations. `None` for an empty sequence.
pub fn summarize(city: &str, date: NaiveDate, observations: &[Observation]) -> Option<DailySummary> {
    let first = observations.first()?;

    let (mut sum, mut max, mut min) = (0.0, first.temperature_c, first.temperature_c);
    for obs in observations {
        sum += obs.temperature_c;
        max = max.max(obs.temperature_c);
        min = min.min(obs.temperature_c);
    }

    Some(DailySummary {
        date,
        city: city.to_string(),
        avg_temp: sum / observations.len() as f64,
        max_temp: max,
        min_temp: min,
        dominant_condition: dominant_condition(observations)?,
    })
}

/// Most frequent condition label.
///
/// Ties are broken in favour of the label seen first. This is a chosen
/// policy: a plain frequency count leaves the order among equal counts
/// undefined, so any tied label would be an acceptable answer.
pub fn dominant_condition(observations: &[Observation]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, obs) in observations.iter().enumerate() {
        counts.entry(obs.condition.as_str()).or_insert((0, idx)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(label, _)| label.to_string())
}

/// Roll up every city with pending observations, persist the summaries and
/// clear those cities. Cities with nothing accumulated are skipped.
pub async fn roll_up(
    accumulator: &mut Accumulator,
    store: &SummaryStore,
    date: NaiveDate,
) -> Result<Vec<DailySummary>> {
    let cities: Vec<String> = accumulator.cities().map(str::to_string).collect();
    let mut summaries = Vec::new();

    for city in cities {
        if accumulator.len(&city) == 0 {
            continue;
        }

        let observations = accumulator.drain(&city);
        if let Some(summary) = summarize(&city, date, &observations) {
            store.append(&summary).await?;
            info!(
                city = %summary.city,
                samples = observations.len(),
                avg_temp = summary.avg_temp,
                dominant = %summary.dominant_condition,
                "Rolled up observations"
            );
            summaries.push(summary);
        }
    }

    Ok(summaries)
}
