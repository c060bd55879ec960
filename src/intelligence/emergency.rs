use serde::Serialize;

use crate::models::VitalsSnapshot;

/// A fixed-threshold check that a reading failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Breach {
    HeartRateHigh,
    HeartRateLow,
    Hypertensive,
    Hypotensive,
    TemperatureHigh,
    TemperatureLow,
    LowOxygen,
}

/// Every threshold the reading breaches. Checks are independent.
pub fn breaches(vitals: &VitalsSnapshot) -> Vec<Breach> {
    let bp = vitals.blood_pressure;
    [
        (vitals.heart_rate > 120, Breach::HeartRateHigh),
        (vitals.heart_rate < 50, Breach::HeartRateLow),
        (bp.systolic > 180 || bp.diastolic > 110, Breach::Hypertensive),
        (bp.systolic < 90 || bp.diastolic < 60, Breach::Hypotensive),
        (vitals.temperature > 103.0, Breach::TemperatureHigh),
        (vitals.temperature < 95.0, Breach::TemperatureLow),
        (vitals.oxygen_saturation < 90, Breach::LowOxygen),
    ]
    .into_iter()
    .filter_map(|(hit, breach)| hit.then_some(breach))
    .collect()
}

pub fn is_emergency(vitals: &VitalsSnapshot) -> bool {
    !breaches(vitals).is_empty()
}
