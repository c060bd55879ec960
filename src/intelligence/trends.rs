//! Reading-to-reading and day-by-day movement of vitals.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::health_index::{health_index, AlertPenalty};
use crate::models::Vitals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VitalTrend {
    pub trend: Direction,
    pub change: f64,
}

impl VitalTrend {
    fn between(latest: f64, previous: f64) -> Self {
        let trend = if latest > previous {
            Direction::Increasing
        } else if latest < previous {
            Direction::Decreasing
        } else {
            Direction::Stable
        };
        Self {
            trend,
            change: latest - previous,
        }
    }

    const STABLE: VitalTrend = VitalTrend {
        trend: Direction::Stable,
        change: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsTrends {
    pub heart_rate: VitalTrend,
    /// Systolic only.
    pub blood_pressure: VitalTrend,
    pub temperature: VitalTrend,
    pub oxygen_saturation: VitalTrend,
}

/// Compare the two most recent readings. `readings` must be newest first.
pub fn vitals_trends(readings: &[Vitals]) -> VitalsTrends {
    let [latest, previous, ..] = readings else {
        return VitalsTrends {
            heart_rate: VitalTrend::STABLE,
            blood_pressure: VitalTrend::STABLE,
            temperature: VitalTrend::STABLE,
            oxygen_saturation: VitalTrend::STABLE,
        };
    };
    VitalsTrends {
        heart_rate: VitalTrend::between(latest.heart_rate.into(), previous.heart_rate.into()),
        blood_pressure: VitalTrend::between(
            latest.blood_pressure.systolic.into(),
            previous.blood_pressure.systolic.into(),
        ),
        temperature: VitalTrend::between(latest.temperature, previous.temperature),
        oxygen_saturation: VitalTrend::between(
            latest.oxygen_saturation.into(),
            previous.oxygen_saturation.into(),
        ),
    }
}

/// Direction of a population's health index between two halves of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationTrend {
    Improving,
    Declining,
    Stable,
}

/// Split newest-first readings in half and compare the health index of the
/// recent half against the older half. A gap above 10 points is a trend.
pub fn population_trend(readings: &[Vitals], alert_count: usize) -> PopulationTrend {
    if readings.len() < 2 {
        return PopulationTrend::Stable;
    }
    let (recent, older) = readings.split_at(readings.len() / 2);
    let index = |half: &[Vitals]| {
        let snapshots = half.iter().map(Vitals::snapshot);
        health_index(snapshots, alert_count, AlertPenalty::Standard)
    };
    let difference = index(recent) - index(older);
    if difference > 10.0 {
        PopulationTrend::Improving
    } else if difference < -10.0 {
        PopulationTrend::Declining
    } else {
        PopulationTrend::Stable
    }
}

/// Per-day averages for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyVitals {
    pub date: NaiveDate,
    pub heart_rate: i64,
    pub blood_pressure: i64,
    /// Rounded to one decimal.
    pub temperature: f64,
    pub oxygen_saturation: i64,
    pub readings: usize,
}

/// UTC calendar days touched by `[start, end)`, including a partial day at
/// either end.
pub(crate) fn days_in_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    if end <= start {
        return Vec::new();
    }
    let last = (end - Duration::milliseconds(1)).date_naive();
    start
        .date_naive()
        .iter_days()
        .take_while(|date| *date <= last)
        .collect()
}

/// Average vitals per day across the window; days without readings are skipped.
pub fn daily_averages(
    readings: &[Vitals],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<DailyVitals> {
    days_in_window(start, end)
        .into_iter()
        .filter_map(|date| {
            let day: Vec<&Vitals> = readings
                .iter()
                .filter(|v| v.timestamp.date_naive() == date)
                .collect();
            if day.is_empty() {
                return None;
            }
            let n = day.len() as f64;
            let mean = |f: fn(&Vitals) -> f64| day.iter().map(|v| f(v)).sum::<f64>() / n;
            Some(DailyVitals {
                date,
                heart_rate: mean(|v| v.heart_rate.into()).round() as i64,
                blood_pressure: mean(|v| v.blood_pressure.systolic.into()).round() as i64,
                temperature: (mean(|v| v.temperature) * 10.0).round() / 10.0,
                oxygen_saturation: mean(|v| v.oxygen_saturation.into()).round() as i64,
                readings: day.len(),
            })
        })
        .collect()
}
