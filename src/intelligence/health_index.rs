use crate::models::VitalsSnapshot;

/// Flat deduction per alert, which differs between views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPenalty {
    /// Patient, analytics and AI views: 5 points per alert.
    Standard,
    /// Employer workforce views: 10 points per alert.
    Workforce,
}

impl AlertPenalty {
    pub fn points(self) -> f64 {
        match self {
            AlertPenalty::Standard => 5.0,
            AlertPenalty::Workforce => 10.0,
        }
    }
}

/// Score of one reading: 100 minus fixed penalties, floored at 0.
pub fn reading_score(vitals: &VitalsSnapshot) -> f64 {
    let mut score: i32 = 100;
    if !(60..=100).contains(&vitals.heart_rate) {
        score -= 20;
    }
    if vitals.blood_pressure.systolic > 140 || vitals.blood_pressure.diastolic > 90 {
        score -= 25;
    }
    if vitals.temperature > 100.0 {
        score -= 30;
    }
    if vitals.oxygen_saturation < 95 {
        score -= 35;
    }
    f64::from(score.max(0))
}

/// Unweighted mean of reading scores minus the alert penalty, in `[0, 100]`.
/// With no readings the index is 100 regardless of alerts.
pub fn health_index<I>(readings: I, alert_count: usize, penalty: AlertPenalty) -> f64
where
    I: IntoIterator<Item = VitalsSnapshot>,
{
    let (total, count) = readings
        .into_iter()
        .fold((0.0, 0usize), |(total, count), v| {
            (total + reading_score(&v), count + 1)
        });
    if count == 0 {
        return 100.0;
    }
    let average = total / count as f64;
    (average - alert_count as f64 * penalty.points()).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::concerns::snapshot;

    #[test]
    fn fully_abnormal_reading_floors_at_zero() {
        let reading = snapshot(110, 150, 95, 101.0, 93);
        assert_eq!(reading_score(&reading), 0.0);
        assert_eq!(health_index([reading], 0, AlertPenalty::Standard), 0.0);
    }

    #[test]
    fn normal_reading_scores_full() {
        let reading = snapshot(70, 120, 80, 98.0, 98);
        assert_eq!(health_index([reading], 0, AlertPenalty::Standard), 100.0);
    }

    #[test]
    fn low_heart_rate_also_penalised() {
        assert_eq!(reading_score(&snapshot(55, 120, 80, 98.0, 98)), 80.0);
    }

    #[test]
    fn readings_average_without_weighting() {
        let readings = [
            snapshot(110, 150, 95, 101.0, 93),
            snapshot(70, 120, 80, 98.0, 98),
            snapshot(70, 120, 80, 98.0, 98),
            snapshot(70, 120, 80, 98.0, 98),
        ];
        assert_eq!(health_index(readings, 0, AlertPenalty::Standard), 75.0);
    }

    #[test]
    fn alert_penalty_depends_on_view() {
        let reading = [snapshot(70, 120, 80, 98.0, 98)];
        assert_eq!(health_index(reading, 2, AlertPenalty::Standard), 90.0);
        assert_eq!(health_index(reading, 2, AlertPenalty::Workforce), 80.0);
        assert_eq!(health_index(reading, 20, AlertPenalty::Workforce), 0.0);
    }

    #[test]
    fn no_readings_means_full_index() {
        let index = health_index(std::iter::empty(), 7, AlertPenalty::Workforce);
        assert_eq!(index, 100.0);
    }
}
