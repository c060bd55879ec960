use crate::models::VitalsSnapshot;

/// One out-of-band vital with its risk weight and follow-up advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concern {
    pub label: &'static str,
    pub recommendation: &'static str,
    pub weight: u32,
}

const ELEVATED_HEART_RATE: Concern = Concern {
    label: "Elevated heart rate",
    recommendation: "Monitor for stress or dehydration",
    weight: 20,
};
const HIGH_BLOOD_PRESSURE: Concern = Concern {
    label: "High blood pressure",
    recommendation: "Consider medication review",
    weight: 25,
};
const ELEVATED_TEMPERATURE: Concern = Concern {
    label: "Elevated temperature",
    recommendation: "Monitor for infection or heat stress",
    weight: 30,
};
const LOW_OXYGEN: Concern = Concern {
    label: "Low oxygen saturation",
    recommendation: "Immediate medical attention required",
    weight: 35,
};

/// Concerns raised by a single reading, in fixed order.
pub fn vital_concerns(vitals: &VitalsSnapshot) -> Vec<Concern> {
    let mut concerns = Vec::new();
    if vitals.heart_rate > 100 {
        concerns.push(ELEVATED_HEART_RATE);
    }
    if vitals.blood_pressure.systolic > 140 || vitals.blood_pressure.diastolic > 90 {
        concerns.push(HIGH_BLOOD_PRESSURE);
    }
    if vitals.temperature > 100.0 {
        concerns.push(ELEVATED_TEMPERATURE);
    }
    if vitals.oxygen_saturation < 95 {
        concerns.push(LOW_OXYGEN);
    }
    concerns
}

#[cfg(test)]
pub(crate) fn snapshot(
    heart_rate: u32,
    systolic: u32,
    diastolic: u32,
    temperature: f64,
    o2: u32,
) -> VitalsSnapshot {
    VitalsSnapshot {
        heart_rate,
        blood_pressure: crate::models::BloodPressure {
            systolic,
            diastolic,
        },
        temperature,
        oxygen_saturation: o2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_reading_has_no_concerns() {
        assert!(vital_concerns(&snapshot(72, 120, 80, 98.6, 98)).is_empty());
    }

    #[test]
    fn all_concerns_in_order() {
        let labels: Vec<_> = vital_concerns(&snapshot(110, 150, 95, 101.0, 93))
            .iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "Elevated heart rate",
                "High blood pressure",
                "Elevated temperature",
                "Low oxygen saturation"
            ]
        );
    }

    #[test]
    fn diastolic_alone_counts_as_high_pressure() {
        let concerns = vital_concerns(&snapshot(80, 130, 91, 98.6, 97));
        assert_eq!(concerns, vec![HIGH_BLOOD_PRESSURE]);
    }
}
