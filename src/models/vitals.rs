use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VitalsSource;
use super::validation::{FieldError, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

/// Workplace conditions around a reading. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentalReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambient_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_quality: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_level: Option<f64>,
}

/// The four vitals every rule in `intelligence` looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsSnapshot {
    pub heart_rate: u32,
    pub blood_pressure: BloodPressure,
    /// Degrees Fahrenheit.
    pub temperature: f64,
    pub oxygen_saturation: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: u32,
    pub blood_pressure: BloodPressure,
    pub temperature: f64,
    pub oxygen_saturation: u32,
    pub respiratory_rate: u32,
    pub blood_glucose: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub bmi: Option<f64>,
    pub environmental_data: Option<EnvironmentalReading>,
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
    pub recorded_by: VitalsSource,
    pub is_emergency: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vitals {
    pub fn snapshot(&self) -> VitalsSnapshot {
        VitalsSnapshot {
            heart_rate: self.heart_rate,
            blood_pressure: self.blood_pressure,
            temperature: self.temperature,
            oxygen_saturation: self.oxygen_saturation,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BloodPressureInput {
    pub systolic: f64,
    pub diastolic: f64,
}

/// A submitted reading before range checks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsInput {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub heart_rate: f64,
    pub blood_pressure: BloodPressureInput,
    pub temperature: f64,
    pub oxygen_saturation: f64,
    pub respiratory_rate: f64,
    #[serde(default)]
    pub blood_glucose: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub environmental_data: Option<EnvironmentalReading>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn whole_within(value: f64, bounds: RangeInclusive<f64>) -> bool {
    value.is_finite() && value.fract() == 0.0 && bounds.contains(&value)
}

impl VitalsInput {
    /// Reject out-of-range values; nothing is clamped.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let env = self.environmental_data.clone().unwrap_or_default();
        Validator::new()
            .check(
                whole_within(self.heart_rate, 30.0..=250.0),
                "heartRate",
                "Heart rate must be between 30 and 250",
            )
            .check(
                whole_within(self.blood_pressure.systolic, 60.0..=250.0),
                "bloodPressure.systolic",
                "Systolic pressure must be between 60 and 250",
            )
            .check(
                whole_within(self.blood_pressure.diastolic, 30.0..=150.0),
                "bloodPressure.diastolic",
                "Diastolic pressure must be between 30 and 150",
            )
            .range(
                "temperature",
                self.temperature,
                90.0,
                110.0,
                "Temperature must be between 90 and 110",
            )
            .check(
                whole_within(self.oxygen_saturation, 70.0..=100.0),
                "oxygenSaturation",
                "Oxygen saturation must be between 70 and 100",
            )
            .check(
                whole_within(self.respiratory_rate, 8.0..=40.0),
                "respiratoryRate",
                "Respiratory rate must be between 8 and 40",
            )
            .optional_range(
                "bloodGlucose",
                self.blood_glucose,
                50.0,
                500.0,
                "Blood glucose must be between 50 and 500",
            )
            .optional_range(
                "weight",
                self.weight,
                30.0,
                300.0,
                "Weight must be between 30 and 300",
            )
            .optional_range(
                "height",
                self.height,
                100.0,
                250.0,
                "Height must be between 100 and 250",
            )
            .optional_range("bmi", self.bmi, 10.0, 60.0, "BMI must be between 10 and 60")
            .optional_range(
                "environmentalData.humidity",
                env.humidity,
                0.0,
                100.0,
                "Humidity must be between 0 and 100",
            )
            .optional_range(
                "environmentalData.airQuality",
                env.air_quality,
                0.0,
                500.0,
                "Air quality must be between 0 and 500",
            )
            .optional_range(
                "environmentalData.noiseLevel",
                env.noise_level,
                0.0,
                150.0,
                "Noise level must be between 0 and 150",
            )
            .finish()
    }

    /// Build the stored record. Call only after `validate` succeeded.
    pub fn into_vitals(self, patient_id: Uuid, source: VitalsSource, now: DateTime<Utc>) -> Vitals {
        Vitals {
            id: Uuid::new_v4(),
            patient_id,
            timestamp: self.timestamp.unwrap_or(now),
            heart_rate: self.heart_rate as u32,
            blood_pressure: BloodPressure {
                systolic: self.blood_pressure.systolic as u32,
                diastolic: self.blood_pressure.diastolic as u32,
            },
            temperature: self.temperature,
            oxygen_saturation: self.oxygen_saturation as u32,
            respiratory_rate: self.respiratory_rate as u32,
            blood_glucose: self.blood_glucose,
            weight: self.weight,
            height: self.height,
            bmi: self.bmi,
            environmental_data: self.environmental_data,
            symptoms: self
                .symptoms
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            notes: self.notes,
            recorded_by: source,
            is_emergency: false,
            created_at: now,
            updated_at: now,
        }
    }
}
