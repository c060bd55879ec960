use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{FieldError, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub start: String,
    pub end: String,
    pub available: bool,
}

impl DayAvailability {
    fn open(start: &str, end: &str) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            available: true,
        }
    }

    fn closed(start: &str, end: &str) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            available: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAvailability {
    pub monday: DayAvailability,
    pub tuesday: DayAvailability,
    pub wednesday: DayAvailability,
    pub thursday: DayAvailability,
    pub friday: DayAvailability,
    pub saturday: DayAvailability,
    pub sunday: DayAvailability,
}

impl WeeklyAvailability {
    pub fn on(&self, day: Weekday) -> &DayAvailability {
        match day {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }
}

impl Default for WeeklyAvailability {
    /// Weekdays 09:00-17:00; weekends listed 09:00-13:00 but off.
    fn default() -> Self {
        Self {
            monday: DayAvailability::open("09:00", "17:00"),
            tuesday: DayAvailability::open("09:00", "17:00"),
            wednesday: DayAvailability::open("09:00", "17:00"),
            thursday: DayAvailability::open("09:00", "17:00"),
            friday: DayAvailability::open("09:00", "17:00"),
            saturday: DayAvailability::closed("09:00", "13:00"),
            sunday: DayAvailability::closed("09:00", "13:00"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub license_number: String,
    pub specialization: String,
    pub department: String,
    pub qualifications: Vec<String>,
    pub experience: u32,
    pub consultation_fee: f64,
    pub availability: WeeklyAvailability,
    pub max_patients_per_day: u32,
    pub current_patients: u32,
    pub rating: f64,
    pub total_consultations: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRegistration {
    pub license_number: String,
    pub specialization: String,
    pub department: String,
    #[serde(default)]
    pub qualifications: Vec<String>,
    pub experience: u32,
    pub consultation_fee: f64,
    #[serde(default)]
    pub availability: Option<WeeklyAvailability>,
    #[serde(default)]
    pub max_patients_per_day: Option<u32>,
}

impl DoctorRegistration {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        Validator::new()
            .require(
                "licenseNumber",
                &self.license_number,
                "License number is required",
            )
            .require(
                "specialization",
                &self.specialization,
                "Specialization is required",
            )
            .require("department", &self.department, "Department is required")
            .check(
                self.consultation_fee.is_finite() && self.consultation_fee >= 0.0,
                "consultationFee",
                "Consultation fee cannot be negative",
            )
            .finish()
    }

    pub fn into_doctor(self, user_id: Uuid, now: DateTime<Utc>) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            user_id,
            license_number: self.license_number.trim().to_string(),
            specialization: self.specialization.trim().to_string(),
            department: self.department.trim().to_string(),
            qualifications: self.qualifications,
            experience: self.experience,
            consultation_fee: self.consultation_fee,
            availability: self.availability.unwrap_or_default(),
            max_patients_per_day: self.max_patients_per_day.unwrap_or(20),
            current_patients: 0,
            rating: 0.0,
            total_consultations: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorUpdate {
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub qualifications: Option<Vec<String>>,
    pub experience: Option<u32>,
    pub consultation_fee: Option<f64>,
    pub availability: Option<WeeklyAvailability>,
    pub max_patients_per_day: Option<u32>,
}

impl DoctorUpdate {
    pub fn apply(self, doctor: &mut Doctor) {
        if let Some(v) = self.specialization {
            doctor.specialization = v;
        }
        if let Some(v) = self.department {
            doctor.department = v;
        }
        if let Some(v) = self.qualifications {
            doctor.qualifications = v;
        }
        if let Some(v) = self.experience {
            doctor.experience = v;
        }
        if let Some(fee) = self.consultation_fee {
            if fee.is_finite() && fee >= 0.0 {
                doctor.consultation_fee = fee;
            }
        }
        if let Some(v) = self.availability {
            doctor.availability = v;
        }
        if let Some(v) = self.max_patients_per_day {
            doctor.max_patients_per_day = v;
        }
    }
}
