use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Shift;
use super::user::UserContact;
use super::validation::{FieldError, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceInfo {
    pub provider: String,
    pub policy_number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_id: String,
    pub department: String,
    pub shift: Shift,
    pub work_location: String,
    pub supervisor_id: Option<String>,
    pub emergency_contact: EmergencyContact,
    pub medical_history: Vec<String>,
    pub allergies: Vec<String>,
    pub current_medications: Vec<String>,
    pub insurance_info: Option<InsuranceInfo>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A patient profile joined with its owning user's contact fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    #[serde(flatten)]
    pub patient: Patient,
    pub user: UserContact,
}

/// Patient fields supplied at registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRegistration {
    pub employee_id: String,
    pub department: String,
    pub shift: Shift,
    pub work_location: String,
    #[serde(default)]
    pub supervisor_id: Option<String>,
    pub emergency_contact: EmergencyContact,
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub insurance_info: Option<InsuranceInfo>,
}

impl PatientRegistration {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        Validator::new()
            .require("employeeId", &self.employee_id, "Employee ID is required")
            .require("department", &self.department, "Department is required")
            .require(
                "workLocation",
                &self.work_location,
                "Work location is required",
            )
            .require(
                "emergencyContact.name",
                &self.emergency_contact.name,
                "Emergency contact name is required",
            )
            .require(
                "emergencyContact.phone",
                &self.emergency_contact.phone,
                "Emergency contact phone is required",
            )
            .require(
                "emergencyContact.relationship",
                &self.emergency_contact.relationship,
                "Emergency contact relationship is required",
            )
            .finish()
    }

    pub fn into_patient(self, user_id: Uuid, now: DateTime<Utc>) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            user_id,
            employee_id: self.employee_id.trim().to_string(),
            department: self.department.trim().to_string(),
            shift: self.shift,
            work_location: self.work_location.trim().to_string(),
            supervisor_id: self.supervisor_id,
            emergency_contact: self.emergency_contact,
            medical_history: self.medical_history,
            allergies: self.allergies,
            current_medications: self.current_medications,
            insurance_info: self.insurance_info,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable patient fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    pub department: Option<String>,
    pub shift: Option<Shift>,
    pub work_location: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_history: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub current_medications: Option<Vec<String>>,
    pub insurance_info: Option<InsuranceInfo>,
}

impl PatientUpdate {
    pub fn apply(self, patient: &mut Patient) {
        if let Some(v) = self.department {
            patient.department = v;
        }
        if let Some(v) = self.shift {
            patient.shift = v;
        }
        if let Some(v) = self.work_location {
            patient.work_location = v;
        }
        if let Some(v) = self.emergency_contact {
            patient.emergency_contact = v;
        }
        if let Some(v) = self.medical_history {
            patient.medical_history = v;
        }
        if let Some(v) = self.allergies {
            patient.allergies = v;
        }
        if let Some(v) = self.current_medications {
            patient.current_medications = v;
        }
        if self.insurance_info.is_some() {
            patient.insurance_info = self.insurance_info;
        }
    }
}
