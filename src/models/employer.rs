use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CompanySize, SubscriptionPlan};
use super::validation::{FieldError, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: SubscriptionPlan,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Per-type alert thresholds (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertThresholds {
    pub heat_stress: u32,
    pub fatigue: u32,
    pub respiratory: u32,
    pub injury: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            heat_stress: 80,
            fatigue: 70,
            respiratory: 60,
            injury: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            push: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
    pub timezone: String,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: "08:00".into(),
            end: "17:00".into(),
            timezone: "UTC".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployerSettings {
    pub alert_thresholds: AlertThresholds,
    pub notification_preferences: NotificationPreferences,
    pub working_hours: WorkingHours,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub industry: String,
    pub company_size: CompanySize,
    pub address: Address,
    pub contact_info: ContactInfo,
    pub subscription: Subscription,
    pub settings: EmployerSettings,
    pub total_employees: u32,
    pub active_employees: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerRegistration {
    pub company_name: String,
    pub industry: String,
    pub company_size: CompanySize,
    pub address: Address,
    pub contact_info: ContactInfo,
    pub subscription: Subscription,
    #[serde(default)]
    pub settings: EmployerSettings,
}

impl EmployerRegistration {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        Validator::new()
            .require(
                "companyName",
                &self.company_name,
                "Company name is required",
            )
            .require("industry", &self.industry, "Industry is required")
            .require("address.city", &self.address.city, "City is required")
            .require(
                "address.country",
                &self.address.country,
                "Country is required",
            )
            .require(
                "contactInfo.phone",
                &self.contact_info.phone,
                "Company phone is required",
            )
            .require(
                "contactInfo.email",
                &self.contact_info.email,
                "Company email is required",
            )
            .check(
                self.subscription.end_date > self.subscription.start_date,
                "subscription.endDate",
                "Subscription end date must be after start date",
            )
            .finish()
    }

    pub fn into_employer(self, user_id: Uuid, now: DateTime<Utc>) -> Employer {
        Employer {
            id: Uuid::new_v4(),
            user_id,
            company_name: self.company_name.trim().to_string(),
            industry: self.industry.trim().to_string(),
            company_size: self.company_size,
            address: self.address,
            contact_info: self.contact_info,
            subscription: self.subscription,
            settings: self.settings,
            total_employees: 0,
            active_employees: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerUpdate {
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<CompanySize>,
    pub address: Option<Address>,
    pub contact_info: Option<ContactInfo>,
    pub settings: Option<EmployerSettings>,
}

impl EmployerUpdate {
    pub fn apply(self, employer: &mut Employer) {
        if let Some(v) = self.company_name {
            employer.company_name = v;
        }
        if let Some(v) = self.industry {
            employer.industry = v;
        }
        if let Some(v) = self.company_size {
            employer.company_size = v;
        }
        if let Some(v) = self.address {
            employer.address = v;
        }
        if let Some(v) = self.contact_info {
            employer.contact_info = v;
        }
        if let Some(v) = self.settings {
            employer.settings = v;
        }
    }
}

fn default_true() -> bool {
    true
}
