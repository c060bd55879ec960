use std::fmt;

use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The serde representation is the same string as the database column.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
    Employer => "employer",
});

str_enum!(Shift {
    Day => "day",
    Night => "night",
    Rotating => "rotating",
});

str_enum!(CompanySize {
    Small => "small",
    Medium => "medium",
    Large => "large",
    Enterprise => "enterprise",
});

str_enum!(SubscriptionPlan {
    Basic => "basic",
    Premium => "premium",
    Enterprise => "enterprise",
});

str_enum!(VitalsSource {
    Patient => "patient",
    Device => "device",
    Doctor => "doctor",
    Ai => "ai",
});

str_enum!(AlertType {
    HeatStress => "heat_stress",
    Fatigue => "fatigue",
    Respiratory => "respiratory",
    Injury => "injury",
    Emergency => "emergency",
    Medication => "medication",
    Appointment => "appointment",
});

str_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

str_enum!(AlertStatus {
    Active => "active",
    Acknowledged => "acknowledged",
    Resolved => "resolved",
    Dismissed => "dismissed",
});

str_enum!(AlertActionType {
    Notification => "notification",
    Consultation => "consultation",
    Medication => "medication",
    Rest => "rest",
    Emergency => "emergency",
});

str_enum!(NotificationChannel {
    Email => "email",
    Sms => "sms",
    Push => "push",
    InApp => "in_app",
});

str_enum!(ChatStatus {
    Active => "active",
    Closed => "closed",
    Escalated => "escalated",
});

str_enum!(ChatPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

str_enum!(MessageKind {
    User => "user",
    Ai => "ai",
    Doctor => "doctor",
    Action => "action",
});

str_enum!(ChatActionType {
    Emergency => "emergency",
    Consultation => "consultation",
    Medication => "medication",
    Reminder => "reminder",
});

str_enum!(RiskLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

// Coarse triage bucket used on doctor and employer listings.
str_enum!(Urgency {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl AlertType {
    /// Dashboard label: `heat_stress` becomes `HEAT STRESS`.
    pub fn display_name(&self) -> String {
        self.as_str().replacen('_', " ", 1).to_uppercase()
    }
}

impl AlertStatus {
    /// Allowed lifecycle moves. Resolved and dismissed are terminal;
    /// re-acknowledging is accepted and keeps the alert acknowledged.
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!(
            (self, next),
            (Active, Acknowledged)
                | (Acknowledged, Acknowledged)
                | (Active, Resolved)
                | (Acknowledged, Resolved)
                | (Active, Dismissed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Dismissed)
    }

    /// Statuses from which `next` is reachable.
    pub fn sources_of(next: AlertStatus) -> Vec<AlertStatus> {
        [
            AlertStatus::Active,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
            AlertStatus::Dismissed,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .collect()
    }
}

impl RiskLevel {
    /// Breakpoints: above 80 critical, above 60 high, above 40 medium.
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s > 80 => RiskLevel::Critical,
            s if s > 60 => RiskLevel::High,
            s if s > 40 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enum_roundtrip_through_str() {
        assert_eq!(
            AlertType::from_str("heat_stress").unwrap(),
            AlertType::HeatStress
        );
        assert_eq!(NotificationChannel::InApp.as_str(), "in_app");
        assert_eq!(Role::Employer.to_string(), "employer");
    }

    #[test]
    fn invalid_enum_value_rejected() {
        let err = Severity::from_str("catastrophic").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_column_strings() {
        let json = serde_json::to_string(&AlertType::HeatStress).unwrap();
        assert_eq!(json, "\"heat_stress\"");
        let parsed: Role = serde_json::from_str("\"doctor\"").unwrap();
        assert_eq!(parsed, Role::Doctor);
    }

    #[test]
    fn alert_lifecycle_rules() {
        use AlertStatus::*;
        assert!(Active.can_transition_to(Acknowledged));
        assert!(Acknowledged.can_transition_to(Acknowledged));
        assert!(Acknowledged.can_transition_to(Resolved));
        assert!(Active.can_transition_to(Dismissed));
        assert!(!Acknowledged.can_transition_to(Dismissed));
        assert!(!Resolved.can_transition_to(Active));
        assert!(!Resolved.can_transition_to(Resolved));
        assert!(!Dismissed.can_transition_to(Acknowledged));
        assert!(Resolved.is_terminal() && Dismissed.is_terminal());
        assert_eq!(
            AlertStatus::sources_of(Resolved),
            vec![Active, Acknowledged]
        );
        assert_eq!(AlertStatus::sources_of(Dismissed), vec![Active]);
    }

    #[test]
    fn alert_type_display_name() {
        assert_eq!(AlertType::HeatStress.display_name(), "HEAT STRESS");
        assert_eq!(AlertType::Emergency.display_name(), "EMERGENCY");
    }

    #[test]
    fn risk_level_breakpoints() {
        assert_eq!(RiskLevel::from_score(81), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(61), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(41), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
    }
}
