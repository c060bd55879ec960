//! Seed helpers shared by the repository and API tests.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::{insert_doctor, insert_employer, insert_patient, insert_user, open_memory_database};
use crate::models::*;

pub(crate) fn test_db() -> Connection {
    open_memory_database().expect("in-memory database")
}

pub(crate) fn seed_user(conn: &Connection, email: &str, role: Role) -> User {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "unusable".into(),
        role,
        first_name: "Test".into(),
        last_name: "User".into(),
        phone: Some("+91-9000000000".into()),
        is_active: true,
        last_login: None,
        created_at: now,
        updated_at: now,
    };
    insert_user(conn, &user).expect("seed user");
    user
}

pub(crate) fn seed_patient(
    conn: &Connection,
    email: &str,
    employee_id: &str,
    department: &str,
) -> (User, Patient) {
    let user = seed_user(conn, email, Role::Patient);
    let now = Utc::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        user_id: user.id,
        employee_id: employee_id.to_string(),
        department: department.to_string(),
        shift: Shift::Day,
        work_location: "Plant 2".into(),
        supervisor_id: None,
        emergency_contact: EmergencyContact {
            name: "Asha".into(),
            phone: "+91-9000000001".into(),
            relationship: "spouse".into(),
        },
        medical_history: Vec::new(),
        allergies: vec!["penicillin".into()],
        current_medications: Vec::new(),
        insurance_info: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    insert_patient(conn, &patient).expect("seed patient");
    (user, patient)
}

pub(crate) fn seed_doctor(conn: &Connection, email: &str, license: &str) -> (User, Doctor) {
    let user = seed_user(conn, email, Role::Doctor);
    let doctor = DoctorRegistration {
        license_number: license.to_string(),
        specialization: "Occupational Medicine".into(),
        department: "Health Services".into(),
        qualifications: vec!["MBBS".into()],
        experience: 8,
        consultation_fee: 500.0,
        availability: None,
        max_patients_per_day: None,
    }
    .into_doctor(user.id, Utc::now());
    insert_doctor(conn, &doctor).expect("seed doctor");
    (user, doctor)
}

pub(crate) fn seed_employer(conn: &Connection, email: &str) -> (User, Employer) {
    let user = seed_user(conn, email, Role::Employer);
    let now = Utc::now();
    let employer = EmployerRegistration {
        company_name: "Vasant Steel".into(),
        industry: "Manufacturing".into(),
        company_size: CompanySize::Large,
        address: Address {
            street: "1 Foundry Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip_code: "411001".into(),
            country: "India".into(),
        },
        contact_info: ContactInfo {
            phone: "+91-2000000000".into(),
            email: email.to_string(),
            website: None,
        },
        subscription: Subscription {
            plan: SubscriptionPlan::Premium,
            start_date: now,
            end_date: now + Duration::days(365),
            is_active: true,
        },
        settings: EmployerSettings::default(),
    }
    .into_employer(user.id, now);
    insert_employer(conn, &employer).expect("seed employer");
    (user, employer)
}

/// A normal reading apart from `heart_rate`.
pub(crate) fn reading(patient_id: Uuid, heart_rate: u32, timestamp: DateTime<Utc>) -> Vitals {
    Vitals {
        id: Uuid::new_v4(),
        patient_id,
        timestamp,
        heart_rate,
        blood_pressure: BloodPressure {
            systolic: 120,
            diastolic: 80,
        },
        temperature: 98.6,
        oxygen_saturation: 98,
        respiratory_rate: 16,
        blood_glucose: None,
        weight: None,
        height: None,
        bmi: None,
        environmental_data: None,
        symptoms: Vec::new(),
        notes: None,
        recorded_by: VitalsSource::Patient,
        is_emergency: false,
        created_at: timestamp,
        updated_at: timestamp,
    }
}

pub(crate) fn emergency_alert(patient_id: Uuid, severity: Severity) -> Alert {
    NewAlert {
        patient_id,
        alert_type: AlertType::Emergency,
        severity,
        title: "Emergency Vitals Detected".into(),
        description: "Critical vitals detected, immediate attention required".into(),
        vitals_data: None,
        environmental_data: None,
        symptoms: Vec::new(),
        ai_analysis: None,
    }
    .into_alert(Utc::now())
}
