//! Account endpoints: registration, login, profile and socket tickets.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::extract::ApiJson;
use crate::api::types::{ApiContext, AuthUser};
use crate::auth::{hash_password, issue_token, verify_password};
use crate::db;
use crate::models::{
    normalize_email, Doctor, DoctorRegistration, DoctorUpdate, Employer, EmployerRegistration,
    EmployerUpdate, Patient, PatientRegistration, PatientUpdate, Role, User, UserSummary, Validator,
};

const MIN_PASSWORD_LEN: usize = 6;

/// Role-specific part of a registration, selected by `role`.
#[derive(Debug, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ProfileRegistration {
    Patient(PatientRegistration),
    Doctor(DoctorRegistration),
    Employer(EmployerRegistration),
}

impl ProfileRegistration {
    fn role(&self) -> Role {
        match self {
            ProfileRegistration::Patient(_) => Role::Patient,
            ProfileRegistration::Doctor(_) => Role::Doctor,
            ProfileRegistration::Employer(_) => Role::Employer,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub profile: ProfileRegistration,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserSummary,
}

/// The caller's own profile, whichever role it has.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Patient(Patient),
    Doctor(Doctor),
    Employer(Employer),
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    /// Everything else applies to the role profile.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsTicketResponse {
    pub ticket: String,
    pub expires_in: u64,
}

/// `POST /api/auth/register`: create a user and its role profile together.
pub async fn register(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let email = normalize_email(&req.email);
    let mut validator = Validator::new();
    validator
        .check(email.is_some(), "email", "Please provide a valid email")
        .check(
            req.password.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            "Password must be at least 6 characters long",
        )
        .require("firstName", &req.first_name, "First name is required")
        .require("lastName", &req.last_name, "Last name is required");
    match &req.profile {
        ProfileRegistration::Patient(p) => validator.merge(p.validate()),
        ProfileRegistration::Doctor(d) => validator.merge(d.validate()),
        ProfileRegistration::Employer(e) => validator.merge(e.validate()),
    };
    validator.finish()?;
    let email = email.ok_or_else(|| ApiError::bad_request("Please provide a valid email"))?;

    let mut conn = ctx.core.open_db()?;
    if db::get_user_by_email(&conn, &email)?.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: hash_password(&req.password),
        role: req.profile.role(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        phone: req.phone,
        is_active: true,
        last_login: None,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.transaction()?;
    db::insert_user(&tx, &user)?;
    match req.profile {
        ProfileRegistration::Patient(p) => db::insert_patient(&tx, &p.into_patient(user.id, now))?,
        ProfileRegistration::Doctor(d) => db::insert_doctor(&tx, &d.into_doctor(user.id, now))?,
        ProfileRegistration::Employer(e) => {
            db::insert_employer(&tx, &e.into_employer(user.id, now))?
        }
    }
    tx.commit()?;

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");
    let token = token_for(&ctx, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token,
            user: user.summary(),
        }),
    ))
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let invalid = || ApiError::bad_request("Invalid credentials");
    let email = normalize_email(&req.email).ok_or_else(invalid)?;
    if req.password.is_empty() {
        return Err(ApiError::Validation(vec![crate::models::FieldError::new(
            "password",
            "Password is required",
        )]));
    }

    let conn = ctx.core.open_db()?;
    let mut user = db::get_user_by_email(&conn, &email)?.ok_or_else(invalid)?;
    if !user.is_active {
        return Err(ApiError::bad_request("Account is deactivated"));
    }
    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    let now = Utc::now();
    db::record_login(&conn, &user.id, &now)?;
    user.last_login = Some(now);

    let token = token_for(&ctx, &user)?;
    Ok(Json(TokenResponse {
        token,
        user: user.summary(),
    }))
}

/// `GET /api/auth/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<MeResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let user = current_user(&conn, &caller)?;
    let profile = load_profile(&conn, &user)?;
    Ok(Json(MeResponse { user, profile }))
}

/// `PUT /api/auth/profile`: name/phone on the user, the rest on the role profile.
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<ProfileUpdateRequest>,
) -> Result<Json<MeResponse>, ApiError> {
    let mut validator = Validator::new();
    if let Some(first) = &req.first_name {
        validator.require("firstName", first, "First name is required");
    }
    if let Some(last) = &req.last_name {
        validator.require("lastName", last, "Last name is required");
    }
    validator.finish()?;

    let mut conn = ctx.core.open_db()?;
    let mut user = current_user(&conn, &caller)?;
    let now = Utc::now();
    if let Some(first) = req.first_name {
        user.first_name = first.trim().to_string();
    }
    if let Some(last) = req.last_name {
        user.last_name = last.trim().to_string();
    }
    if req.phone.is_some() {
        user.phone = req.phone;
    }
    user.updated_at = now;

    let changes = Value::Object(req.profile);
    let bad_profile =
        |e: serde_json::Error| ApiError::bad_request(format!("Invalid profile data: {e}"));

    let tx = conn.transaction()?;
    db::update_user_details(&tx, &user)?;
    match user.role {
        Role::Patient => {
            if let Some(mut patient) = db::get_patient_by_user(&tx, &user.id)? {
                let update: PatientUpdate = serde_json::from_value(changes).map_err(bad_profile)?;
                update.apply(&mut patient);
                patient.updated_at = now;
                db::update_patient(&tx, &patient)?;
            }
        }
        Role::Doctor => {
            if let Some(mut doctor) = db::get_doctor_by_user(&tx, &user.id)? {
                let update: DoctorUpdate = serde_json::from_value(changes).map_err(bad_profile)?;
                update.apply(&mut doctor);
                doctor.updated_at = now;
                db::update_doctor(&tx, &doctor)?;
            }
        }
        Role::Employer => {
            if let Some(mut employer) = db::get_employer_by_user(&tx, &user.id)? {
                let update: EmployerUpdate = serde_json::from_value(changes).map_err(bad_profile)?;
                update.apply(&mut employer);
                employer.updated_at = now;
                db::update_employer(&tx, &employer)?;
            }
        }
    }
    tx.commit()?;

    let profile = load_profile(&conn, &user)?;
    Ok(Json(MeResponse { user, profile }))
}

/// `POST /api/auth/change-password`
pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::bad_request(
            "Current password and new password are required",
        ));
    }
    if req.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "New password must be at least 6 characters long",
        ));
    }

    let conn = ctx.core.open_db()?;
    let user = current_user(&conn, &caller)?;
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    let hash = hash_password(&req.new_password);
    db::update_password_hash(&conn, &user.id, &hash, &Utc::now())?;

    Ok(Json(MessageResponse {
        message: "Password updated successfully",
    }))
}

/// `POST /api/auth/ws-ticket`: one-time ticket for the socket upgrade.
///
/// Valid for 30 seconds. Keeps the bearer token out of the socket URL.
pub async fn ws_ticket(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<WsTicketResponse>, ApiError> {
    let ticket = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets.issue(caller)
    };

    Ok(Json(WsTicketResponse {
        ticket,
        expires_in: 30,
    }))
}

fn current_user(conn: &rusqlite::Connection, caller: &AuthUser) -> Result<User, ApiError> {
    db::get_user(conn, &caller.user_id)?.ok_or_else(|| ApiError::not_found("User not found"))
}

fn token_for(ctx: &ApiContext, user: &User) -> Result<String, ApiError> {
    let config = &ctx.core.config;
    issue_token(
        &config.jwt_secret,
        user.id,
        user.role,
        config.token_lifetime,
        Utc::now(),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))
}

fn load_profile(conn: &rusqlite::Connection, user: &User) -> Result<Option<Profile>, ApiError> {
    Ok(match user.role {
        Role::Patient => db::get_patient_by_user(conn, &user.id)?.map(Profile::Patient),
        Role::Doctor => db::get_doctor_by_user(conn, &user.id)?.map(Profile::Doctor),
        Role::Employer => db::get_employer_by_user(conn, &user.id)?.map(Profile::Employer),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::testing::TestApp;

    fn patient_registration(email: &str) -> Value {
        json!({
            "email": email,
            "password": "secret123",
            "firstName": "Ravi",
            "lastName": "Kumar",
            "role": "patient",
            "employeeId": "EMP-100",
            "department": "Assembly",
            "shift": "day",
            "workLocation": "Plant 1",
            "emergencyContact": {
                "name": "Asha",
                "phone": "+91-9000000001",
                "relationship": "spouse"
            }
        })
    }

    async fn register(app: &TestApp, email: &str) -> (StatusCode, Value) {
        app.post("/api/auth/register", None, patient_registration(email))
            .await
    }

    async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
        let credentials = json!({"email": email, "password": password});
        app.post("/api/auth/login", None, credentials).await
    }

    #[tokio::test]
    async fn register_then_login() {
        let app = TestApp::new();
        let (status, body) = register(&app, "Ravi@Plant.io").await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["token"].as_str().is_some());
        assert_eq!(body["user"]["email"], "ravi@plant.io");
        assert_eq!(body["user"]["role"], "patient");

        let (status, body) = login(&app, "ravi@plant.io", "secret123").await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = app.get("/api/auth/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["firstName"], "Ravi");
        assert!(me.get("passwordHash").is_none());
        assert_eq!(me["profile"]["employeeId"], "EMP-100");
        assert!(me["lastLogin"].is_string());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let app = TestApp::new();
        register(&app, "dup@plant.io").await;
        let mut again = patient_registration("dup@plant.io");
        again["employeeId"] = json!("EMP-200");
        let (status, body) = app.post("/api/auth/register", None, again).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "User already exists");
    }

    #[tokio::test]
    async fn duplicate_employee_id_is_duplicate_error() {
        let app = TestApp::new();
        register(&app, "one@plant.io").await;
        let (status, body) = register(&app, "two@plant.io").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "DUPLICATE");
    }

    #[tokio::test]
    async fn registration_validation_reports_fields() {
        let app = TestApp::new();
        let mut req = patient_registration("not-an-email");
        req["password"] = json!("123");
        let (status, body) = app.post("/api/auth/register", None, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION");
        let fields: Vec<&str> = body["error"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["email", "password"]);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = TestApp::new();
        let (status, body) = app
            .post("/api/auth/register", None, json!({"email": "x@y.io"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn wrong_password_and_inactive_account() {
        let app = TestApp::new();
        register(&app, "w@plant.io").await;
        let (status, body) = login(&app, "w@plant.io", "nope123").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid credentials");

        let conn = app.conn();
        let user = crate::db::get_user_by_email(&conn, "w@plant.io")
            .unwrap()
            .unwrap();
        crate::db::set_user_active(&conn, &user.id, false).unwrap();
        let (_, body) = login(&app, "w@plant.io", "secret123").await;
        assert_eq!(body["error"]["message"], "Account is deactivated");
    }

    #[tokio::test]
    async fn profile_update_touches_user_and_role_profile() {
        let app = TestApp::new();
        let (_, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let (status, body) = app
            .put(
                "/api/auth/profile",
                Some(&token),
                json!({"firstName": "Meera", "department": "Welding", "shift": "night"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["firstName"], "Meera");
        assert_eq!(body["profile"]["department"], "Welding");
        assert_eq!(body["profile"]["shift"], "night");
    }

    #[tokio::test]
    async fn change_password_requires_current() {
        let app = TestApp::new();
        register(&app, "c@plant.io").await;
        let (_, body) = login(&app, "c@plant.io", "secret123").await;
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = app
            .post(
                "/api/auth/change-password",
                Some(&token),
                json!({"currentPassword": "wrong", "newPassword": "another1"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Current password is incorrect");

        let (status, _) = app
            .post(
                "/api/auth/change-password",
                Some(&token),
                json!({"currentPassword": "secret123", "newPassword": "another1"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = login(&app, "c@plant.io", "another1").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_ticket_requires_auth() {
        let app = TestApp::new();
        let (status, _) = app.post("/api/auth/ws-ticket", None, json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, token) = app.doctor("d@clinic.io", "LIC-1");
        let (status, body) = app
            .post("/api/auth/ws-ticket", Some(&token), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["expiresIn"], 30);
    }
}
