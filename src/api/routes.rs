use crate::api::auth::CurrentUser;
use crate::api::tracking;
use crate::config::Config;
use crate::db::{Database, Goal, HabitInput, HabitRow, UserInput, is_constraint_violation};
use crate::tracker::category::{canonical_categories, normalize_category};
use crate::tracker::frequency::FrequencyRule;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/users", post(register_user))
        .route(
            "/api/v1/user",
            get(user_get).put(user_put).delete(user_delete),
        )
        .route("/api/v1/habits", get(habits_list).post(habit_create))
        .route(
            "/api/v1/habits/:id",
            get(habit_get).put(habit_put).delete(habit_delete),
        )
        .route("/api/v1/track", post(tracking::mark))
        .route("/api/v1/track/today", get(tracking::today_logs))
        .route("/api/v1/track/leaderboard", get(tracking::leaderboard))
        .route("/api/v1/track/user-rank", get(tracking::user_rank))
        .route("/api/v1/track/stats", get(tracking::user_statistics))
        .route("/api/v1/track/all", get(tracking::habit_statistics))
        .route(
            "/api/v1/track/heatmap/combined",
            get(tracking::heatmap_combined),
        )
        .route("/api/v1/track/heatmap/:id", get(tracking::heatmap_habit))
        .route("/api/v1/track/summary/:id", get(tracking::summary))
        .route("/api/v1/track/:id", get(tracking::history))
        .route("/api/v1/analytics", get(tracking::analytics_overview))
        .route("/api/v1/analytics/:id", get(tracking::analytics_habit))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    name: String,
    email: String,
    age: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserUpdatePayload {
    name: Option<String>,
    email: Option<String>,
    /// Absent keeps the stored age, `null` clears it.
    #[serde(default, deserialize_with = "present")]
    age: Option<Option<i64>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct HabitPayload {
    name: String,
    description: Option<String>,
    category: Option<String>,
    goal: Option<Goal>,
    frequency: Option<FrequencyRule>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    users: i64,
    habits: i64,
    logs: i64,
    latest_log_date: Option<NaiveDate>,
    api_port: u16,
    categories: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct HabitsPayload {
    habits: Vec<HabitRow>,
}

impl HabitPayload {
    fn into_input(self) -> ApiResult<HabitInput> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Habit name is required".to_string()));
        }

        if let Some(goal) = &self.goal {
            if !goal.target.is_finite() || goal.target <= 0.0 {
                return Err(ApiError::BadRequest(
                    "goal.target must be a positive number".to_string(),
                ));
            }
            if goal.unit.trim().is_empty() {
                return Err(ApiError::BadRequest("goal.unit is required".to_string()));
            }
        }

        let frequency = self.frequency.unwrap_or_default();
        frequency
            .validate()
            .map_err(|error| ApiError::BadRequest(error.to_string()))?;

        Ok(HabitInput {
            name,
            description: self
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            category: normalize_category(self.category.as_deref().unwrap_or_default()),
            goal: self.goal.map(|goal| Goal {
                target: goal.target,
                unit: goal.unit.trim().to_string(),
            }),
            frequency: frequency.normalized(),
        })
    }
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let counts = database.counts()?;

    Ok(Json(StatusPayload {
        users: counts.users,
        habits: counts.habits,
        logs: counts.logs,
        latest_log_date: database.latest_log_date()?,
        api_port: state.config.api_port,
        categories: canonical_categories(),
    }))
}

async fn register_user(
    State(state): State<ApiState>,
    JsonBody(payload): JsonBody<RegisterPayload>,
) -> ApiResult<Response> {
    let input = validate_user(payload.name, payload.email, payload.age)?;
    let database = Database::open(&state.config.db_path)?;

    if database.user_by_email(&input.email)?.is_some() {
        return Err(ApiError::BadRequest("Email already exists".to_string()));
    }

    let user = database
        .insert_user(&input)
        .map_err(email_conflict_or_internal)?;
    info!(user_id = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user)).into_response())
}

async fn user_get(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let database = Database::open(&state.config.db_path)?;
    let earned_badges = database.earned_badges(user.id)?;

    Ok(Json(json!({
        "user": user,
        "earned_badges": earned_badges
    })))
}

async fn user_put(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<UserUpdatePayload>,
) -> ApiResult<Json<Value>> {
    let input = validate_user(
        payload.name.unwrap_or(user.name),
        payload.email.unwrap_or(user.email),
        payload.age.unwrap_or(user.age),
    )?;
    let database = Database::open(&state.config.db_path)?;

    if database
        .user_by_email(&input.email)?
        .is_some_and(|existing| existing.id != user.id)
    {
        return Err(ApiError::BadRequest("Email already exists".to_string()));
    }

    let updated = database
        .update_user(user.id, &input)
        .map_err(email_conflict_or_internal)?
        .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

    Ok(Json(json!({
        "saved": true,
        "user": updated
    })))
}

async fn user_delete(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let mut database = Database::open(&state.config.db_path)?;
    database.delete_user(user.id)?;
    info!(user_id = user.id, "user deleted");

    Ok(Json(json!({ "deleted": true })))
}

async fn habits_list(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<HabitsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let habits = database.habits_for_user(user.id)?;

    Ok(Json(HabitsPayload { habits }))
}

async fn habit_create(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<HabitPayload>,
) -> ApiResult<Response> {
    let input = payload.into_input()?;
    let database = Database::open(&state.config.db_path)?;
    let habit = database.insert_habit(user.id, &input)?;
    info!(user_id = user.id, habit_id = habit.id, "habit created");

    Ok((StatusCode::CREATED, Json(habit)).into_response())
}

async fn habit_get(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    PathParam(habit_id): PathParam<i64>,
) -> ApiResult<Json<HabitRow>> {
    let database = Database::open(&state.config.db_path)?;
    let habit = owned_habit(&database, user.id, habit_id)?;

    Ok(Json(habit))
}

async fn habit_put(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    PathParam(habit_id): PathParam<i64>,
    JsonBody(payload): JsonBody<HabitPayload>,
) -> ApiResult<Json<HabitRow>> {
    let input = payload.into_input()?;
    let database = Database::open(&state.config.db_path)?;
    let habit = database
        .update_habit(user.id, habit_id, &input)?
        .ok_or_else(habit_not_found)?;

    Ok(Json(habit))
}

async fn habit_delete(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    PathParam(habit_id): PathParam<i64>,
) -> ApiResult<Json<Value>> {
    let mut database = Database::open(&state.config.db_path)?;
    if !database.delete_habit(user.id, habit_id)? {
        return Err(habit_not_found());
    }
    info!(user_id = user.id, habit_id, "habit deleted");

    Ok(Json(json!({ "deleted": true })))
}

pub(crate) fn owned_habit(
    database: &Database,
    user_id: i64,
    habit_id: i64,
) -> ApiResult<HabitRow> {
    database
        .habit(user_id, habit_id)?
        .ok_or_else(habit_not_found)
}

/// A concurrent registration can pass the lookup and still lose on the
/// unique email index.
fn email_conflict_or_internal(error: anyhow::Error) -> ApiError {
    if is_constraint_violation(&error) {
        ApiError::BadRequest("Email already exists".to_string())
    } else {
        ApiError::Internal(error)
    }
}

fn habit_not_found() -> ApiError {
    ApiError::NotFound("Habit not found".to_string())
}

fn validate_user(name: String, email: String, age: Option<i64>) -> ApiResult<UserInput> {
    let name = name.trim().to_string();
    let email = email.trim().to_lowercase();

    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }
    if age.is_some_and(|value| !(0..=150).contains(&value)) {
        return Err(ApiError::BadRequest("age must be between 0 and 150".to_string()));
    }

    Ok(UserInput { name, email, age })
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `axum::Json` whose rejections render as `{"error": ...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                tracing::error!(error = %error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
