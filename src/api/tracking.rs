use crate::api::auth::CurrentUser;
use crate::api::routes::{
    ApiError, ApiResult, ApiState, JsonBody, PathParam, QueryParams, owned_habit,
};
use crate::db::{Database, HabitLogRow};
use crate::tracker::stats::{self, HabitDays, HabitStats, HeatmapCell, LeaderboardPage};
use crate::tracker::{self, CompletionOutcome, HabitProgress, HabitSummary};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct MarkPayload {
    habit_id: i64,
    date: Option<String>,
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<usize>,
}

#[derive(Debug, Serialize)]
struct MarkResponse {
    message: &'static str,
    #[serde(flatten)]
    outcome: CompletionOutcome,
}

#[derive(Debug, Serialize)]
pub struct TodayPayload {
    date: NaiveDate,
    count: usize,
    logs: Vec<HabitLogRow>,
    due_habits: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct RankPayload {
    rank: Option<usize>,
    total_users: usize,
}

#[derive(Debug, Serialize)]
pub struct LogsPayload {
    logs: Vec<HabitLogRow>,
}

#[derive(Debug, Serialize)]
pub struct HabitStatsPayload {
    habits: Vec<HabitStats>,
}

#[derive(Debug, Serialize)]
pub struct HeatmapPayload {
    values: Vec<HeatmapCell>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsPayload {
    stats: Vec<HabitDays>,
}

pub async fn mark(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<MarkPayload>,
) -> ApiResult<Response> {
    let today = today();
    let date = payload
        .date
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or(today);
    tracker::validate_log_date(date, today)
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let mut database = Database::open(&state.config.db_path)?;
    let habit = owned_habit(&database, user.id, payload.habit_id)?;
    let outcome = tracker::record_completion(
        &mut database,
        &habit,
        date,
        payload.completed.unwrap_or(true),
        today,
    )?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "Habit marked")
    } else {
        (StatusCode::OK, "Habit updated")
    };

    Ok((status, Json(MarkResponse { message, outcome })).into_response())
}

pub async fn today_logs(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<DateQuery>,
) -> ApiResult<Json<TodayPayload>> {
    let date = query
        .date
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(today);

    let database = Database::open(&state.config.db_path)?;
    let logs = database.completed_logs_on(user.id, date)?;
    let habits = database.habits_for_user(user.id)?;

    Ok(Json(TodayPayload {
        date,
        count: logs.len(),
        logs,
        due_habits: tracker::due_habits(&habits, date),
    }))
}

pub async fn leaderboard(
    State(state): State<ApiState>,
    CurrentUser(_user): CurrentUser,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Json<LeaderboardPage>> {
    let database = Database::open(&state.config.db_path)?;
    let ranked = tracker::load_leaderboard(&database)?;

    Ok(Json(stats::leaderboard_page(
        ranked,
        query.page.unwrap_or(1),
        state.config.leaderboard_page_size,
    )))
}

pub async fn user_rank(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<RankPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let ranked = tracker::load_leaderboard(&database)?;

    Ok(Json(RankPayload {
        rank: stats::rank_of(&ranked, user.id),
        total_users: ranked.len(),
    }))
}

pub async fn user_statistics(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<stats::UserStats>> {
    let database = Database::open(&state.config.db_path)?;
    let user_stats = tracker::load_user_stats(&database, &user)?;

    Ok(Json(user_stats))
}

pub async fn habit_statistics(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<HabitStatsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let user_stats = tracker::load_user_stats(&database, &user)?;

    Ok(Json(HabitStatsPayload {
        habits: user_stats.habits,
    }))
}

pub async fn heatmap_combined(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<HeatmapPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let logs = database.logs_for_user(user.id)?;

    Ok(Json(HeatmapPayload {
        values: stats::heatmap(&logs),
    }))
}

pub async fn heatmap_habit(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    PathParam(habit_id): PathParam<i64>,
) -> ApiResult<Json<HeatmapPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let habit = owned_habit(&database, user.id, habit_id)?;
    let logs = database.logs_for_habit(user.id, habit.id)?;

    Ok(Json(HeatmapPayload {
        values: stats::heatmap(&logs),
    }))
}

pub async fn summary(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    PathParam(habit_id): PathParam<i64>,
) -> ApiResult<Json<HabitSummary>> {
    let database = Database::open(&state.config.db_path)?;
    let habit = owned_habit(&database, user.id, habit_id)?;

    Ok(Json(tracker::habit_summary(&database, &habit)?))
}

pub async fn history(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    PathParam(habit_id): PathParam<i64>,
) -> ApiResult<Json<LogsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let habit = owned_habit(&database, user.id, habit_id)?;
    let logs = database.logs_for_habit(user.id, habit.id)?;

    Ok(Json(LogsPayload { logs }))
}

pub async fn analytics_overview(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<AnalyticsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let habits = database.habits_for_user(user.id)?;
    let logs = database.logs_for_user(user.id)?;

    Ok(Json(AnalyticsPayload {
        stats: stats::completed_days_by_habit(&habits, &logs),
    }))
}

pub async fn analytics_habit(
    State(state): State<ApiState>,
    CurrentUser(user): CurrentUser,
    PathParam(habit_id): PathParam<i64>,
) -> ApiResult<Json<HabitProgress>> {
    let database = Database::open(&state.config.db_path)?;
    let habit = owned_habit(&database, user.id, habit_id)?;

    Ok(Json(tracker::habit_progress(&database, &habit, today())?))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date(input: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!("Invalid date format: {input}. Example: 2026-02-18"))
    })
}
