pub mod badge;
pub mod category;
pub mod frequency;
pub mod stats;
pub mod streak;

use crate::db::{Database, HabitLogRow, HabitRow, UserRow};
use crate::tracker::badge::BadgeTier;
use crate::tracker::stats::{DayProgress, LeaderboardEntry, MonthProgress, UserStats};
use crate::tracker::streak::StreakSummary;
use anyhow::{Result, bail};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::info;

/// Logs may be recorded up to this many days after the server's today, to
/// absorb clients in timezones ahead of the server.
pub const FUTURE_LOG_GRACE_DAYS: i64 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub log: HabitLogRow,
    #[serde(skip)]
    pub created: bool,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badge: Option<BadgeTier>,
    pub new_badges: Vec<BadgeTier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitSummary {
    pub habit_id: i64,
    pub total_logs: usize,
    pub first_log: Option<NaiveDate>,
    pub last_log: Option<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub completion_rate: f64,
    pub badge: Option<BadgeTier>,
    pub next_badge: Option<BadgeTier>,
    pub logs: Vec<HabitLogRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitProgress {
    #[serde(flatten)]
    pub summary: HabitSummary,
    pub weekly_progress: Vec<DayProgress>,
    pub monthly_progress: Vec<MonthProgress>,
}

pub fn validate_log_date(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date > today + Duration::days(FUTURE_LOG_GRACE_DAYS) {
        bail!("Cannot log a habit for a future date: {date}");
    }

    Ok(())
}

/// Records the day's log, then refreshes the habit's badge and awards every
/// tier the current streak has reached.
pub fn record_completion(
    database: &mut Database,
    habit: &HabitRow,
    date: NaiveDate,
    completed: bool,
    today: NaiveDate,
) -> Result<CompletionOutcome> {
    validate_log_date(date, today)?;

    let (log, created) = database.upsert_log(habit.user_id, habit.id, date, completed)?;
    let logs = database.logs_for_habit(habit.user_id, habit.id)?;
    let streaks = StreakSummary::from_logs(&logs);

    if streaks.badge != habit.badge {
        database.set_habit_badge(habit.id, streaks.badge)?;
    }

    let mut new_badges = Vec::new();
    for tier in BadgeTier::reached_by(streaks.current_streak) {
        if database.award_badge(habit.user_id, habit.id, tier, today)? {
            new_badges.push(tier);
        }
    }

    info!(
        user_id = habit.user_id,
        habit_id = habit.id,
        date = %date,
        completed,
        current_streak = streaks.current_streak,
        "habit log recorded"
    );
    if !new_badges.is_empty() {
        info!(
            user_id = habit.user_id,
            habit_id = habit.id,
            badges = ?new_badges,
            "badges earned"
        );
    }

    Ok(CompletionOutcome {
        log,
        created,
        current_streak: streaks.current_streak,
        longest_streak: streaks.longest_streak,
        badge: streaks.badge,
        new_badges,
    })
}

pub fn habit_summary(database: &Database, habit: &HabitRow) -> Result<HabitSummary> {
    let logs = database.logs_for_habit(habit.user_id, habit.id)?;
    Ok(summarize_logs(habit.id, logs))
}

pub fn habit_progress(
    database: &Database,
    habit: &HabitRow,
    today: NaiveDate,
) -> Result<HabitProgress> {
    let logs = database.logs_for_habit(habit.user_id, habit.id)?;
    let weekly_progress = stats::weekly_progress(&logs, today);
    let monthly_progress = stats::monthly_progress(&logs);

    Ok(HabitProgress {
        summary: summarize_logs(habit.id, logs),
        weekly_progress,
        monthly_progress,
    })
}

fn summarize_logs(habit_id: i64, logs: Vec<HabitLogRow>) -> HabitSummary {
    let streaks = StreakSummary::from_logs(&logs);

    HabitSummary {
        habit_id,
        total_logs: logs.len(),
        first_log: logs.first().map(|log| log.date),
        last_log: logs.last().map(|log| log.date),
        current_streak: streaks.current_streak,
        longest_streak: streaks.longest_streak,
        completion_rate: stats::completion_rate(&logs),
        badge: streaks.badge,
        next_badge: BadgeTier::next_after(streaks.current_streak),
        logs,
    }
}

pub fn load_user_stats(database: &Database, user: &UserRow) -> Result<UserStats> {
    let habits = database.habits_for_user(user.id)?;
    let logs = database.logs_for_user(user.id)?;
    let badges = database.earned_badges(user.id)?;

    Ok(stats::user_stats(user, &habits, &logs, badges))
}

pub fn load_leaderboard(database: &Database) -> Result<Vec<LeaderboardEntry>> {
    let all_stats = database
        .list_users()?
        .iter()
        .map(|user| load_user_stats(database, user))
        .collect::<Result<Vec<_>>>()?;

    Ok(stats::rank_users(all_stats))
}

pub fn due_habits(habits: &[HabitRow], day: NaiveDate) -> Vec<i64> {
    habits
        .iter()
        .filter(|habit| habit.frequency.is_due(day))
        .map(|habit| habit.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{habit_summary, load_leaderboard, record_completion, validate_log_date};
    use crate::db::{Database, HabitInput, HabitRow, UserInput};
    use crate::tracker::badge::BadgeTier;
    use crate::tracker::frequency::FrequencyRule;
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database, HabitRow) {
        let dir = tempfile::tempdir().expect("temp dir");
        let database = Database::open(&dir.path().join("habits.db")).expect("open db");
        let user = database
            .insert_user(&UserInput {
                name: "Jun".to_string(),
                email: "jun@example.com".to_string(),
                age: None,
            })
            .expect("user");
        let habit = database
            .insert_habit(
                user.id,
                &HabitInput {
                    name: "Meditate".to_string(),
                    description: None,
                    category: "mindfulness".to_string(),
                    goal: None,
                    frequency: FrequencyRule::default(),
                },
            )
            .expect("habit");

        (dir, database, habit)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).expect("valid date")
    }

    #[test]
    fn seven_consecutive_days_award_bronze_then_silver() {
        let (_dir, mut database, habit) = setup();

        let first = record_completion(
            &mut database,
            &habit,
            today() - Duration::days(6),
            true,
            today(),
        )
        .expect("first log");
        assert!(first.created);
        assert_eq!(first.new_badges, vec![BadgeTier::Bronze]);

        for offset in (1..6).rev() {
            record_completion(
                &mut database,
                &habit,
                today() - Duration::days(offset),
                true,
                today(),
            )
            .expect("log");
        }
        let last = record_completion(&mut database, &habit, today(), true, today())
            .expect("last log");

        assert_eq!(last.current_streak, 7);
        assert_eq!(last.badge, Some(BadgeTier::Silver));
        assert_eq!(last.new_badges, vec![BadgeTier::Silver]);

        let stored = database
            .habit(habit.user_id, habit.id)
            .expect("query")
            .expect("habit");
        assert_eq!(stored.badge, Some(BadgeTier::Silver));
        assert_eq!(database.earned_badges(habit.user_id).expect("badges").len(), 2);
    }

    #[test]
    fn unmarking_latest_day_clears_current_badge_but_keeps_earned() {
        let (_dir, mut database, habit) = setup();
        record_completion(&mut database, &habit, today(), true, today()).expect("log");

        let outcome =
            record_completion(&mut database, &habit, today(), false, today()).expect("relog");
        assert!(!outcome.created);
        assert_eq!(outcome.current_streak, 0);
        assert_eq!(outcome.badge, None);

        let stored = database
            .habit(habit.user_id, habit.id)
            .expect("query")
            .expect("habit");
        assert_eq!(stored.badge, None);
        assert_eq!(database.earned_badges(habit.user_id).expect("badges").len(), 1);
    }

    #[test]
    fn current_streak_runs_back_from_latest_log_not_today() {
        let (_dir, mut database, habit) = setup();
        let run_end = today() - Duration::days(60);

        for offset in (0..3).rev() {
            record_completion(
                &mut database,
                &habit,
                run_end - Duration::days(offset),
                true,
                today(),
            )
            .expect("log");
        }

        let summary = habit_summary(&database, &habit).expect("summary");
        assert_eq!(summary.last_log, Some(run_end));
        assert_eq!(summary.current_streak, 3);
        assert_eq!(summary.badge, Some(BadgeTier::Bronze));
    }

    #[test]
    fn rejects_dates_beyond_grace_window() {
        assert!(validate_log_date(today() + Duration::days(1), today()).is_ok());
        assert!(validate_log_date(today() + Duration::days(2), today()).is_err());
    }

    #[test]
    fn leaderboard_includes_users_without_logs() {
        let (_dir, mut database, habit) = setup();
        database
            .insert_user(&UserInput {
                name: "Idle".to_string(),
                email: "idle@example.com".to_string(),
                age: None,
            })
            .expect("second user");
        record_completion(&mut database, &habit, today(), true, today()).expect("log");

        let ranked = load_leaderboard(&database).expect("leaderboard");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].stats.user_id, habit.user_id);
        assert_eq!(ranked[1].stats.total_completions, 0);
    }
}
