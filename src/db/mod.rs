pub mod queries;

use crate::tracker::badge::BadgeTier;
use crate::tracker::frequency::FrequencyRule;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarnedBadgeRow {
    pub habit_id: i64,
    pub badge: BadgeTier,
    pub date_earned: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub target: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub goal: Option<Goal>,
    pub frequency: FrequencyRule,
    pub badge: Option<BadgeTier>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitLogRow {
    pub id: i64,
    pub user_id: i64,
    pub habit_id: i64,
    pub date: NaiveDate,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub age: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct HabitInput {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub goal: Option<Goal>,
    pub frequency: FrequencyRule,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreCounts {
    pub users: i64,
    pub habits: i64,
    pub logs: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn insert_user(&self, input: &UserInput) -> Result<UserRow> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO users (name, email, age, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                params![input.name, input.email, input.age, now],
            )
            .context("Failed to insert user")?;

        let id = self.conn.last_insert_rowid();
        self.user(id)?.context("Inserted user could not be read back")
    }

    pub fn user(&self, id: i64) -> Result<Option<UserRow>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", queries::USER_COLUMNS);
        self.conn
            .query_row(&sql, params![id], user_from_row)
            .optional()
            .context("Failed to query user")
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = ?1",
            queries::USER_COLUMNS
        );
        self.conn
            .query_row(&sql, params![email], user_from_row)
            .optional()
            .context("Failed to query user by email")
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        let sql = format!("SELECT {} FROM users ORDER BY id ASC", queries::USER_COLUMNS);
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")?;

        Ok(rows)
    }

    pub fn update_user(&self, id: i64, input: &UserInput) -> Result<Option<UserRow>> {
        let updated = self
            .conn
            .execute(
                "UPDATE users SET name = ?1, email = ?2, age = ?3, updated_at = ?4 WHERE id = ?5",
                params![input.name, input.email, input.age, Utc::now().timestamp(), id],
            )
            .context("Failed to update user")?;

        if updated == 0 {
            return Ok(None);
        }
        self.user(id)
    }

    pub fn delete_user(&mut self, id: i64) -> Result<bool> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        transaction
            .execute("DELETE FROM earned_badges WHERE user_id = ?1", params![id])
            .context("Failed to delete earned badges")?;
        transaction
            .execute("DELETE FROM habit_logs WHERE user_id = ?1", params![id])
            .context("Failed to delete habit logs")?;
        transaction
            .execute("DELETE FROM habits WHERE user_id = ?1", params![id])
            .context("Failed to delete habits")?;
        let deleted = transaction
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .context("Failed to delete user")?;

        transaction.commit().context("Failed to commit user deletion")?;
        Ok(deleted > 0)
    }

    pub fn earned_badges(&self, user_id: i64) -> Result<Vec<EarnedBadgeRow>> {
        let mut statement = self.conn.prepare(
            "SELECT habit_id, badge, date_earned
             FROM earned_badges
             WHERE user_id = ?1
             ORDER BY date_earned ASC, id ASC",
        )?;

        let rows = statement
            .query_map(params![user_id], |row| {
                Ok(EarnedBadgeRow {
                    habit_id: row.get(0)?,
                    badge: row.get(1)?,
                    date_earned: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query earned badges")?;

        Ok(rows)
    }

    /// Returns `false` when the user already holds this badge for the habit.
    pub fn award_badge(
        &self,
        user_id: i64,
        habit_id: i64,
        badge: BadgeTier,
        date_earned: NaiveDate,
    ) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO earned_badges (user_id, habit_id, badge, date_earned) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, habit_id, badge, date_earned],
            )
            .context("Failed to award badge")?;

        Ok(inserted > 0)
    }

    pub fn insert_habit(&self, user_id: i64, input: &HabitInput) -> Result<HabitRow> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO habits (user_id, name, description, category, goal_target, goal_unit, frequency, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    user_id,
                    input.name,
                    input.description,
                    input.category,
                    input.goal.as_ref().map(|goal| goal.target),
                    input.goal.as_ref().map(|goal| goal.unit.as_str()),
                    input.frequency,
                    now
                ],
            )
            .context("Failed to insert habit")?;

        let id = self.conn.last_insert_rowid();
        self.habit(user_id, id)?
            .context("Inserted habit could not be read back")
    }

    pub fn habit(&self, user_id: i64, habit_id: i64) -> Result<Option<HabitRow>> {
        let sql = format!(
            "SELECT {} FROM habits WHERE id = ?1 AND user_id = ?2",
            queries::HABIT_COLUMNS
        );
        self.conn
            .query_row(&sql, params![habit_id, user_id], habit_from_row)
            .optional()
            .context("Failed to query habit")
    }

    pub fn habits_for_user(&self, user_id: i64) -> Result<Vec<HabitRow>> {
        let sql = format!(
            "SELECT {} FROM habits WHERE user_id = ?1 ORDER BY id ASC",
            queries::HABIT_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id], habit_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query habits")?;

        Ok(rows)
    }

    pub fn update_habit(
        &self,
        user_id: i64,
        habit_id: i64,
        input: &HabitInput,
    ) -> Result<Option<HabitRow>> {
        let updated = self
            .conn
            .execute(
                "UPDATE habits
                 SET name = ?1, description = ?2, category = ?3, goal_target = ?4, goal_unit = ?5, frequency = ?6, updated_at = ?7
                 WHERE id = ?8 AND user_id = ?9",
                params![
                    input.name,
                    input.description,
                    input.category,
                    input.goal.as_ref().map(|goal| goal.target),
                    input.goal.as_ref().map(|goal| goal.unit.as_str()),
                    input.frequency,
                    Utc::now().timestamp(),
                    habit_id,
                    user_id
                ],
            )
            .context("Failed to update habit")?;

        if updated == 0 {
            return Ok(None);
        }
        self.habit(user_id, habit_id)
    }

    pub fn set_habit_badge(&self, habit_id: i64, badge: Option<BadgeTier>) -> Result<()> {
        self.conn
            .execute(
                "UPDATE habits SET badge = ?1 WHERE id = ?2",
                params![badge, habit_id],
            )
            .context("Failed to update habit badge")?;

        Ok(())
    }

    pub fn delete_habit(&mut self, user_id: i64, habit_id: i64) -> Result<bool> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        transaction
            .execute(
                "DELETE FROM earned_badges WHERE user_id = ?1 AND habit_id = ?2",
                params![user_id, habit_id],
            )
            .context("Failed to delete habit badges")?;
        transaction
            .execute(
                "DELETE FROM habit_logs WHERE user_id = ?1 AND habit_id = ?2",
                params![user_id, habit_id],
            )
            .context("Failed to delete habit logs")?;
        let deleted = transaction
            .execute(
                "DELETE FROM habits WHERE id = ?1 AND user_id = ?2",
                params![habit_id, user_id],
            )
            .context("Failed to delete habit")?;

        transaction
            .commit()
            .context("Failed to commit habit deletion")?;
        Ok(deleted > 0)
    }

    /// Inserts or updates the single log for (user, habit, date).
    /// The flag is `true` when a new row was created.
    pub fn upsert_log(
        &mut self,
        user_id: i64,
        habit_id: i64,
        date: NaiveDate,
        completed: bool,
    ) -> Result<(HabitLogRow, bool)> {
        let now = Utc::now().timestamp();
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let existing = transaction
            .query_row(
                "SELECT id FROM habit_logs WHERE user_id = ?1 AND habit_id = ?2 AND date = ?3",
                params![user_id, habit_id, date],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .context("Failed to look up existing habit log")?;

        transaction
            .execute(
                "INSERT INTO habit_logs (user_id, habit_id, date, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(user_id, habit_id, date)
                 DO UPDATE SET completed=excluded.completed, updated_at=excluded.updated_at",
                params![user_id, habit_id, date, completed, now],
            )
            .context("Failed to upsert habit log")?;

        let sql = format!(
            "SELECT {} FROM habit_logs WHERE user_id = ?1 AND habit_id = ?2 AND date = ?3",
            queries::LOG_COLUMNS
        );
        let row = transaction
            .query_row(&sql, params![user_id, habit_id, date], log_from_row)
            .context("Failed to read back habit log")?;

        transaction.commit().context("Failed to commit habit log")?;
        Ok((row, existing.is_none()))
    }

    pub fn logs_for_habit(&self, user_id: i64, habit_id: i64) -> Result<Vec<HabitLogRow>> {
        let sql = format!(
            "SELECT {} FROM habit_logs WHERE user_id = ?1 AND habit_id = ?2 ORDER BY date ASC",
            queries::LOG_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id, habit_id], log_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query habit logs")?;

        Ok(rows)
    }

    pub fn logs_for_user(&self, user_id: i64) -> Result<Vec<HabitLogRow>> {
        let sql = format!(
            "SELECT {} FROM habit_logs WHERE user_id = ?1 ORDER BY habit_id ASC, date ASC",
            queries::LOG_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id], log_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query user logs")?;

        Ok(rows)
    }

    pub fn completed_logs_on(&self, user_id: i64, date: NaiveDate) -> Result<Vec<HabitLogRow>> {
        let sql = format!(
            "SELECT {} FROM habit_logs WHERE user_id = ?1 AND date = ?2 AND completed = 1 ORDER BY habit_id ASC",
            queries::LOG_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id, date], log_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query today's logs")?;

        Ok(rows)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<i64> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .with_context(|| format!("Failed to count {table}"))
        };

        Ok(StoreCounts {
            users: count("users")?,
            habits: count("habits")?,
            logs: count("habit_logs")?,
        })
    }

    pub fn latest_log_date(&self) -> Result<Option<NaiveDate>> {
        self.conn
            .query_row("SELECT MAX(date) FROM habit_logs", [], |row| row.get(0))
            .context("Failed to query latest log date")
    }
}

/// True when a SQLite constraint (unique index, foreign key) rejected the write.
pub fn is_constraint_violation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation
        )
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        age: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<HabitRow> {
    let goal_target: Option<f64> = row.get(5)?;
    let goal_unit: Option<String> = row.get(6)?;

    Ok(HabitRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        goal: goal_target
            .zip(goal_unit)
            .map(|(target, unit)| Goal { target, unit }),
        frequency: row.get(7)?,
        badge: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<HabitLogRow> {
    Ok(HabitLogRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        habit_id: row.get(2)?,
        date: row.get(3)?,
        completed: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl ToSql for BadgeTier {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BadgeTier {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        BadgeTier::parse(value.as_str()?).map_err(|error| FromSqlError::Other(error.into()))
    }
}

impl ToSql for FrequencyRule {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let encoded = serde_json::to_string(self)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
        Ok(ToSqlOutput::from(encoded))
    }
}

impl FromSql for FrequencyRule {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        serde_json::from_str(value.as_str()?).map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, Goal, HabitInput, UserInput, is_constraint_violation};
    use crate::tracker::badge::BadgeTier;
    use crate::tracker::frequency::{FrequencyKind, FrequencyRule};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Database) {
        let dir = tempfile::tempdir().expect("temp dir");
        let database = Database::open(&dir.path().join("habits.db")).expect("open db");
        (dir, database)
    }

    fn user_input(email: &str) -> UserInput {
        UserInput {
            name: "Mina".to_string(),
            email: email.to_string(),
            age: Some(31),
        }
    }

    fn habit_input(name: &str) -> HabitInput {
        HabitInput {
            name: name.to_string(),
            description: None,
            category: "fitness".to_string(),
            goal: Some(Goal {
                target: 5.0,
                unit: "km".to_string(),
            }),
            frequency: FrequencyRule {
                kind: FrequencyKind::Weekly,
                days: vec![1, 3, 5],
                dates: Vec::new(),
            },
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).expect("valid date")
    }

    #[test]
    fn habit_round_trips_goal_and_frequency() {
        let (_dir, database) = open_temp();
        let user = database.insert_user(&user_input("mina@example.com")).expect("user");
        let habit = database.insert_habit(user.id, &habit_input("Run")).expect("habit");

        let loaded = database
            .habit(user.id, habit.id)
            .expect("query")
            .expect("habit exists");
        assert_eq!(loaded.goal.map(|goal| goal.unit), Some("km".to_string()));
        assert_eq!(loaded.frequency.days, vec![1, 3, 5]);
        assert_eq!(loaded.badge, None);
    }

    #[test]
    fn habits_are_scoped_to_their_owner() {
        let (_dir, database) = open_temp();
        let owner = database.insert_user(&user_input("a@example.com")).expect("owner");
        let other = database.insert_user(&user_input("b@example.com")).expect("other");
        let habit = database.insert_habit(owner.id, &habit_input("Read")).expect("habit");

        assert!(database.habit(other.id, habit.id).expect("query").is_none());
        assert!(
            database
                .update_habit(other.id, habit.id, &habit_input("Hijack"))
                .expect("update")
                .is_none()
        );
    }

    #[test]
    fn upsert_keeps_one_log_per_day() {
        let (_dir, mut database) = open_temp();
        let user = database.insert_user(&user_input("c@example.com")).expect("user");
        let habit = database.insert_habit(user.id, &habit_input("Stretch")).expect("habit");

        let (first, created) = database
            .upsert_log(user.id, habit.id, day(3), true)
            .expect("insert");
        assert!(created);
        assert!(first.completed);

        let (second, created) = database
            .upsert_log(user.id, habit.id, day(3), false)
            .expect("update");
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert!(!second.completed);

        let logs = database.logs_for_habit(user.id, habit.id).expect("logs");
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn logs_are_returned_in_date_order() {
        let (_dir, mut database) = open_temp();
        let user = database.insert_user(&user_input("d@example.com")).expect("user");
        let habit = database.insert_habit(user.id, &habit_input("Walk")).expect("habit");

        for d in [7, 2, 5] {
            database
                .upsert_log(user.id, habit.id, day(d), true)
                .expect("log");
        }

        let dates = database
            .logs_for_habit(user.id, habit.id)
            .expect("logs")
            .into_iter()
            .map(|log| log.date)
            .collect::<Vec<_>>();
        assert_eq!(dates, vec![day(2), day(5), day(7)]);
        assert_eq!(database.latest_log_date().expect("latest"), Some(day(7)));
    }

    #[test]
    fn award_badge_is_idempotent() {
        let (_dir, database) = open_temp();
        let user = database.insert_user(&user_input("e@example.com")).expect("user");
        let habit = database.insert_habit(user.id, &habit_input("Journal")).expect("habit");

        assert!(
            database
                .award_badge(user.id, habit.id, BadgeTier::Bronze, day(1))
                .expect("award")
        );
        assert!(
            !database
                .award_badge(user.id, habit.id, BadgeTier::Bronze, day(2))
                .expect("award again")
        );

        let badges = database.earned_badges(user.id).expect("badges");
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].date_earned, day(1));
    }

    #[test]
    fn duplicate_email_is_a_constraint_violation() {
        let (_dir, database) = open_temp();
        database.insert_user(&user_input("g@example.com")).expect("user");
        let second = database.insert_user(&user_input("h@example.com")).expect("user");

        let insert = database
            .insert_user(&user_input("g@example.com"))
            .expect_err("duplicate insert");
        assert!(is_constraint_violation(&insert));

        let update = database
            .update_user(second.id, &user_input("g@example.com"))
            .expect_err("duplicate update");
        assert!(is_constraint_violation(&update));

        assert!(!is_constraint_violation(&anyhow::anyhow!("plain failure")));
    }

    #[test]
    fn deleting_user_removes_owned_rows() {
        let (_dir, mut database) = open_temp();
        let user = database.insert_user(&user_input("f@example.com")).expect("user");
        let habit = database.insert_habit(user.id, &habit_input("Swim")).expect("habit");
        database
            .upsert_log(user.id, habit.id, day(1), true)
            .expect("log");
        database
            .award_badge(user.id, habit.id, BadgeTier::Bronze, day(1))
            .expect("award");

        assert!(database.delete_user(user.id).expect("delete"));
        assert!(!database.delete_user(user.id).expect("delete again"));

        let counts = database.counts().expect("counts");
        assert_eq!(counts.users, 0);
        assert_eq!(counts.habits, 0);
        assert_eq!(counts.logs, 0);
    }
}
