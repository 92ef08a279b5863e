pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  name       TEXT NOT NULL,
  email      TEXT NOT NULL UNIQUE,
  age        INTEGER,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);
"#;

pub const CREATE_HABITS: &str = r#"
CREATE TABLE IF NOT EXISTS habits (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  name        TEXT NOT NULL,
  description TEXT,
  category    TEXT NOT NULL DEFAULT 'other',
  goal_target REAL,
  goal_unit   TEXT,
  frequency   TEXT NOT NULL,
  badge       TEXT,
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const CREATE_HABIT_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS habit_logs (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  habit_id   INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
  date       TEXT NOT NULL,
  completed  INTEGER NOT NULL DEFAULT 0,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL,
  UNIQUE (user_id, habit_id, date)
);
"#;

pub const CREATE_EARNED_BADGES: &str = r#"
CREATE TABLE IF NOT EXISTS earned_badges (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  habit_id    INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
  badge       TEXT NOT NULL,
  date_earned TEXT NOT NULL,
  UNIQUE (user_id, habit_id, badge)
);
"#;

pub const INDEX_HABITS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_habits_user_id ON habits(user_id);";

pub const INDEX_HABIT_LOGS_USER_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_habit_logs_user_date ON habit_logs(user_id, date);";

pub const INDEX_EARNED_BADGES_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_earned_badges_user_id ON earned_badges(user_id);";

pub const USER_COLUMNS: &str = "id, name, email, age, created_at, updated_at";

pub const HABIT_COLUMNS: &str = "id, user_id, name, description, category, goal_target, goal_unit, frequency, badge, created_at, updated_at";

pub const LOG_COLUMNS: &str = "id, user_id, habit_id, date, completed, created_at, updated_at";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_HABITS,
        CREATE_HABIT_LOGS,
        CREATE_EARNED_BADGES,
        INDEX_HABITS_USER,
        INDEX_HABIT_LOGS_USER_DATE,
        INDEX_EARNED_BADGES_USER,
    ]
}
