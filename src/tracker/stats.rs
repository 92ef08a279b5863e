use crate::db::{EarnedBadgeRow, HabitLogRow, HabitRow, UserRow};
use crate::tracker::badge::BadgeTier;
use crate::tracker::streak::StreakSummary;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize)]
pub struct HabitStats {
    pub habit_id: i64,
    pub habit_name: String,
    pub category: String,
    pub badge: Option<BadgeTier>,
    pub total_logs: usize,
    pub total_completions: usize,
    pub completion_rate: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsistentHabit {
    pub habit_id: i64,
    pub habit_name: String,
    pub badge: Option<BadgeTier>,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreakHabit {
    pub habit_id: i64,
    pub habit_name: String,
    pub badge: Option<BadgeTier>,
    pub max_streak: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: i64,
    pub user_name: String,
    pub total_habits: usize,
    pub total_completions: usize,
    pub best_streak: u32,
    pub earned_badges: Vec<EarnedBadgeRow>,
    pub most_consistent_habit: Option<ConsistentHabit>,
    pub longest_streak_habit: Option<StreakHabit>,
    pub habits: Vec<HabitStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub stats: UserStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub users: Vec<LeaderboardEntry>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayProgress {
    pub date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthProgress {
    pub month: String,
    pub logs: usize,
    pub completions: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitDays {
    pub habit_id: i64,
    pub habit_name: String,
    pub days_completed: usize,
    pub dates: Vec<NaiveDate>,
}

pub fn completion_rate(logs: &[HabitLogRow]) -> f64 {
    if logs.is_empty() {
        return 0.0;
    }

    completions(logs) as f64 / logs.len() as f64
}

fn completions(logs: &[HabitLogRow]) -> usize {
    logs.iter().filter(|log| log.completed).count()
}

/// Statistics for one habit. `logs` must belong to that habit.
pub fn habit_stats(habit: &HabitRow, logs: &[HabitLogRow]) -> HabitStats {
    let streaks = StreakSummary::from_logs(logs);

    HabitStats {
        habit_id: habit.id,
        habit_name: habit.name.clone(),
        category: habit.category.clone(),
        badge: streaks.badge,
        total_logs: logs.len(),
        total_completions: completions(logs),
        completion_rate: completion_rate(logs),
        current_streak: streaks.current_streak,
        longest_streak: streaks.longest_streak,
    }
}

pub fn user_stats(
    user: &UserRow,
    habits: &[HabitRow],
    logs: &[HabitLogRow],
    earned_badges: Vec<EarnedBadgeRow>,
) -> UserStats {
    let logs_by_habit = group_by_habit(logs);
    let habits = habits
        .iter()
        .map(|habit| {
            let habit_logs = logs_by_habit
                .get(&habit.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            habit_stats(habit, habit_logs)
        })
        .collect::<Vec<_>>();

    UserStats {
        user_id: user.id,
        user_name: user.name.clone(),
        total_habits: habits.len(),
        total_completions: habits.iter().map(|habit| habit.total_completions).sum(),
        best_streak: habits
            .iter()
            .map(|habit| habit.longest_streak)
            .max()
            .unwrap_or_default(),
        earned_badges,
        most_consistent_habit: most_consistent(&habits),
        longest_streak_habit: longest_streak_habit(&habits),
        habits,
    }
}

/// Highest completion rate; ties go to more completions, then the older habit.
/// Habits without any log never qualify.
pub fn most_consistent(habits: &[HabitStats]) -> Option<ConsistentHabit> {
    habits
        .iter()
        .filter(|habit| habit.total_logs > 0)
        .max_by(|left, right| {
            left.completion_rate
                .total_cmp(&right.completion_rate)
                .then_with(|| left.total_completions.cmp(&right.total_completions))
                .then_with(|| right.habit_id.cmp(&left.habit_id))
        })
        .map(|habit| ConsistentHabit {
            habit_id: habit.habit_id,
            habit_name: habit.habit_name.clone(),
            badge: habit.badge,
            completion_rate: habit.completion_rate,
        })
}

pub fn longest_streak_habit(habits: &[HabitStats]) -> Option<StreakHabit> {
    habits
        .iter()
        .filter(|habit| habit.longest_streak > 0)
        .max_by(|left, right| {
            left.longest_streak
                .cmp(&right.longest_streak)
                .then_with(|| right.habit_id.cmp(&left.habit_id))
        })
        .map(|habit| StreakHabit {
            habit_id: habit.habit_id,
            habit_name: habit.habit_name.clone(),
            badge: habit.badge,
            max_streak: habit.longest_streak,
        })
}

pub fn rank_users(mut stats: Vec<UserStats>) -> Vec<LeaderboardEntry> {
    stats.sort_by(compare_for_leaderboard);

    stats
        .into_iter()
        .enumerate()
        .map(|(index, stats)| LeaderboardEntry {
            rank: index + 1,
            stats,
        })
        .collect()
}

fn compare_for_leaderboard(left: &UserStats, right: &UserStats) -> Ordering {
    right
        .total_completions
        .cmp(&left.total_completions)
        .then_with(|| right.best_streak.cmp(&left.best_streak))
        .then_with(|| left.user_id.cmp(&right.user_id))
}

pub fn leaderboard_page(
    ranked: Vec<LeaderboardEntry>,
    page: usize,
    page_size: usize,
) -> LeaderboardPage {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total = ranked.len();

    let users = ranked
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect::<Vec<_>>();

    LeaderboardPage {
        users,
        total,
        page,
        page_size,
        total_pages: total.div_ceil(page_size),
    }
}

pub fn rank_of(ranked: &[LeaderboardEntry], user_id: i64) -> Option<usize> {
    ranked
        .iter()
        .find(|entry| entry.stats.user_id == user_id)
        .map(|entry| entry.rank)
}

/// One cell per day with at least one completion.
pub fn heatmap(logs: &[HabitLogRow]) -> Vec<HeatmapCell> {
    logs.iter()
        .filter(|log| log.completed)
        .fold(BTreeMap::new(), |mut acc, log| {
            *acc.entry(log.date).or_insert(0_usize) += 1;
            acc
        })
        .into_iter()
        .map(|(date, count)| HeatmapCell { date, count })
        .collect()
}

/// The seven calendar days ending at `today`, oldest first.
pub fn weekly_progress(logs: &[HabitLogRow], today: NaiveDate) -> Vec<DayProgress> {
    let completed = logs
        .iter()
        .filter(|log| log.completed)
        .map(|log| log.date)
        .collect::<Vec<_>>();

    (0..7)
        .rev()
        .map(|offset| today - Duration::days(offset))
        .map(|date| DayProgress {
            date,
            completed: completed.contains(&date),
        })
        .collect()
}

pub fn monthly_progress(logs: &[HabitLogRow]) -> Vec<MonthProgress> {
    logs.iter()
        .fold(BTreeMap::new(), |mut acc, log| {
            let entry = acc
                .entry(log.date.format("%Y-%m").to_string())
                .or_insert((0_usize, 0_usize));
            entry.0 += 1;
            if log.completed {
                entry.1 += 1;
            }
            acc
        })
        .into_iter()
        .map(|(month, (logs, completions))| MonthProgress {
            month,
            logs,
            completions,
            completion_rate: completions as f64 / logs as f64,
        })
        .collect()
}

pub fn completed_days_by_habit(habits: &[HabitRow], logs: &[HabitLogRow]) -> Vec<HabitDays> {
    let logs_by_habit = group_by_habit(logs);

    habits
        .iter()
        .map(|habit| {
            let dates = logs_by_habit
                .get(&habit.id)
                .map(|habit_logs| {
                    habit_logs
                        .iter()
                        .filter(|log| log.completed)
                        .map(|log| log.date)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            HabitDays {
                habit_id: habit.id,
                habit_name: habit.name.clone(),
                days_completed: dates.len(),
                dates,
            }
        })
        .collect()
}

fn group_by_habit(logs: &[HabitLogRow]) -> HashMap<i64, Vec<HabitLogRow>> {
    logs.iter().fold(HashMap::new(), |mut acc, log| {
        acc.entry(log.habit_id)
            .or_insert_with(Vec::new)
            .push(log.clone());
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::{
        HabitStats, completion_rate, heatmap, habit_stats, leaderboard_page, monthly_progress,
        most_consistent, rank_of, rank_users, user_stats, weekly_progress,
    };
    use crate::db::{HabitLogRow, HabitRow, UserRow};
    use crate::tracker::badge::BadgeTier;
    use crate::tracker::frequency::FrequencyRule;
    use chrono::NaiveDate;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).expect("valid date")
    }

    fn user(id: i64, name: &str) -> UserRow {
        UserRow {
            id,
            name: name.to_string(),
            email: format!("{name}@example.com"),
            age: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn habit(id: i64, user_id: i64, name: &str) -> HabitRow {
        HabitRow {
            id,
            user_id,
            name: name.to_string(),
            description: None,
            category: "health".to_string(),
            goal: None,
            frequency: FrequencyRule::default(),
            badge: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn log(habit_id: i64, date: NaiveDate, completed: bool) -> HabitLogRow {
        HabitLogRow {
            id: 0,
            user_id: 1,
            habit_id,
            date,
            completed,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn completion_rate_is_zero_without_logs() {
        assert_eq!(completion_rate(&[]), 0.0);
    }

    #[test]
    fn habit_stats_combine_rate_and_streaks() {
        let logs = vec![
            log(1, day(4, 1), true),
            log(1, day(4, 2), false),
            log(1, day(4, 3), true),
            log(1, day(4, 4), true),
        ];
        let stats = habit_stats(&habit(1, 1, "Water"), &logs);

        assert_eq!(stats.total_logs, 4);
        assert_eq!(stats.total_completions, 3);
        assert_eq!(stats.completion_rate, 0.75);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.badge, Some(BadgeTier::Bronze));
    }

    #[test]
    fn user_stats_pick_most_consistent_and_longest_streak() {
        let habits = vec![
            habit(1, 1, "Read"),
            habit(2, 1, "Run"),
            habit(3, 1, "Untouched"),
        ];
        let logs = vec![
            // Read: 2/2 completed, streak 2
            log(1, day(4, 9), true),
            log(1, day(4, 10), true),
            // Run: 3/4 completed, streak 3
            log(2, day(4, 1), true),
            log(2, day(4, 2), true),
            log(2, day(4, 3), true),
            log(2, day(4, 4), false),
        ];

        let stats = user_stats(&user(1, "mina"), &habits, &logs, Vec::new());

        assert_eq!(stats.total_habits, 3);
        assert_eq!(stats.total_completions, 5);
        assert_eq!(stats.best_streak, 3);
        assert_eq!(
            stats.most_consistent_habit.map(|habit| habit.habit_name),
            Some("Read".to_string())
        );
        assert_eq!(
            stats.longest_streak_habit.map(|habit| habit.max_streak),
            Some(3)
        );
    }

    #[test]
    fn user_without_logs_has_no_highlights() {
        let stats = user_stats(&user(1, "new"), &[habit(1, 1, "Read")], &[], Vec::new());

        assert!(stats.most_consistent_habit.is_none());
        assert!(stats.longest_streak_habit.is_none());
        assert_eq!(stats.total_completions, 0);
    }

    #[test]
    fn leaderboard_orders_by_completions_and_paginates() {
        let alice_logs = vec![log(1, day(4, 1), true), log(1, day(4, 2), true)];
        let bob_logs = vec![log(2, day(4, 1), true)];
        let ranked = rank_users(vec![
            user_stats(&user(2, "bob"), &[habit(2, 2, "Run")], &bob_logs, Vec::new()),
            user_stats(&user(3, "carol"), &[], &[], Vec::new()),
            user_stats(&user(1, "alice"), &[habit(1, 1, "Read")], &alice_logs, Vec::new()),
        ]);

        assert_eq!(rank_of(&ranked, 1), Some(1));
        assert_eq!(rank_of(&ranked, 2), Some(2));
        assert_eq!(rank_of(&ranked, 3), Some(3));
        assert_eq!(rank_of(&ranked, 99), None);

        let page = leaderboard_page(ranked.clone(), 2, 2);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].stats.user_name, "carol");

        let past_end = leaderboard_page(ranked, 5, 2);
        assert!(past_end.users.is_empty());
    }

    #[test]
    fn heatmap_counts_completions_per_day() {
        let logs = vec![
            log(1, day(4, 2), true),
            log(2, day(4, 2), true),
            log(3, day(4, 2), false),
            log(1, day(4, 1), true),
        ];

        let cells = heatmap(&logs);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].date, day(4, 1));
        assert_eq!(cells[1].count, 2);
    }

    #[test]
    fn weekly_progress_covers_seven_days_ending_today() {
        let logs = vec![log(1, day(4, 10), true), log(1, day(4, 8), false)];
        let progress = weekly_progress(&logs, day(4, 10));

        assert_eq!(progress.len(), 7);
        assert_eq!(progress[0].date, day(4, 4));
        assert!(progress[6].completed);
        assert!(!progress[4].completed);
    }

    #[test]
    fn monthly_progress_groups_by_month() {
        let logs = vec![
            log(1, day(3, 30), true),
            log(1, day(3, 31), false),
            log(1, day(4, 1), true),
        ];
        let months = monthly_progress(&logs);

        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2026-03");
        assert_eq!(months[0].completion_rate, 0.5);
        assert_eq!(months[1].completion_rate, 1.0);
    }

    fn rated(habit_id: i64, total_logs: usize, total_completions: usize) -> HabitStats {
        HabitStats {
            habit_id,
            habit_name: format!("habit-{habit_id}"),
            category: "health".to_string(),
            badge: None,
            total_logs,
            total_completions,
            completion_rate: total_completions as f64 / total_logs as f64,
            current_streak: 0,
            longest_streak: 0,
        }
    }

    #[test]
    fn equal_completions_rank_by_best_streak_then_user_id() {
        let consecutive = |habit_id| {
            vec![
                log(habit_id, day(4, 1), true),
                log(habit_id, day(4, 2), true),
            ]
        };
        let scattered = vec![log(3, day(4, 1), true), log(3, day(4, 3), true)];

        let ranked = rank_users(vec![
            user_stats(&user(5, "eun"), &[habit(5, 5, "Run")], &consecutive(5), Vec::new()),
            user_stats(&user(3, "cho"), &[habit(3, 3, "Run")], &scattered, Vec::new()),
            user_stats(&user(4, "dan"), &[habit(4, 4, "Run")], &consecutive(4), Vec::new()),
        ]);

        let order = ranked
            .iter()
            .map(|entry| entry.stats.user_id)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![4, 5, 3]);
        assert!(ranked.iter().all(|entry| entry.stats.total_completions == 2));
    }

    #[test]
    fn most_consistent_prefers_more_completions_then_older_habit() {
        let by_completions = most_consistent(&[rated(3, 2, 2), rated(2, 4, 4), rated(1, 2, 1)]);
        assert_eq!(by_completions.map(|habit| habit.habit_id), Some(2));

        let by_id = most_consistent(&[rated(7, 3, 3), rated(4, 3, 3)]);
        assert_eq!(by_id.map(|habit| habit.habit_id), Some(4));
    }
}
