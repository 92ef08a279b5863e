use crate::db::HabitLogRow;
use crate::tracker::badge::BadgeTier;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMark {
    pub date: NaiveDate,
    pub completed: bool,
}

impl From<&HabitLogRow> for DayMark {
    fn from(row: &HabitLogRow) -> Self {
        Self {
            date: row.date,
            completed: row.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badge: Option<BadgeTier>,
}

impl StreakSummary {
    pub fn from_logs(logs: &[HabitLogRow]) -> Self {
        let marks = logs.iter().map(DayMark::from).collect::<Vec<_>>();
        Self::from_marks(marks)
    }

    pub fn from_marks(mut marks: Vec<DayMark>) -> Self {
        marks.sort_by_key(|mark| mark.date);

        let current_streak = current_streak(&marks);
        Self {
            current_streak,
            longest_streak: longest_streak(&marks),
            badge: BadgeTier::for_streak(current_streak),
        }
    }
}

/// Consecutive completed days ending at the most recent mark.
///
/// `marks` must be sorted by date ascending. The walk stops at the first
/// incomplete day or calendar gap.
pub fn current_streak(marks: &[DayMark]) -> u32 {
    let mut streak = 0;
    let mut expected: Option<NaiveDate> = None;

    for mark in marks.iter().rev() {
        if !mark.completed {
            break;
        }
        if expected.is_some_and(|day| day != mark.date) {
            break;
        }

        streak += 1;
        expected = mark.date.pred_opt();
    }

    streak
}

/// Longest run of consecutive completed days anywhere in `marks` (sorted ascending).
pub fn longest_streak(marks: &[DayMark]) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for mark in marks {
        if !mark.completed {
            run = 0;
            previous = None;
            continue;
        }

        let continues = previous
            .and_then(|day| day.succ_opt())
            .is_some_and(|next| next == mark.date);
        run = if continues { run + 1 } else { 1 };
        longest = longest.max(run);
        previous = Some(mark.date);
    }

    longest
}
