use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyKind {
    Daily,
    Weekly,
    Monthly,
}

/// When a habit is expected to be performed.
///
/// `days` are weekdays counted from Sunday (0..=6) and only apply to weekly
/// habits. `dates` are days of the month (1..=31) and only apply to monthly
/// habits. An empty subset means any day qualifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRule {
    #[serde(rename = "type")]
    pub kind: FrequencyKind,
    #[serde(default)]
    pub days: Vec<u8>,
    #[serde(default)]
    pub dates: Vec<u8>,
}

impl Default for FrequencyRule {
    fn default() -> Self {
        Self {
            kind: FrequencyKind::Daily,
            days: Vec::new(),
            dates: Vec::new(),
        }
    }
}

impl FrequencyRule {
    pub fn validate(&self) -> Result<()> {
        if let Some(day) = self.days.iter().find(|day| **day > 6) {
            bail!("frequency.days must be weekdays 0-6 (0 = Sunday), got {day}");
        }
        if let Some(date) = self.dates.iter().find(|date| !(1..=31).contains(*date)) {
            bail!("frequency.dates must be days of month 1-31, got {date}");
        }

        Ok(())
    }

    /// Sorted, deduplicated copy with the subsets that do not apply to the kind cleared.
    pub fn normalized(mut self) -> Self {
        self.days.sort_unstable();
        self.days.dedup();
        self.dates.sort_unstable();
        self.dates.dedup();

        match self.kind {
            FrequencyKind::Daily => {
                self.days.clear();
                self.dates.clear();
            }
            FrequencyKind::Weekly => self.dates.clear(),
            FrequencyKind::Monthly => self.days.clear(),
        }

        self
    }

    pub fn is_due(&self, day: NaiveDate) -> bool {
        match self.kind {
            FrequencyKind::Daily => true,
            FrequencyKind::Weekly => {
                self.days.is_empty()
                    || self
                        .days
                        .contains(&(day.weekday().num_days_from_sunday() as u8))
            }
            FrequencyKind::Monthly => {
                if self.dates.is_empty() {
                    return true;
                }

                let day_of_month = day.day() as u8;
                // Dates past the end of a short month land on its last day.
                let spills_over =
                    is_last_day_of_month(day) && self.dates.iter().any(|date| *date > day_of_month);

                self.dates.contains(&day_of_month) || spills_over
            }
        }
    }
}

fn is_last_day_of_month(day: NaiveDate) -> bool {
    day.succ_opt()
        .map(|next| next.month() != day.month())
        .unwrap_or(true)
}
