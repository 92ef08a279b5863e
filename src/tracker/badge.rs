use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
    Diamond,
    Ace,
    Overachiever,
}

impl BadgeTier {
    /// Tiers ordered by ascending streak threshold.
    pub const ALL: [BadgeTier; 6] = [
        BadgeTier::Bronze,
        BadgeTier::Silver,
        BadgeTier::Gold,
        BadgeTier::Diamond,
        BadgeTier::Ace,
        BadgeTier::Overachiever,
    ];

    pub fn threshold_days(self) -> u32 {
        match self {
            BadgeTier::Bronze => 1,
            BadgeTier::Silver => 7,
            BadgeTier::Gold => 30,
            BadgeTier::Diamond => 90,
            BadgeTier::Ace => 180,
            BadgeTier::Overachiever => 365,
        }
    }

    /// Highest tier whose threshold the streak reaches.
    pub fn for_streak(streak: u32) -> Option<Self> {
        Self::ALL
            .iter()
            .rev()
            .find(|tier| streak >= tier.threshold_days())
            .copied()
    }

    /// Every tier up to and including the one the streak qualifies for.
    pub fn reached_by(streak: u32) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .take_while(|tier| streak >= tier.threshold_days())
            .collect()
    }

    pub fn next_after(streak: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| streak < tier.threshold_days())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BadgeTier::Bronze => "Bronze",
            BadgeTier::Silver => "Silver",
            BadgeTier::Gold => "Gold",
            BadgeTier::Diamond => "Diamond",
            BadgeTier::Ace => "Ace",
            BadgeTier::Overachiever => "Overachiever",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "bronze" => Ok(BadgeTier::Bronze),
            "silver" => Ok(BadgeTier::Silver),
            "gold" => Ok(BadgeTier::Gold),
            "diamond" => Ok(BadgeTier::Diamond),
            "ace" => Ok(BadgeTier::Ace),
            "overachiever" => Ok(BadgeTier::Overachiever),
            _ => bail!("Unknown badge tier: {raw}"),
        }
    }
}

impl fmt::Display for BadgeTier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::BadgeTier;

    #[test]
    fn no_badge_without_streak() {
        assert_eq!(BadgeTier::for_streak(0), None);
        assert!(BadgeTier::reached_by(0).is_empty());
    }

    #[test]
    fn highest_qualifying_tier_wins() {
        assert_eq!(BadgeTier::for_streak(1), Some(BadgeTier::Bronze));
        assert_eq!(BadgeTier::for_streak(6), Some(BadgeTier::Bronze));
        assert_eq!(BadgeTier::for_streak(7), Some(BadgeTier::Silver));
        assert_eq!(BadgeTier::for_streak(29), Some(BadgeTier::Silver));
        assert_eq!(BadgeTier::for_streak(30), Some(BadgeTier::Gold));
        assert_eq!(BadgeTier::for_streak(90), Some(BadgeTier::Diamond));
        assert_eq!(BadgeTier::for_streak(180), Some(BadgeTier::Ace));
        assert_eq!(BadgeTier::for_streak(365), Some(BadgeTier::Overachiever));
        assert_eq!(BadgeTier::for_streak(1000), Some(BadgeTier::Overachiever));
    }

    #[test]
    fn reached_tiers_include_lower_ones() {
        assert_eq!(
            BadgeTier::reached_by(30),
            vec![BadgeTier::Bronze, BadgeTier::Silver, BadgeTier::Gold]
        );
        assert_eq!(BadgeTier::next_after(30), Some(BadgeTier::Diamond));
        assert_eq!(BadgeTier::next_after(400), None);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(BadgeTier::parse(" gold ").expect("tier"), BadgeTier::Gold);
        assert!(BadgeTier::parse("platinum").is_err());
    }
}
