//! # Rating Aggregates
//!
//! Summaries derived from source rows. The database re-scans approved rows
//! and hands the raw `COUNT`/`SUM` here; nothing is ever incremented, so an
//! approve -> reject -> approve sequence lands on the same numbers it
//! started from.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Count and sum of approved ratings for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RatingSummary {
    pub count: i64,
    pub total: i64,
}

impl RatingSummary {
    pub fn new(count: i64, total: i64) -> Self {
        RatingSummary { count, total }
    }

    /// Builds a summary from individual ratings.
    pub fn from_ratings(ratings: impl IntoIterator<Item = i64>) -> Self {
        ratings
            .into_iter()
            .fold(RatingSummary::default(), |acc, rating| RatingSummary {
                count: acc.count + 1,
                total: acc.total + rating,
            })
    }

    /// Mean rating, rounded to two decimals; 0 when there are no ratings.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.total as f64 / self.count as f64;
        (mean * 100.0).round() / 100.0
    }
}

/// Helpfulness counters of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VoteSummary {
    pub helpful_votes: i64,
    pub total_votes: i64,
}

impl VoteSummary {
    /// Share of helpful votes in percent, 0 when nobody voted.
    pub fn helpfulness_percent(&self) -> i64 {
        if self.total_votes == 0 {
            return 0;
        }
        (self.helpful_votes * 100 + self.total_votes / 2) / self.total_votes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_average_is_zero() {
        assert_eq!(RatingSummary::default().average(), 0.0);
    }

    #[test]
    fn test_average_rounds_to_two_decimals() {
        let summary = RatingSummary::from_ratings([5, 4, 4]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.total, 13);
        assert_eq!(summary.average(), 4.33);
    }

    #[test]
    fn test_helpfulness_percent() {
        let votes = VoteSummary {
            helpful_votes: 2,
            total_votes: 3,
        };
        assert_eq!(votes.helpfulness_percent(), 67);
        assert_eq!(VoteSummary::default().helpfulness_percent(), 0);
    }
}
