use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// One commit's contribution to the analytics, with its calendar day already
/// resolved in the reporting timezone by the storage read.
#[derive(Debug, Clone, FromRow)]
pub struct CommitActivity {
    pub commit_day: NaiveDate,
    pub additions: i32,
    pub deletions: i32,
}

impl CommitActivity {
    /// Additions plus deletions, clamped at zero per component.
    pub fn lines_changed(&self) -> i64 {
        i64::from(self.additions.max(0)) + i64::from(self.deletions.max(0))
    }
}

/// A stored daily weather observation for the configured location.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; the analytics read only a subset
pub struct WeatherObservation {
    pub id: Uuid,
    pub date: NaiveDate,
    pub location: String,
    /// °F
    pub temp_min: Option<Decimal>,
    pub temp_max: Option<Decimal>,
    pub temp_avg: Option<Decimal>,
    /// Inches
    pub precipitation: Decimal,
    pub humidity: Option<i32>,
    pub cloud_cover: Option<i32>,
    pub daylight_hours: Option<Decimal>,
}

/// Commit overview counts.
#[derive(Debug, Clone, FromRow)]
pub struct CommitStats {
    pub total_commits: i64,
    pub total_repos: i64,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}

/// Pull request overview counts.
#[derive(Debug, Clone, FromRow)]
pub struct PullRequestStats {
    pub total_prs: i64,
    pub merged_prs: i64,
}

/// Weather coverage overview.
#[derive(Debug, Clone, FromRow)]
pub struct WeatherStats {
    pub weather_days: i64,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}
