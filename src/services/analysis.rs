//! Assembles the correlation report and the overview stats.
//!
//! `build_correlation_report` is pure: it takes already-loaded records and runs
//! the joiner, aggregator and correlation engine. The `load_*` functions read
//! a storage snapshot and hand it over; a storage failure fails the request.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::models::{CommitActivity, WeatherObservation};
use crate::db::queries;
use crate::errors::AppError;
use crate::services::aggregate::{
    commits_by_precip, commits_by_temp, seasonal_stats, PrecipCategory, SeasonalStat,
    TempRangeBucket,
};
use crate::services::correlation::{correlate, CorrelationResult};
use crate::services::metrics::{
    build_daily_metrics, join_commits_with_weather, join_coverage, DailyMetric, JoinCoverage,
    WeatherDay,
};

/// Response for GET /api/v1/correlations.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationReport {
    /// Aligned daily series, ascending by date
    pub daily_metrics: Vec<DailyMetric>,
    pub seasonal_stats: Vec<SeasonalStat>,
    pub commits_by_temp: Vec<TempRangeBucket>,
    pub commits_by_precip: Vec<PrecipCategory>,
    pub correlations: CorrelationResult,
    /// What the commit/weather inner join kept and dropped
    pub join_coverage: JoinCoverage,
}

/// Run the full analytics over one snapshot of commits and weather.
pub fn build_correlation_report(
    commits: &[CommitActivity],
    weather: &[WeatherObservation],
) -> CorrelationReport {
    let weather_days: Vec<WeatherDay> = weather.iter().map(WeatherDay::from).collect();
    let joined = join_commits_with_weather(commits, &weather_days);
    let daily_metrics = build_daily_metrics(&joined);
    let correlations = correlate(&daily_metrics);

    CorrelationReport {
        seasonal_stats: seasonal_stats(&joined),
        commits_by_temp: commits_by_temp(&joined),
        commits_by_precip: commits_by_precip(&joined),
        correlations,
        join_coverage: join_coverage(commits, &weather_days),
        daily_metrics,
    }
}

/// Load commits and weather, then build the report.
pub async fn load_correlation_report(
    pool: &PgPool,
    timezone: &str,
) -> Result<CorrelationReport, AppError> {
    let commits = queries::list_commit_activity(pool, timezone).await?;
    let weather = queries::list_weather_observations(pool).await?;

    let report = build_correlation_report(&commits, &weather);

    let coverage = &report.join_coverage;
    tracing::debug!(
        commits = commits.len(),
        weather_days = coverage.weather_days,
        paired_days = coverage.paired_days,
        "Built correlation report"
    );
    if coverage.commit_days_without_weather > 0 {
        tracing::warn!(
            "{} commit day(s) ({} commits) have no weather observation and were left out of the correlations",
            coverage.commit_days_without_weather,
            coverage.commits_without_weather
        );
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Overview stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitOverview {
    pub total_commits: i64,
    pub total_repos: i64,
    /// First commit day in the reporting timezone; null when no commits are stored
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestOverview {
    pub total_prs: i64,
    pub merged_prs: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherOverview {
    pub weather_days: i64,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
}

/// Response for GET /api/v1/stats.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub commits: CommitOverview,
    pub pull_requests: PullRequestOverview,
    pub weather: WeatherOverview,
}

pub async fn load_stats(pool: &PgPool, timezone: &str) -> Result<StatsResponse, AppError> {
    let commits = queries::get_commit_stats(pool, timezone).await?;
    let prs = queries::get_pull_request_stats(pool).await?;
    let weather = queries::get_weather_stats(pool).await?;

    Ok(StatsResponse {
        commits: CommitOverview {
            total_commits: commits.total_commits,
            total_repos: commits.total_repos,
            date_range_start: commits.date_range_start,
            date_range_end: commits.date_range_end,
        },
        pull_requests: PullRequestOverview {
            total_prs: prs.total_prs,
            merged_prs: prs.merged_prs,
        },
        weather: WeatherOverview {
            weather_days: weather.weather_days,
            date_range_start: weather.date_range_start,
            date_range_end: weather.date_range_end,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metrics::fixtures::{commit, day};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    fn observation(date: &str, temp_avg: &str, precipitation: &str, daylight: &str) -> WeatherObservation {
        WeatherObservation {
            id: Uuid::new_v4(),
            date: day(date),
            location: "NYC".into(),
            temp_min: None,
            temp_max: None,
            temp_avg: Some(Decimal::from_str(temp_avg).unwrap()),
            precipitation: Decimal::from_str(precipitation).unwrap(),
            humidity: Some(60),
            cloud_cover: Some(40),
            daylight_hours: Some(Decimal::from_str(daylight).unwrap()),
        }
    }

    #[test]
    fn test_report_for_single_day_scenario() {
        let commits = vec![
            commit("2024-01-15", 10, 5),
            commit("2024-01-15", 20, 0),
            commit("2024-01-15", 0, 15),
        ];
        let weather = vec![observation("2024-01-15", "28.0", "0", "9.00")];

        let report = build_correlation_report(&commits, &weather);

        assert_eq!(report.daily_metrics.len(), 1);
        assert_eq!(report.daily_metrics[0].commit_count, 3);
        assert_eq!(report.daily_metrics[0].lines_changed, 50);
        assert_eq!(report.seasonal_stats.len(), 1);
        assert_eq!(report.commits_by_temp[0].label, "<32°F (Freezing)");
        assert_eq!(report.commits_by_precip[0].label, "No Rain");
        // A single day cannot correlate
        assert_eq!(report.correlations, CorrelationResult::default());
        assert_eq!(report.join_coverage.paired_days, 1);
    }

    #[test]
    fn test_report_on_empty_store_is_fully_populated() {
        let report = build_correlation_report(&[], &[]);

        assert!(report.daily_metrics.is_empty());
        assert!(report.seasonal_stats.is_empty());
        assert!(report.commits_by_temp.is_empty());
        assert!(report.commits_by_precip.is_empty());
        assert_eq!(report.correlations, CorrelationResult::default());

        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "dailyMetrics",
            "seasonalStats",
            "commitsByTemp",
            "commitsByPrecip",
            "correlations",
            "joinCoverage",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["correlations"]["tempVsCommits"], 0.0);
    }

    #[test]
    fn test_report_counts_commits_without_weather() {
        let commits = vec![
            commit("2024-02-01", 1, 0),
            commit("2024-02-02", 1, 0),
            commit("2024-02-03", 1, 0),
        ];
        let weather = vec![observation("2024-02-01", "35.5", "0.120", "10.10")];

        let report = build_correlation_report(&commits, &weather);

        assert_eq!(report.daily_metrics.len(), 1);
        assert_eq!(report.join_coverage.commit_days_without_weather, 2);
        assert_eq!(report.join_coverage.commits_without_weather, 2);
        assert_eq!(report.commits_by_precip[0].label, "Moderate Rain (0.1-0.5\")");
    }

    #[test]
    fn test_report_correlates_across_days() {
        let commits = vec![
            commit("2024-06-01", 1, 0),
            commit("2024-06-02", 1, 0),
            commit("2024-06-02", 1, 0),
            commit("2024-06-03", 1, 0),
            commit("2024-06-03", 1, 0),
            commit("2024-06-03", 1, 0),
        ];
        let weather = vec![
            observation("2024-06-01", "60.0", "0.3", "15.00"),
            observation("2024-06-02", "70.0", "0.2", "15.00"),
            observation("2024-06-03", "80.0", "0.1", "15.00"),
        ];

        let report = build_correlation_report(&commits, &weather);

        assert!((report.correlations.temp_vs_commits - 1.0).abs() < 1e-9);
        assert!((report.correlations.precip_vs_commits + 1.0).abs() < 1e-9);
        assert_eq!(report.correlations.daylight_vs_commits, 0.0);
    }

    #[test]
    fn test_stats_response_serializes_nulls_for_empty_ranges() {
        let stats = StatsResponse {
            commits: CommitOverview {
                total_commits: 0,
                total_repos: 0,
                date_range_start: None,
                date_range_end: None,
            },
            pull_requests: PullRequestOverview {
                total_prs: 0,
                merged_prs: 0,
            },
            weather: WeatherOverview {
                weather_days: 0,
                date_range_start: None,
                date_range_end: None,
            },
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["commits"]["totalCommits"], 0);
        assert!(json["commits"]["dateRangeStart"].is_null());
        assert_eq!(json["pullRequests"]["mergedPrs"], 0);
        assert!(json["weather"]["dateRangeEnd"].is_null());
    }
}
