//! Daily alignment of commit activity with weather observations.
//!
//! Commits and weather days are inner-joined on calendar date: a day that has
//! commits but no weather row, or weather but no commits, contributes nothing
//! to the aligned series. Both inputs are expected to carry dates in the same
//! reporting timezone (the storage read resolves commit days).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{CommitActivity, WeatherObservation};
use crate::helpers::{dec_to_f64, opt_dec_to_f64_or_zero};

/// The weather values the analytics use for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherDay {
    pub date: NaiveDate,
    /// Mean temperature, °F; None when the stored row has no value
    pub temp_avg: Option<f64>,
    /// Inches
    pub precipitation: f64,
    pub daylight_hours: f64,
}

impl From<&WeatherObservation> for WeatherDay {
    fn from(w: &WeatherObservation) -> Self {
        Self {
            date: w.date,
            temp_avg: w.temp_avg.map(dec_to_f64),
            precipitation: dec_to_f64(w.precipitation),
            daylight_hours: opt_dec_to_f64_or_zero(w.daylight_hours),
        }
    }
}

/// A single commit paired with the weather of its day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedCommit {
    pub day: NaiveDate,
    pub lines_changed: i64,
    pub weather: WeatherDay,
}

/// Activity and weather for one calendar day present in both inputs.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetric {
    /// Calendar day (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Commits made that day
    pub commit_count: u64,
    /// Sum of additions + deletions over that day's commits
    pub lines_changed: i64,
    /// Mean temperature (°F)
    pub temp: f64,
    /// Precipitation (inches)
    pub precipitation: f64,
    /// Hours of daylight
    pub daylight_hours: f64,
}

/// How much of each input survived the inner join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinCoverage {
    /// Distinct days with at least one commit
    pub commit_days: usize,
    /// Distinct days with a weather observation
    pub weather_days: usize,
    /// Days present in both (the correlation sample size)
    pub paired_days: usize,
    /// Commit days dropped for lack of weather
    pub commit_days_without_weather: usize,
    /// Weather days dropped for lack of commits
    pub weather_days_without_commits: usize,
    /// Commits on dropped days
    pub commits_without_weather: usize,
}

fn index_weather(weather: &[WeatherDay]) -> HashMap<NaiveDate, WeatherDay> {
    let mut by_date = HashMap::with_capacity(weather.len());
    for w in weather {
        // Dates are unique in storage; keep the first if a caller passes duplicates.
        by_date.entry(w.date).or_insert(*w);
    }
    by_date
}

/// Pair every commit with the weather of its day, dropping commits on days
/// without a weather observation. Input order of commits is preserved.
pub fn join_commits_with_weather(
    commits: &[CommitActivity],
    weather: &[WeatherDay],
) -> Vec<JoinedCommit> {
    let by_date = index_weather(weather);
    commits
        .iter()
        .filter_map(|c| {
            by_date.get(&c.commit_day).map(|w| JoinedCommit {
                day: c.commit_day,
                lines_changed: c.lines_changed(),
                weather: *w,
            })
        })
        .collect()
}

/// Collapse joined commits into one metric per day, ascending by date.
pub fn build_daily_metrics(joined: &[JoinedCommit]) -> Vec<DailyMetric> {
    let mut by_day: BTreeMap<NaiveDate, DailyMetric> = BTreeMap::new();
    for j in joined {
        let entry = by_day.entry(j.day).or_insert_with(|| DailyMetric {
            date: j.day,
            commit_count: 0,
            lines_changed: 0,
            // The correlation needs a value for every paired day
            temp: j.weather.temp_avg.unwrap_or(0.0),
            precipitation: j.weather.precipitation,
            daylight_hours: j.weather.daylight_hours,
        });
        entry.commit_count += 1;
        entry.lines_changed += j.lines_changed;
    }
    by_day.into_values().collect()
}

/// Count what the inner join keeps and drops.
pub fn join_coverage(commits: &[CommitActivity], weather: &[WeatherDay]) -> JoinCoverage {
    let weather_dates: BTreeSet<NaiveDate> = weather.iter().map(|w| w.date).collect();
    let commit_dates: BTreeSet<NaiveDate> = commits.iter().map(|c| c.commit_day).collect();
    let paired_days = commit_dates.intersection(&weather_dates).count();

    JoinCoverage {
        commit_days: commit_dates.len(),
        weather_days: weather_dates.len(),
        paired_days,
        commit_days_without_weather: commit_dates.len() - paired_days,
        weather_days_without_commits: weather_dates.len() - paired_days,
        commits_without_weather: commits
            .iter()
            .filter(|c| !weather_dates.contains(&c.commit_day))
            .count(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    fn join_daily_metrics(commits: &[CommitActivity], weather: &[WeatherDay]) -> Vec<DailyMetric> {
        build_daily_metrics(&join_commits_with_weather(commits, weather))
    }

    #[test]
    fn test_single_day_scenario() {
        let commits = vec![
            commit("2024-01-15", 10, 5),
            commit("2024-01-15", 20, 0),
            commit("2024-01-15", 0, 15),
        ];
        let weather = vec![weather("2024-01-15", 28.0, 0.0, 9.0)];

        let metrics = join_daily_metrics(&commits, &weather);

        assert_eq!(
            metrics,
            vec![DailyMetric {
                date: day("2024-01-15"),
                commit_count: 3,
                lines_changed: 50,
                temp: 28.0,
                precipitation: 0.0,
                daylight_hours: 9.0,
            }]
        );
    }

    #[test]
    fn test_inner_join_drops_unpaired_days() {
        let commits = vec![
            commit("2024-03-01", 1, 1),
            commit("2024-03-02", 1, 1),
            commit("2024-03-02", 2, 2),
            commit("2024-03-04", 3, 3),
        ];
        let weather = vec![
            weather("2024-03-02", 45.0, 0.2, 11.5),
            weather("2024-03-03", 47.0, 0.0, 11.6),
            weather("2024-03-04", 50.0, 0.0, 11.7),
        ];

        let metrics = join_daily_metrics(&commits, &weather);

        let dates: Vec<NaiveDate> = metrics.iter().map(|m| m.date).collect();
        assert_eq!(dates, vec![day("2024-03-02"), day("2024-03-04")]);
        assert_eq!(metrics[0].commit_count, 2);
        assert_eq!(metrics[0].lines_changed, 6);
        assert_eq!(metrics[1].commit_count, 1);
    }

    #[test]
    fn test_joined_length_matches_date_intersection() {
        let commits: Vec<CommitActivity> = (1..=20)
            .map(|i| {
                let d = format!("2024-05-{:02}", (i % 10) + 1);
                commit(&d, i, 0)
            })
            .collect();
        let weather: Vec<WeatherDay> = (5..=15)
            .map(|d| weather(&format!("2024-05-{:02}", d), 60.0 + d as f64, 0.0, 14.0))
            .collect();

        let metrics = join_daily_metrics(&commits, &weather);
        let coverage = join_coverage(&commits, &weather);

        // Commits fall on May 1..=10, weather covers May 5..=15
        assert_eq!(metrics.len(), 6);
        assert_eq!(coverage.paired_days, metrics.len());
        for m in &metrics {
            assert!(weather.iter().any(|w| w.date == m.date));
            let expected = commits.iter().filter(|c| c.commit_day == m.date).count() as u64;
            assert_eq!(m.commit_count, expected);
        }
    }

    #[test]
    fn test_output_is_sorted_by_date() {
        let commits = vec![
            commit("2024-02-10", 1, 0),
            commit("2023-12-31", 1, 0),
            commit("2024-01-05", 1, 0),
        ];
        let weather = vec![
            weather("2024-01-05", 30.0, 0.0, 9.3),
            weather("2024-02-10", 35.0, 0.0, 10.4),
            weather("2023-12-31", 33.0, 0.0, 9.2),
        ];

        let metrics = join_daily_metrics(&commits, &weather);
        let dates: Vec<NaiveDate> = metrics.iter().map(|m| m.date).collect();
        assert_eq!(
            dates,
            vec![day("2023-12-31"), day("2024-01-05"), day("2024-02-10")]
        );
    }

    #[test]
    fn test_empty_inputs_yield_empty_series() {
        assert!(join_daily_metrics(&[], &[]).is_empty());
        assert!(join_daily_metrics(&[commit("2024-01-01", 1, 1)], &[]).is_empty());
        assert!(join_daily_metrics(&[], &[weather("2024-01-01", 30.0, 0.0, 9.0)]).is_empty());
    }

    #[test]
    fn test_duplicate_weather_dates_keep_first() {
        let commits = vec![commit("2024-06-01", 1, 0)];
        let weather = vec![
            weather("2024-06-01", 70.0, 0.0, 15.0),
            weather("2024-06-01", 99.0, 1.0, 15.0),
        ];

        let metrics = join_daily_metrics(&commits, &weather);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].temp, 70.0);
    }

    #[test]
    fn test_join_coverage_counts_dropped_days() {
        let commits = vec![
            commit("2024-03-01", 1, 1),
            commit("2024-03-01", 1, 1),
            commit("2024-03-02", 1, 1),
        ];
        let weather = vec![
            weather("2024-03-02", 45.0, 0.0, 11.5),
            weather("2024-03-03", 46.0, 0.0, 11.6),
            weather("2024-03-04", 47.0, 0.0, 11.7),
        ];

        assert_eq!(
            join_coverage(&commits, &weather),
            JoinCoverage {
                commit_days: 2,
                weather_days: 3,
                paired_days: 1,
                commit_days_without_weather: 1,
                weather_days_without_commits: 2,
                commits_without_weather: 2,
            }
        );
    }

    #[test]
    fn test_weather_day_keeps_missing_temperature_and_zeroes_the_rest() {
        let obs = WeatherObservation {
            id: Uuid::new_v4(),
            date: day("2024-01-15"),
            location: "NYC".into(),
            temp_min: None,
            temp_max: None,
            temp_avg: None,
            precipitation: Decimal::from_str("0.125").unwrap(),
            humidity: None,
            cloud_cover: None,
            daylight_hours: None,
        };

        let w = WeatherDay::from(&obs);
        assert_eq!(w.temp_avg, None);
        assert_eq!(w.daylight_hours, 0.0);
        assert!((w.precipitation - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_daily_metric_serializes_camel_case() {
        let m = DailyMetric {
            date: day("2024-01-15"),
            commit_count: 3,
            lines_changed: 50,
            temp: 28.0,
            precipitation: 0.0,
            daylight_hours: 9.0,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["date"], "2024-01-15");
        assert_eq!(json["commitCount"], 3);
        assert_eq!(json["linesChanged"], 50);
        assert_eq!(json["daylightHours"], 9.0);
    }
}
