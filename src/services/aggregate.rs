//! Categorical breakdowns of the commit × weather population.
//!
//! Each breakdown regroups the joined commits (one row per commit, carrying
//! its day's weather) by a category rather than by date:
//!
//! - season of the commit's month
//! - temperature band of the day's mean temperature
//! - precipitation band of the day's precipitation
//!
//! Every average is 0 for an undefined aggregate, never NaN or infinite.
//! Categories without members are omitted. A day without a mean temperature
//! is left out of temperature averages and bands but still counts elsewhere.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use super::metrics::JoinedCommit;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Meteorological season, northern hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

/// Season of a calendar month (1 = January). Months outside 1..=12 fall to `Fall`.
pub fn classify_season(month: u32) -> Season {
    match month {
        12 | 1 | 2 => Season::Winter,
        3..=5 => Season::Spring,
        6..=8 => Season::Summer,
        _ => Season::Fall,
    }
}

/// Mean-temperature band, °F. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TempBucket {
    Freezing,
    Cold,
    Cool,
    Warm,
    Hot,
}

impl TempBucket {
    pub fn label(self) -> &'static str {
        match self {
            TempBucket::Freezing => "<32°F (Freezing)",
            TempBucket::Cold => "32-50°F (Cold)",
            TempBucket::Cool => "50-70°F (Cool)",
            TempBucket::Warm => "70-85°F (Warm)",
            TempBucket::Hot => "85°F+ (Hot)",
        }
    }
}

pub fn classify_temp_bucket(temp_f: f64) -> TempBucket {
    if temp_f < 32.0 {
        TempBucket::Freezing
    } else if temp_f < 50.0 {
        TempBucket::Cold
    } else if temp_f < 70.0 {
        TempBucket::Cool
    } else if temp_f < 85.0 {
        TempBucket::Warm
    } else {
        TempBucket::Hot
    }
}

/// Daily precipitation band, inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrecipBucket {
    NoRain,
    Light,
    Moderate,
    Heavy,
}

impl PrecipBucket {
    pub fn label(self) -> &'static str {
        match self {
            PrecipBucket::NoRain => "No Rain",
            PrecipBucket::Light => "Light Rain (< 0.1\")",
            PrecipBucket::Moderate => "Moderate Rain (0.1-0.5\")",
            PrecipBucket::Heavy => "Heavy Rain (0.5\"+)",
        }
    }
}

pub fn classify_precip_bucket(precip_in: f64) -> PrecipBucket {
    if precip_in == 0.0 {
        PrecipBucket::NoRain
    } else if precip_in < 0.1 {
        PrecipBucket::Light
    } else if precip_in < 0.5 {
        PrecipBucket::Moderate
    } else {
        PrecipBucket::Heavy
    }
}

// ---------------------------------------------------------------------------
// Output rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalStat {
    pub season: Season,
    /// Commits in the season
    pub commit_count: u64,
    /// Commits divided by distinct commit days in the season
    pub avg_commits_per_day: f64,
    /// Mean additions + deletions per commit
    pub avg_lines_changed: f64,
    /// Mean temperature (°F), one sample per commit on a day with a known temperature
    pub avg_temp: f64,
    /// Mean precipitation (inches), one sample per commit
    pub avg_precipitation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TempRangeBucket {
    /// Band label, e.g. "<32°F (Freezing)"
    pub label: String,
    pub commit_count: u64,
    pub avg_lines_changed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrecipCategory {
    /// Band label, e.g. "No Rain"
    pub label: String,
    pub commit_count: u64,
    pub avg_commits_per_day: f64,
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Running sums for one category.
#[derive(Debug, Default)]
struct GroupAccumulator {
    commits: u64,
    days: BTreeSet<NaiveDate>,
    lines_sum: i64,
    temp_sum: f64,
    temp_samples: u64,
    precip_sum: f64,
    min_temp: Option<f64>,
}

impl GroupAccumulator {
    fn add(&mut self, j: &JoinedCommit) {
        self.commits += 1;
        self.days.insert(j.day);
        self.lines_sum += j.lines_changed;
        self.precip_sum += j.weather.precipitation;
        if let Some(temp) = j.weather.temp_avg {
            self.temp_sum += temp;
            self.temp_samples += 1;
            self.min_temp = Some(self.min_temp.map_or(temp, |m| m.min(temp)));
        }
    }

    fn commits_per_day(&self) -> f64 {
        safe_div(self.commits as f64, self.days.len() as f64)
    }

    fn mean_lines(&self) -> f64 {
        safe_div(self.lines_sum as f64, self.commits as f64)
    }

    fn mean_temp(&self) -> f64 {
        safe_div(self.temp_sum, self.temp_samples as f64)
    }

    fn mean_precip(&self) -> f64 {
        safe_div(self.precip_sum, self.commits as f64)
    }
}

/// `num / den`, or 0 when the quotient is undefined or not finite.
fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let q = num / den;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

fn group_by<K, F>(joined: &[JoinedCommit], key: F) -> BTreeMap<K, GroupAccumulator>
where
    K: Ord,
    F: Fn(&JoinedCommit) -> K,
{
    let mut groups: BTreeMap<K, GroupAccumulator> = BTreeMap::new();
    for j in joined {
        groups.entry(key(j)).or_default().add(j);
    }
    groups
}

/// Per-season activity, in Winter, Spring, Summer, Fall order.
pub fn seasonal_stats(joined: &[JoinedCommit]) -> Vec<SeasonalStat> {
    group_by(joined, |j| classify_season(j.day.month()))
        .into_iter()
        .map(|(season, g)| SeasonalStat {
            season,
            commit_count: g.commits,
            avg_commits_per_day: g.commits_per_day(),
            avg_lines_changed: g.mean_lines(),
            avg_temp: g.mean_temp(),
            avg_precipitation: g.mean_precip(),
        })
        .collect()
}

/// Per-temperature-band activity, ordered by the coldest member of each band.
/// Commits on days without a mean temperature belong to no band.
pub fn commits_by_temp(joined: &[JoinedCommit]) -> Vec<TempRangeBucket> {
    let known: Vec<JoinedCommit> = joined
        .iter()
        .filter(|j| j.weather.temp_avg.is_some())
        .copied()
        .collect();
    let mut groups: Vec<(TempBucket, GroupAccumulator)> =
        group_by(&known, |j| classify_temp_bucket(j.weather.temp_avg.unwrap_or_default()))
            .into_iter()
            .collect();
    groups.sort_by(|(_, a), (_, b)| {
        a.min_temp
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.min_temp.unwrap_or(f64::INFINITY))
    });

    groups
        .into_iter()
        .map(|(bucket, g)| TempRangeBucket {
            label: bucket.label().to_string(),
            commit_count: g.commits,
            avg_lines_changed: g.mean_lines(),
        })
        .collect()
}

/// Per-precipitation-band activity, ordered by mean precipitation of each band.
pub fn commits_by_precip(joined: &[JoinedCommit]) -> Vec<PrecipCategory> {
    let mut groups: Vec<(PrecipBucket, GroupAccumulator)> =
        group_by(joined, |j| classify_precip_bucket(j.weather.precipitation))
            .into_iter()
            .collect();
    groups.sort_by(|(_, a), (_, b)| a.mean_precip().total_cmp(&b.mean_precip()));

    groups
        .into_iter()
        .map(|(bucket, g)| PrecipCategory {
            label: bucket.label().to_string(),
            commit_count: g.commits,
            avg_commits_per_day: g.commits_per_day(),
        })
        .collect()
}
