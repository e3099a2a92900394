//! Open-Meteo historical weather archive client.
//!
//! Fetches daily aggregates for one location and converts them to the units
//! the store keeps: °F, inches, hours.
//! See: https://open-meteo.com/en/docs/historical-weather-api

use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;

const DAILY_VARIABLES: &str = "temperature_2m_max,temperature_2m_min,temperature_2m_mean,\
    precipitation_sum,relative_humidity_2m_mean,cloud_cover_mean,daylight_duration";

const MM_PER_INCH: f64 = 25.4;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Client for the Open-Meteo archive API.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

/// One day of weather in storage units.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub temp_min_f: Option<f64>,
    pub temp_max_f: Option<f64>,
    pub temp_avg_f: f64,
    pub precipitation_in: f64,
    pub humidity_pct: Option<i32>,
    pub cloud_cover_pct: Option<i32>,
    pub daylight_hours: Option<f64>,
}

/// Converted days plus the count of days skipped for lack of data.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveFetch {
    pub days: Vec<DailyWeather>,
    pub skipped: usize,
}

// --- Open-Meteo JSON response types ---

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveDaily,
}

/// Column-oriented daily series; every vector is indexed like `time`.
#[derive(Debug, Default, Deserialize)]
struct ArchiveDaily {
    time: Vec<NaiveDate>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover_mean: Vec<Option<f64>>,
    #[serde(default)]
    daylight_duration: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ArchiveError {
    reason: Option<String>,
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten().filter(|v| v.is_finite())
}

fn round_pct(v: f64) -> i32 {
    v.round().clamp(0.0, 100.0) as i32
}

impl ArchiveDaily {
    /// Convert to storage units. Days without a mean temperature are skipped:
    /// the archive returns nulls for days it has not yet processed.
    fn into_fetch(self) -> ArchiveFetch {
        let mut days = Vec::with_capacity(self.time.len());
        let mut skipped = 0;

        for (i, date) in self.time.iter().enumerate() {
            let Some(mean_c) = at(&self.temperature_2m_mean, i) else {
                tracing::debug!("No archived temperature for {}, skipping", date);
                skipped += 1;
                continue;
            };

            days.push(DailyWeather {
                date: *date,
                temp_min_f: at(&self.temperature_2m_min, i).map(celsius_to_fahrenheit),
                temp_max_f: at(&self.temperature_2m_max, i).map(celsius_to_fahrenheit),
                temp_avg_f: celsius_to_fahrenheit(mean_c),
                precipitation_in: at(&self.precipitation_sum, i)
                    .map(|mm| mm_to_inches(mm.max(0.0)))
                    .unwrap_or(0.0),
                humidity_pct: at(&self.relative_humidity_2m_mean, i).map(round_pct),
                cloud_cover_pct: at(&self.cloud_cover_mean, i).map(round_pct),
                daylight_hours: at(&self.daylight_duration, i)
                    .map(|s| (s / SECONDS_PER_HOUR).clamp(0.0, 24.0)),
            });
        }

        ArchiveFetch { days, skipped }
    }
}

impl OpenMeteoClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Fetch daily weather for `start..=end`, with days in `timezone`.
    pub async fn fetch_daily(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
        timezone: &str,
    ) -> Result<ArchiveFetch, AppError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", format!("{:.4}", latitude)),
                ("longitude", format!("{:.4}", longitude)),
                ("start_date", start.to_string()),
                ("end_date", end.to_string()),
                ("daily", DAILY_VARIABLES.to_string()),
                ("timezone", timezone.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("Weather archive request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<ArchiveError>()
                .await
                .ok()
                .and_then(|e| e.reason)
                .unwrap_or_else(|| "no reason given".to_string());
            return Err(AppError::ExternalServiceError(format!(
                "Weather archive returned HTTP {}: {}",
                status, reason
            )));
        }

        let body: ArchiveResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("Weather archive JSON parse error: {}", e))
        })?;

        Ok(body.daily.into_fetch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-12);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-12);
        assert!((celsius_to_fahrenheit(-40.0) + 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_mm_to_inches() {
        assert!((mm_to_inches(25.4) - 1.0).abs() < 1e-12);
        assert_eq!(mm_to_inches(0.0), 0.0);
    }

    #[test]
    fn test_into_fetch_converts_units() {
        let daily: ArchiveDaily = serde_json::from_value(serde_json::json!({
            "time": ["2024-01-15"],
            "temperature_2m_max": [1.0],
            "temperature_2m_min": [-5.0],
            "temperature_2m_mean": [-2.0],
            "precipitation_sum": [12.7],
            "relative_humidity_2m_mean": [71.6],
            "cloud_cover_mean": [40.2],
            "daylight_duration": [33480.0]
        }))
        .unwrap();

        let fetch = daily.into_fetch();
        assert_eq!(fetch.skipped, 0);
        let day = &fetch.days[0];
        assert_eq!(day.date, date("2024-01-15"));
        assert!((day.temp_avg_f - 28.4).abs() < 1e-9);
        assert!((day.temp_min_f.unwrap() - 23.0).abs() < 1e-9);
        assert!((day.temp_max_f.unwrap() - 33.8).abs() < 1e-9);
        assert!((day.precipitation_in - 0.5).abs() < 1e-9);
        assert_eq!(day.humidity_pct, Some(72));
        assert_eq!(day.cloud_cover_pct, Some(40));
        assert!((day.daylight_hours.unwrap() - 9.3).abs() < 1e-9);
    }

    #[test]
    fn test_into_fetch_skips_days_without_mean_temperature() {
        let daily: ArchiveDaily = serde_json::from_value(serde_json::json!({
            "time": ["2024-01-15", "2024-01-16"],
            "temperature_2m_mean": [3.0, null],
            "precipitation_sum": [null, null]
        }))
        .unwrap();

        let fetch = daily.into_fetch();
        assert_eq!(fetch.skipped, 1);
        assert_eq!(fetch.days.len(), 1);
        // Missing precipitation counts as dry
        assert_eq!(fetch.days[0].precipitation_in, 0.0);
        assert_eq!(fetch.days[0].daylight_hours, None);
    }

    #[tokio::test]
    async fn test_fetch_daily_sends_location_range_and_timezone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("latitude", "40.7128"))
            .and(query_param("longitude", "-74.0060"))
            .and(query_param("start_date", "2024-01-15"))
            .and(query_param("end_date", "2024-01-16"))
            .and(query_param("timezone", "America/New_York"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latitude": 40.71,
                "longitude": -74.0,
                "daily": {
                    "time": ["2024-01-15", "2024-01-16"],
                    "temperature_2m_max": [2.0, 4.0],
                    "temperature_2m_min": [-3.0, -1.0],
                    "temperature_2m_mean": [-1.0, 1.5],
                    "precipitation_sum": [0.0, 3.0],
                    "relative_humidity_2m_mean": [60.0, 80.0],
                    "cloud_cover_mean": [20.0, 95.0],
                    "daylight_duration": [33400.0, 33500.0]
                }
            })))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&format!("{}/v1/archive", server.uri())).unwrap();
        let fetch = assert_ok!(
            client
                .fetch_daily(
                    40.7128,
                    -74.006,
                    date("2024-01-15"),
                    date("2024-01-16"),
                    "America/New_York",
                )
                .await
        );

        assert_eq!(fetch.days.len(), 2);
        assert_eq!(fetch.days[0].precipitation_in, 0.0);
        assert!((fetch.days[1].temp_avg_f - 34.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_daily_surfaces_api_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": true,
                "reason": "Parameter 'start_date' is out of allowed range"
            })))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&server.uri()).unwrap();
        let err = assert_err!(
            client
                .fetch_daily(
                    40.7128,
                    -74.006,
                    date("1900-01-01"),
                    date("1900-01-02"),
                    "America/New_York",
                )
                .await
        );
        assert!(err.to_string().contains("out of allowed range"));
    }
}
