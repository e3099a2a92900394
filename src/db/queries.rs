use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{CommitActivity, CommitStats, PullRequestStats, WeatherObservation, WeatherStats};

/// Parameters for inserting a commit.
pub struct InsertCommitParams {
    pub sha: String,
    pub repo_name: String,
    pub author: String,
    pub commit_date: DateTime<Utc>,
    pub message: Option<String>,
    pub additions: i32,
    pub deletions: i32,
    pub files_changed: i32,
}

/// Parameters for inserting a pull request.
pub struct InsertPullRequestParams {
    pub pr_number: i32,
    pub repo_name: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: i32,
    pub deletions: i32,
    pub files_changed: i32,
}

/// Parameters for inserting one day of weather.
pub struct InsertWeatherParams {
    pub date: NaiveDate,
    pub location: String,
    pub temp_min: Option<Decimal>,
    pub temp_max: Option<Decimal>,
    pub temp_avg: Option<Decimal>,
    pub precipitation: Decimal,
    pub humidity: Option<i32>,
    pub cloud_cover: Option<i32>,
    pub daylight_hours: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Analytics reads
// ---------------------------------------------------------------------------

/// All commits with their calendar day in `timezone`, oldest first.
pub async fn list_commit_activity(
    pool: &PgPool,
    timezone: &str,
) -> Result<Vec<CommitActivity>, sqlx::Error> {
    sqlx::query_as::<_, CommitActivity>(
        "SELECT (commit_date AT TIME ZONE $1)::date AS commit_day,
                additions,
                deletions
         FROM github_commits
         ORDER BY commit_date, sha",
    )
    .bind(timezone)
    .fetch_all(pool)
    .await
}

/// All weather observations, ordered by date.
pub async fn list_weather_observations(
    pool: &PgPool,
) -> Result<Vec<WeatherObservation>, sqlx::Error> {
    sqlx::query_as::<_, WeatherObservation>(
        "SELECT id, date, location, temp_min, temp_max, temp_avg, precipitation,
                humidity, cloud_cover, daylight_hours
         FROM weather_data
         ORDER BY date",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_commit_stats(pool: &PgPool, timezone: &str) -> Result<CommitStats, sqlx::Error> {
    sqlx::query_as::<_, CommitStats>(
        "SELECT COUNT(*) AS total_commits,
                COUNT(DISTINCT repo_name) AS total_repos,
                MIN((commit_date AT TIME ZONE $1)::date) AS date_range_start,
                MAX((commit_date AT TIME ZONE $1)::date) AS date_range_end
         FROM github_commits",
    )
    .bind(timezone)
    .fetch_one(pool)
    .await
}

pub async fn get_pull_request_stats(pool: &PgPool) -> Result<PullRequestStats, sqlx::Error> {
    sqlx::query_as::<_, PullRequestStats>(
        "SELECT COUNT(*) AS total_prs,
                COUNT(merged_at) AS merged_prs
         FROM github_pull_requests",
    )
    .fetch_one(pool)
    .await
}

pub async fn get_weather_stats(pool: &PgPool) -> Result<WeatherStats, sqlx::Error> {
    sqlx::query_as::<_, WeatherStats>(
        "SELECT COUNT(*) AS weather_days,
                MIN(date) AS date_range_start,
                MAX(date) AS date_range_end
         FROM weather_data",
    )
    .fetch_one(pool)
    .await
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// First and last commit day in `timezone`, or None when no commits are stored.
pub async fn commit_day_range(
    pool: &PgPool,
    timezone: &str,
) -> Result<Option<(NaiveDate, NaiveDate)>, sqlx::Error> {
    let row: (Option<NaiveDate>, Option<NaiveDate>) = sqlx::query_as(
        "SELECT MIN((commit_date AT TIME ZONE $1)::date),
                MAX((commit_date AT TIME ZONE $1)::date)
         FROM github_commits",
    )
    .bind(timezone)
    .fetch_one(pool)
    .await?;

    Ok(match row {
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    })
}

/// Shas already stored for a repository.
pub async fn existing_commit_shas(
    pool: &PgPool,
    repo_name: &str,
) -> Result<HashSet<String>, sqlx::Error> {
    let shas: Vec<String> =
        sqlx::query_scalar("SELECT sha FROM github_commits WHERE repo_name = $1")
            .bind(repo_name)
            .fetch_all(pool)
            .await?;
    Ok(shas.into_iter().collect())
}

/// Insert a commit. Returns false when the sha was already stored.
pub async fn insert_commit(pool: &PgPool, params: &InsertCommitParams) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO github_commits (
            id, sha, repo_name, author, commit_date, message,
            additions, deletions, files_changed
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (sha) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(&params.sha)
    .bind(&params.repo_name)
    .bind(&params.author)
    .bind(params.commit_date)
    .bind(&params.message)
    .bind(params.additions)
    .bind(params.deletions)
    .bind(params.files_changed)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Insert a pull request. Returns false when (repo, number) was already stored.
pub async fn insert_pull_request(
    pool: &PgPool,
    params: &InsertPullRequestParams,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO github_pull_requests (
            id, pr_number, repo_name, title, created_at, merged_at,
            additions, deletions, files_changed
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (repo_name, pr_number) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(params.pr_number)
    .bind(&params.repo_name)
    .bind(&params.title)
    .bind(params.created_at)
    .bind(params.merged_at)
    .bind(params.additions)
    .bind(params.deletions)
    .bind(params.files_changed)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Insert one day of weather. Returns false when the date was already stored;
/// stored days are never overwritten.
pub async fn insert_weather(
    pool: &PgPool,
    params: &InsertWeatherParams,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO weather_data (
            id, date, location, temp_min, temp_max, temp_avg,
            precipitation, humidity, cloud_cover, daylight_hours
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (date) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(params.date)
    .bind(&params.location)
    .bind(params.temp_min)
    .bind(params.temp_max)
    .bind(params.temp_avg)
    .bind(params.precipitation)
    .bind(params.humidity)
    .bind(params.cloud_cover)
    .bind(params.daylight_hours)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Check that Postgres recognises `timezone` as a zone name.
pub async fn validate_timezone(pool: &PgPool, timezone: &str) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT NOW() AT TIME ZONE $1")
        .bind(timezone)
        .execute(pool)
        .await
        .map(|_| ())
}
