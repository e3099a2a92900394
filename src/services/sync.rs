//! On-demand ingestion jobs: GitHub commits and pull requests, then the
//! weather for the days those commits span.
//!
//! Each job runs on its own tokio task so a dropped HTTP request cannot leave
//! it half-recorded. Job bookkeeping is in-memory (`Arc<RwLock<SyncState>>`)
//! and is exposed via the sync status endpoint.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::config::LocationConfig;
use crate::db::queries::{self, InsertCommitParams, InsertPullRequestParams, InsertWeatherParams};
use crate::errors::AppError;
use crate::helpers::{f64_to_decimal, opt_f64_to_decimal, DAYLIGHT_DP, PRECIPITATION_DP, TEMPERATURE_DP};
use crate::services::github::{GithubClient, GithubCommit, GithubPullRequest, GithubRepo};
use crate::services::open_meteo::{DailyWeather, OpenMeteoClient};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Concurrent per-commit detail requests within one repository.
const COMMIT_DETAIL_CONCURRENCY: usize = 8;

/// Pause between repositories to stay clear of secondary rate limits.
const REPO_PAUSE_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Sync state (in-memory, shared via Arc<RwLock<>>)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncJob {
    Github,
    Weather,
}

impl SyncJob {
    fn name(self) -> &'static str {
        match self {
            SyncJob::Github => "github",
            SyncJob::Weather => "weather",
        }
    }
}

/// Bookkeeping for one job.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncJobState {
    pub running: bool,
    pub total_runs: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    /// "ok" or "error"; null before the first run completes
    pub last_result: Option<String>,
    pub last_error: Option<String>,
}

impl SyncJobState {
    fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.last_started_at = Some(now);
        true
    }

    fn complete(&mut self, now: DateTime<Utc>, error: Option<String>) {
        self.running = false;
        self.total_runs += 1;
        self.last_completed_at = Some(now);
        self.last_duration_ms = self
            .last_started_at
            .and_then(|started| (now - started).num_milliseconds().try_into().ok());
        self.last_result = Some(if error.is_some() { "error" } else { "ok" }.to_string());
        self.last_error = error;
    }
}

/// State of both sync jobs, exposed via the status endpoint.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SyncState {
    pub github: SyncJobState,
    pub weather: SyncJobState,
}

impl SyncState {
    fn job_mut(&mut self, job: SyncJob) -> &mut SyncJobState {
        match job {
            SyncJob::Github => &mut self.github,
            SyncJob::Weather => &mut self.weather,
        }
    }
}

/// Shared sync state handle.
pub type SharedSyncState = Arc<RwLock<SyncState>>;

/// Run `work` as `job`, refusing with 409 if the same job is already running.
///
/// The work runs on a spawned task and the state is updated from that task,
/// so the bookkeeping completes even if the caller goes away. A panic in the
/// work is recorded as a failed run.
pub async fn run_tracked<T, F>(state: &SharedSyncState, job: SyncJob, work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AppError>> + Send + 'static,
{
    {
        let mut s = state.write().await;
        if !s.job_mut(job).start(Utc::now()) {
            return Err(AppError::Conflict(format!(
                "A {} sync is already running",
                job.name()
            )));
        }
    }
    tracing::info!("Starting {} sync", job.name());

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let result = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(AppError::InternalError(format!(
                "{} sync panicked: {}",
                job.name(),
                panic_message(panic.as_ref())
            ))),
        };
        let error = result.as_ref().err().map(|e| e.to_string());
        match &error {
            Some(e) => tracing::error!("{} sync failed: {}", job.name(), e),
            None => tracing::info!("{} sync completed", job.name()),
        }
        task_state.write().await.job_mut(job).complete(Utc::now(), error);
        result
    });

    handle
        .await
        .map_err(|e| AppError::InternalError(format!("{} sync task failed: {}", job.name(), e)))?
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// ---------------------------------------------------------------------------
// GitHub sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GithubSyncSummary {
    pub repos_processed: u32,
    /// Private repositories left out by configuration
    pub repos_skipped: u32,
    pub commits_added: u32,
    pub prs_added: u32,
    /// Full names of repositories whose sync failed
    pub failed_repos: Vec<String>,
}

/// Ingest commits authored since `since` and all pull requests, for every
/// repository the token can see.
pub async fn sync_github(
    pool: PgPool,
    client: GithubClient,
    since: DateTime<Utc>,
    include_private: bool,
) -> Result<GithubSyncSummary, AppError> {
    let repos = client.list_repos().await?;
    tracing::info!("GitHub sync: {} repositories visible", repos.len());

    let mut summary = GithubSyncSummary::default();
    for repo in &repos {
        if repo.private && !include_private {
            tracing::debug!("Skipping private repository {}", repo.full_name);
            summary.repos_skipped += 1;
            continue;
        }

        match sync_repo(&pool, &client, repo, since).await {
            Ok((commits, prs)) => {
                tracing::info!(
                    "Synced {}: {} new commits, {} new pull requests",
                    repo.full_name,
                    commits,
                    prs
                );
                summary.repos_processed += 1;
                summary.commits_added += commits;
                summary.prs_added += prs;
            }
            Err(AppError::RateLimited(msg)) => {
                tracing::warn!(
                    "Stopping GitHub sync at {}, remaining repositories left for the next run: {}",
                    repo.full_name,
                    msg
                );
                summary.failed_repos.push(repo.full_name.clone());
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to sync repository {}: {}", repo.full_name, e);
                summary.failed_repos.push(repo.full_name.clone());
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(REPO_PAUSE_MS)).await;
    }

    Ok(summary)
}

/// Sync one repository, returning (commits added, pull requests added).
async fn sync_repo(
    pool: &PgPool,
    client: &GithubClient,
    repo: &GithubRepo,
    since: DateTime<Utc>,
) -> Result<(u32, u32), AppError> {
    let owner = repo.owner.login.as_str();
    let name = repo.name.as_str();

    let known = queries::existing_commit_shas(pool, &repo.full_name).await?;
    let listed = client.list_commits(owner, name, since).await?;
    let fresh = new_commits(listed, &known);

    // The list endpoint carries no line counts; fetch each commit for them.
    // Nothing is stored until every detail is resolved, so a rate limit leaves
    // the repository untouched for the next run.
    let fetched: Vec<(GithubCommit, Result<GithubCommit, AppError>)> = stream::iter(fresh)
        .map(|commit| async move {
            let detail = client.get_commit(owner, name, &commit.sha).await;
            (commit, detail)
        })
        .buffer_unordered(COMMIT_DETAIL_CONCURRENCY)
        .collect()
        .await;
    let detailed = fetched
        .into_iter()
        .map(|(commit, detail)| resolve_detail(&repo.full_name, commit, detail))
        .collect::<Result<Vec<_>, AppError>>()?;

    let mut commits_added = 0;
    for (commit, detail) in &detailed {
        let Some(params) = commit_params(&repo.full_name, commit, detail.as_ref()) else {
            tracing::warn!("Commit {} has no author date, skipping", commit.sha);
            continue;
        };
        if queries::insert_commit(pool, &params).await? {
            commits_added += 1;
        }
    }

    let mut prs_added = 0;
    for pr in client.list_pull_requests(owner, name).await? {
        let Some(params) = pull_request_params(&repo.full_name, &pr) else {
            continue;
        };
        if queries::insert_pull_request(pool, &params).await? {
            prs_added += 1;
        }
    }

    Ok((commits_added, prs_added))
}

/// Keep a commit without line counts when its detail fetch failed, unless the
/// failure was a rate limit: those commits must be fetched again later.
fn resolve_detail(
    repo_full_name: &str,
    commit: GithubCommit,
    detail: Result<GithubCommit, AppError>,
) -> Result<(GithubCommit, Option<GithubCommit>), AppError> {
    match detail {
        Ok(detail) => Ok((commit, Some(detail))),
        Err(e @ AppError::RateLimited(_)) => Err(e),
        Err(e) => {
            tracing::warn!(
                "No stats for commit {} in {}, storing zeros: {}",
                commit.sha,
                repo_full_name,
                e
            );
            Ok((commit, None))
        }
    }
}

/// Listed commits not yet stored, first occurrence of each sha.
fn new_commits(listed: Vec<GithubCommit>, known: &HashSet<String>) -> Vec<GithubCommit> {
    let mut seen = HashSet::new();
    listed
        .into_iter()
        .filter(|c| !known.contains(&c.sha) && seen.insert(c.sha.clone()))
        .collect()
}

fn to_count(v: i64) -> i32 {
    v.clamp(0, i32::MAX as i64) as i32
}

/// Build the insert row for a commit; `detail` supplies line and file counts.
fn commit_params(
    repo_full_name: &str,
    listed: &GithubCommit,
    detail: Option<&GithubCommit>,
) -> Option<InsertCommitParams> {
    let commit_date = listed.authored_at()?;
    let stats = detail.and_then(|d| d.stats.as_ref());
    let files = detail.and_then(|d| d.files.as_ref()).map_or(0, |f| f.len());
    let message = Some(listed.commit.message.trim().to_string()).filter(|m| !m.is_empty());

    Some(InsertCommitParams {
        sha: listed.sha.clone(),
        repo_name: repo_full_name.to_string(),
        author: listed.author_name(),
        commit_date,
        message,
        additions: stats.map_or(0, |s| to_count(s.additions)),
        deletions: stats.map_or(0, |s| to_count(s.deletions)),
        files_changed: to_count(files as i64),
    })
}

fn pull_request_params(repo_full_name: &str, pr: &GithubPullRequest) -> Option<InsertPullRequestParams> {
    let pr_number = i32::try_from(pr.number).ok()?;
    Some(InsertPullRequestParams {
        pr_number,
        repo_name: repo_full_name.to_string(),
        title: pr.title.clone(),
        created_at: pr.created_at,
        merged_at: pr.merged_at,
        additions: pr.additions.map_or(0, to_count),
        deletions: pr.deletions.map_or(0, to_count),
        files_changed: pr.changed_files.map_or(0, to_count),
    })
}

// ---------------------------------------------------------------------------
// Weather sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSyncSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Days returned with usable data
    pub days_fetched: u32,
    pub weather_added: u32,
    /// Days the archive has no temperature for yet
    pub days_skipped: u32,
    pub message: String,
}

/// Fetch and store weather for every day from the first to the last stored
/// commit day, in `timezone`.
pub async fn sync_weather(
    pool: PgPool,
    client: OpenMeteoClient,
    location: LocationConfig,
    timezone: String,
) -> Result<WeatherSyncSummary, AppError> {
    let Some((start, end)) = queries::commit_day_range(&pool, &timezone).await? else {
        return Ok(WeatherSyncSummary {
            message: "No commit dates found. Sync GitHub data first.".to_string(),
            ..Default::default()
        });
    };

    tracing::info!(
        "Weather sync for {} ({}, {}): {} to {}",
        location.name,
        location.latitude,
        location.longitude,
        start,
        end
    );
    let fetch = client
        .fetch_daily(location.latitude, location.longitude, start, end, &timezone)
        .await?;

    let mut weather_added = 0;
    for day in &fetch.days {
        if queries::insert_weather(&pool, &weather_params(&location.name, day)).await? {
            weather_added += 1;
        }
    }

    let days_fetched = fetch.days.len() as u32;
    Ok(WeatherSyncSummary {
        start_date: Some(start),
        end_date: Some(end),
        days_fetched,
        weather_added,
        days_skipped: fetch.skipped as u32,
        message: format!(
            "Stored {} new of {} fetched days for {}",
            weather_added, days_fetched, location.name
        ),
    })
}

fn weather_params(location: &str, day: &DailyWeather) -> InsertWeatherParams {
    InsertWeatherParams {
        date: day.date,
        location: location.to_string(),
        temp_min: opt_f64_to_decimal(day.temp_min_f, TEMPERATURE_DP),
        temp_max: opt_f64_to_decimal(day.temp_max_f, TEMPERATURE_DP),
        temp_avg: Some(f64_to_decimal(day.temp_avg_f, TEMPERATURE_DP)),
        precipitation: f64_to_decimal(day.precipitation_in, PRECIPITATION_DP),
        humidity: day.humidity_pct,
        cloud_cover: day.cloud_cover_pct,
        daylight_hours: opt_f64_to_decimal(day.daylight_hours, DAYLIGHT_DP),
    }
}
