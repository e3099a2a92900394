//! GitHub REST API client.
//!
//! Lists the authenticated user's repositories, their commits and pull
//! requests, and per-commit line statistics.
//! See: https://docs.github.com/en/rest

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::AppError;

const GITHUB_API_VERSION: &str = "2022-11-28";
const PER_PAGE: &str = "100";
/// Upper bound on followed `Link: rel="next"` pages per listing.
const MAX_PAGES: usize = 100;

/// Client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
}

// --- GitHub JSON response types ---

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    pub name: String,
    pub full_name: String,
    pub owner: GithubUser,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommit {
    pub sha: String,
    pub commit: GitCommitDetail,
    /// The linked GitHub account; null when the author email matches no account
    pub author: Option<GithubUser>,
    pub stats: Option<GithubCommitStats>,
    pub files: Option<Vec<GithubCommitFile>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommitDetail {
    pub author: Option<GitSignature>,
    pub committer: Option<GitSignature>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitSignature {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommitStats {
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)] // Only the number of files is stored
pub struct GithubCommitFile {
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubPullRequest {
    pub number: i64,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub changed_files: Option<i64>,
}

impl GithubCommit {
    /// Account login, falling back to the git author name.
    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(|u| u.login.clone())
            .or_else(|| self.commit.author.as_ref().and_then(|a| a.name.clone()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Author date, falling back to the committer date.
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.commit
            .author
            .as_ref()
            .and_then(|a| a.date)
            .or_else(|| self.commit.committer.as_ref().and_then(|c| c.date))
    }
}

impl GithubClient {
    pub fn new(base_url: &str, token: &str, user_agent: &str) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| AppError::InternalError(format!("Invalid GitHub token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// All repositories the authenticated user can access.
    pub async fn list_repos(&self) -> Result<Vec<GithubRepo>, AppError> {
        self.get_paginated("/user/repos", &[]).await
    }

    /// Commits on the default branch since `since`.
    pub async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<GithubCommit>, AppError> {
        let path = format!("/repos/{}/{}/commits", owner, repo);
        self.get_paginated(&path, &[("since", since.to_rfc3339())])
            .await
    }

    /// A single commit including `stats` and `files`.
    pub async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<GithubCommit, AppError> {
        let url = format!("{}/repos/{}/{}/commits/{}", self.base_url, owner, repo, sha);
        let response = self.client.get(&url).send().await?;
        let response = check_status(response)?;
        response
            .json()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("GitHub JSON parse error: {}", e)))
    }

    /// Pull requests in any state.
    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<GithubPullRequest>, AppError> {
        let path = format!("/repos/{}/{}/pulls", owner, repo);
        self.get_paginated(&path, &[("state", "all".to_string())])
            .await
    }

    /// GET a list endpoint, following `Link: rel="next"` until exhausted.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let mut items = Vec::new();

        let first = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .query(&[("per_page", PER_PAGE)])
            .send()
            .await?;
        let mut response = check_status(first)?;

        for page in 1..=MAX_PAGES {
            let next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_page_url);

            let batch: Vec<T> = response.json().await.map_err(|e| {
                AppError::ExternalServiceError(format!("GitHub JSON parse error: {}", e))
            })?;
            items.extend(batch);

            let Some(next) = next else {
                break;
            };
            if page == MAX_PAGES {
                tracing::warn!("GitHub listing {} truncated after {} pages", path, MAX_PAGES);
                break;
            }
            response = check_status(self.client.get(&next).send().await?)?;
        }

        Ok(items)
    }
}

/// Map non-success responses to errors, recognising an exhausted rate limit.
fn check_status(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    let rate_limited = (status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS)
        && header("x-ratelimit-remaining").as_deref() == Some("0");
    if rate_limited {
        let resets_at = header("x-ratelimit-reset")
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "an unknown time".to_string());
        return Err(AppError::RateLimited(format!(
            "GitHub rate limit exhausted; resets at {}",
            resets_at
        )));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(AppError::Unauthorized(
            "GitHub rejected the configured token".to_string(),
        ));
    }

    Err(AppError::ExternalServiceError(format!(
        "GitHub returned HTTP {} for {}",
        status,
        response.url().path()
    )))
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
pub fn next_page_url(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(|t| t.to_string())
    })
}
