use chrono::{DateTime, Utc};
use jobscout_core::error::AppError;
use jobscout_core::identifier::JobId;
use jobscout_core::models::{Company, CompanyLookup, PostingRecord, StoredPosting};
use jobscout_core::traits::BackendGateway;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::GatewayConfig;

/// HTTP client of the jobs/companies backend.
///
/// Every request carries the `X-API-Key` header and the configured timeout.
/// Nothing is retried here: a refused connection surfaces as
/// [`AppError::GatewayUnavailable`], a conflict on create as
/// [`AppError::AlreadyExists`] (postings) or a re-fetch (companies).
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("jobscout/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn url_with_query(&self, path: &str, pairs: &[(&str, &str)]) -> Result<String, AppError> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| AppError::ConfigError(format!("Invalid backend URL: {e}")))?;
        url.query_pairs_mut().extend_pairs(pairs);
        Ok(url.into())
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).header("X-API-Key", &self.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .header("X-API-Key", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, AppError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::GatewayUnavailable(format!("Connection to {} failed: {e}", self.base_url))
            } else {
                AppError::NetworkError(format!("Request to {path} failed: {e}"))
            }
        })
    }

    async fn json<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
        path: &str,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, path));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Invalid response body for {path}: {e}")))
    }
}

fn status_error(status: StatusCode, path: &str) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::ConfigError(format!("API key rejected (HTTP {}) for {path}", status.as_u16()))
        }
        _ => AppError::HttpError(format!("HTTP {} for {path}", status.as_u16())),
    }
}

// ---- Wire types ----

#[derive(Serialize)]
struct NewCompany<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Deserialize)]
struct JobIdsResponse {
    linkedin_job_ids: Vec<u64>,
}

#[derive(Deserialize)]
struct CompanyNamesResponse {
    company_names: Vec<String>,
}

/// Body of `POST /jobs`.
#[derive(Debug, Serialize)]
struct NewPosting<'a> {
    linkedin_job_id: u64,
    title: &'a str,
    company_id: i64,
    location: &'a str,
    location_raw: &'a str,
    posted_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    applicants: Option<u32>,
    description: &'a str,
    apply_url: &'a str,
    work_type: &'a str,
    skills: Vec<&'a str>,
    scraped_at: DateTime<Utc>,
    needs_rescrape: bool,
}

impl<'a> NewPosting<'a> {
    fn from_record(record: &'a PostingRecord, company_id: i64) -> Result<Self, AppError> {
        let linkedin_job_id = record.job_id.as_u64().ok_or_else(|| {
            AppError::Generic(format!("Job id {} does not fit the backend", record.job_id))
        })?;
        Ok(Self {
            linkedin_job_id,
            title: &record.title,
            company_id,
            location: &record.location,
            location_raw: &record.location_raw,
            posted_date: record.posted_at,
            applicants: record.applicants,
            description: &record.description,
            apply_url: &record.apply_url,
            work_type: record.work_type.as_str(),
            skills: record.skills.iter().map(String::as_str).collect(),
            scraped_at: record.captured_at,
            needs_rescrape: record.needs_rescrape(),
        })
    }
}

impl BackendGateway for HttpGateway {
    async fn company_exists(&self, name: &str) -> Result<CompanyLookup, AppError> {
        let path = "/companies/exists";
        let url = self.url_with_query(path, &[("name", name)])?;
        let response = self.send(self.get(&url), path).await?;
        self.json(response, path).await
    }

    async fn create_company(&self, name: &str) -> Result<Company, AppError> {
        let path = "/companies";
        let response = self
            .send(self.post(path).json(&NewCompany { name }), path)
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(%name, "Company already exists, fetching it");
            let lookup = self.company_exists(name).await?;
            return lookup.company.ok_or_else(|| {
                AppError::HttpError(format!("Company '{name}' conflicts but cannot be found"))
            });
        }
        self.json(response, path).await
    }

    async fn posting_exists(&self, id: &JobId) -> Result<bool, AppError> {
        let path = "/jobs/exists";
        let url = self.url_with_query(path, &[("linkedin_job_id", id.as_str())])?;
        let response = self.send(self.get(&url), path).await?;
        let body: ExistsResponse = self.json(response, path).await?;
        Ok(body.exists)
    }

    async fn create_posting(
        &self,
        record: &PostingRecord,
        company_id: i64,
    ) -> Result<StoredPosting, AppError> {
        let path = "/jobs";
        let body = NewPosting::from_record(record, company_id)?;
        let response = self.send(self.post(path).json(&body), path).await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(AppError::AlreadyExists(format!("posting {}", record.job_id)));
        }
        self.json(response, path).await
    }

    async fn list_all_posting_ids(&self) -> Result<Vec<JobId>, AppError> {
        let path = "/jobs/ids";
        let response = self.send(self.get(&self.url(path)), path).await?;
        let body: JobIdsResponse = self.json(response, path).await?;
        Ok(body.linkedin_job_ids.into_iter().map(JobId::from).collect())
    }

    async fn list_all_company_names(&self) -> Result<Vec<String>, AppError> {
        let path = "/companies/names";
        let response = self.send(self.get(&self.url(path)), path).await?;
        let body: CompanyNamesResponse = self.json(response, path).await?;
        Ok(body.company_names)
    }
}
