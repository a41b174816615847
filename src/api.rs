use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::Job;

const JOB_CLASS_PATH: &str = "classes/JobPosting";
const SEARCH_FUNCTION_PATH: &str = "functions/elastic-search";

// --- Source trait ---

/// Remote operations the job list depends on.
///
/// A non-success response is not an error here: it collapses to "nothing"
/// (empty list or `None`). Errors are transport or decoding failures.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Job>>;

    /// Entries may be `None` when the index references postings that no longer exist.
    async fn search(&self, query: &str) -> Result<Vec<Option<Job>>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Job>>;
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    index: &'a str,
    query: &'a str,
    raw: bool,
}

/// Collection envelope returned by `classes/*` queries.
#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    results: Vec<T>,
}

/// Envelope returned by cloud functions.
#[derive(Debug, Deserialize)]
struct FunctionResponse<T> {
    result: T,
}

// --- HTTP implementation ---

#[derive(Debug)]
pub struct HttpJobSource {
    base_url: String,
    application_id: String,
    rest_api_key: Option<String>,
    search_index: String,
    list_limit: u32,
    client: reqwest::Client,
}

impl HttpJobSource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: config.api_url.clone(),
            application_id: config.application_id.clone(),
            rest_api_key: config.rest_api_key.clone(),
            search_index: config.search_index.clone(),
            list_limit: config.list_limit,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn list_url(&self) -> String {
        format!("{}?limit={}", self.endpoint(JOB_CLASS_PATH), self.list_limit)
    }

    /// The id is percent-encoded as a single path segment.
    fn job_url(&self, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint(JOB_CLASS_PATH))
            .with_context(|| format!("Invalid API URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API URL cannot take a path: {}", self.base_url))?
            .push(id);
        Ok(url)
    }

    fn with_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("X-Parse-Application-Id", &self.application_id);
        match &self.rest_api_key {
            Some(key) => request.header("X-Parse-REST-API-Key", key),
            None => request,
        }
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn list_all(&self) -> Result<Vec<Job>> {
        let url = self.list_url();
        let response = self
            .with_headers(self.client.get(&url))
            .send()
            .await
            .context("Failed to send job list request")?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), %url, "job list request unsuccessful");
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .context("Failed to read job list response")?;
        decode_job_list(&body)
    }

    async fn search(&self, query: &str) -> Result<Vec<Option<Job>>> {
        let request = SearchRequest {
            index: &self.search_index,
            query,
            raw: false,
        };
        let response = self
            .with_headers(self.client.post(self.endpoint(SEARCH_FUNCTION_PATH)))
            .json(&request)
            .send()
            .await
            .context("Failed to send search request")?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), query, "search request unsuccessful");
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .context("Failed to read search response")?;
        decode_search_results(&body)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Job>> {
        let response = self
            .with_headers(self.client.get(self.job_url(id)?))
            .send()
            .await
            .with_context(|| format!("Failed to send request for job {}", id))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                tracing::debug!(id, "job not found");
                return Ok(None);
            }
            status => {
                tracing::warn!(%status, id, "job request unsuccessful");
                return Ok(None);
            }
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response for job {}", id))?;
        decode_job(&body).map(Some)
    }
}

fn decode_job_list(body: &str) -> Result<Vec<Job>> {
    let parsed: QueryResponse<Job> =
        serde_json::from_str(body).context("Failed to parse job list response")?;
    Ok(parsed.results)
}

fn decode_search_results(body: &str) -> Result<Vec<Option<Job>>> {
    let parsed: FunctionResponse<Option<Vec<Option<Job>>>> =
        serde_json::from_str(body).context("Failed to parse search response")?;
    Ok(parsed.result.unwrap_or_default())
}

fn decode_job(body: &str) -> Result<Job> {
    serde_json::from_str(body).context("Failed to parse job response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FileConfig, Overrides};
    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn source_for(api_url: &str) -> HttpJobSource {
        let file = FileConfig {
            api_url: Some(api_url.to_string()),
            application_id: Some("app-id".to_string()),
            list_limit: Some(250),
            ..Default::default()
        };
        let config = Config::resolve(Some(file), |_| None, Overrides::default()).unwrap();
        HttpJobSource::new(&config).unwrap()
    }

    fn test_source() -> HttpJobSource {
        source_for("https://parse.example.org/parse")
    }

    // --- Local Parse stand-in; every route answers with the configured status ---

    async fn stub_list(State(status): State<StatusCode>, headers: HeaderMap) -> (StatusCode, String) {
        if headers.get("x-parse-application-id").is_none() {
            return (StatusCode::UNAUTHORIZED, String::new());
        }
        let body = json!({"results": [{"objectId": "a", "title": "One"}]});
        (status, body.to_string())
    }

    async fn stub_search(State(status): State<StatusCode>, Json(request): Json<Value>) -> (StatusCode, String) {
        let body = json!({"result": [null, {"title": request["query"], "sourceId": request["index"]}]});
        (status, body.to_string())
    }

    async fn stub_get(State(status): State<StatusCode>, Path(id): Path<String>) -> (StatusCode, String) {
        if id == "missing" {
            let body = json!({"code": 101, "error": "Object not found."});
            return (StatusCode::NOT_FOUND, body.to_string());
        }
        (status, json!({"objectId": id}).to_string())
    }

    async fn serve_stub(status: StatusCode) -> HttpJobSource {
        let app = Router::new()
            .route("/parse/classes/JobPosting", get(stub_list))
            .route("/parse/classes/JobPosting/:id", get(stub_get))
            .route("/parse/functions/elastic-search", post(stub_search))
            .with_state(status);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        source_for(&format!("http://{}/parse", addr))
    }

    #[tokio::test]
    async fn test_success_responses_are_decoded() {
        let source = serve_stub(StatusCode::OK).await;

        let jobs = source.list_all().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title.as_deref(), Some("One"));

        let results = source.search("developer").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_none());
        let hit = results[1].as_ref().unwrap();
        assert_eq!(hit.title.as_deref(), Some("developer"));
        assert_eq!(hit.source_id.as_deref(), Some("job_posting"));

        let job = source.get_by_id("xWMyZ4YEGZ").await.unwrap().unwrap();
        assert_eq!(job.id.as_deref(), Some("xWMyZ4YEGZ"));
    }

    #[tokio::test]
    async fn test_get_by_id_sends_id_as_one_segment() {
        let source = serve_stub(StatusCode::OK).await;
        let job = source.get_by_id("a/b?c#d").await.unwrap().unwrap();
        assert_eq!(job.id.as_deref(), Some("a/b?c#d"));
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_is_none() {
        let source = serve_stub(StatusCode::OK).await;
        assert!(source.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsuccessful_status_collapses_to_nothing() {
        let source = serve_stub(StatusCode::SERVICE_UNAVAILABLE).await;

        assert!(source.list_all().await.unwrap().is_empty());
        assert!(source.search("developer").await.unwrap().is_empty());
        assert!(source.get_by_id("xWMyZ4YEGZ").await.unwrap().is_none());
        assert!(source.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = source_for(&format!("http://{}/parse", addr));
        assert!(source.list_all().await.is_err());
        assert!(source.search("developer").await.is_err());
        assert!(source.get_by_id("xWMyZ4YEGZ").await.is_err());
    }

    #[test]
    fn test_job_url_escapes_id() {
        let source = test_source();
        assert_eq!(
            source.job_url("a/b?c#d").unwrap().as_str(),
            "https://parse.example.org/parse/classes/JobPosting/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn test_urls() {
        let source = test_source();
        assert_eq!(
            source.list_url(),
            "https://parse.example.org/parse/classes/JobPosting?limit=250"
        );
        assert_eq!(
            source.job_url("xWMyZ4YEGZ").unwrap().as_str(),
            "https://parse.example.org/parse/classes/JobPosting/xWMyZ4YEGZ"
        );
        assert_eq!(
            source.endpoint(SEARCH_FUNCTION_PATH),
            "https://parse.example.org/parse/functions/elastic-search"
        );
    }

    #[test]
    fn test_search_request_body() {
        let request = SearchRequest {
            index: "job_posting",
            query: "developer",
            raw: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"index": "job_posting", "query": "developer", "raw": false})
        );
    }

    #[test]
    fn test_decode_job_list() {
        let body = r#"{"results": [{"objectId": "a", "title": "One"}, {"objectId": "b"}]}"#;
        let jobs = decode_job_list(body).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title.as_deref(), Some("One"));
        assert_eq!(jobs[1].id.as_deref(), Some("b"));

        assert!(decode_job_list(r#"{"error": "unauthorized"}"#).is_err());
        assert!(decode_job_list("<html>").is_err());
    }

    #[test]
    fn test_decode_search_results_keeps_nulls() {
        let body = r#"{"result": [null, {"title": "Developer A"}, null]}"#;
        let results = decode_search_results(body).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_none());
        assert_eq!(
            results[1].as_ref().and_then(|j| j.title.as_deref()),
            Some("Developer A")
        );

        assert!(decode_search_results(r#"{"result": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_decode_job() {
        let job = decode_job(r#"{"objectId": "z", "url": "https://x"}"#).unwrap();
        assert_eq!(job.id.as_deref(), Some("z"));
        assert!(decode_job("[]").is_err());
    }
}
