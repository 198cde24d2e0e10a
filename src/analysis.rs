//! External document-analysis service abstraction.
//!
//! The orchestrator only depends on the [`DocumentAnalyzer`] trait, so tests
//! substitute fakes and the binary picks a backend from configuration:
//!
//! - **[`DisabledAnalyzer`]**: always fails; used when no provider is configured.
//! - **[`LocalPdfAnalyzer`]**: extracts page text in-process with `pdf-extract`.
//! - **[`AzureLayoutAnalyzer`]**: submits the document to an Azure Document
//!   Intelligence layout model and polls for the result.
//!
//! Every call is bounded by the configured timeout. There is no retry here;
//! a failed call costs the caller one page.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{AnalysisConfig, ANALYSIS_KEY_ENV};

/// Failure of one analysis call.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Network trouble, rate limiting, or a server-side error.
    #[error("transient analysis failure: {0}")]
    Transient(String),
    /// The service rejected the document or returned something unusable.
    #[error("analysis failed: {0}")]
    Permanent(String),
    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),
    #[error("document analysis is disabled")]
    Disabled,
}

impl AnalysisError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Transient(_) | AnalysisError::Timeout(_))
    }
}

/// Text of one page as segmented by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzedPage {
    pub page_number: u32,
    pub text: String,
}

/// Structured result of analysing one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisOutput {
    /// Full text content in reading order.
    pub content: String,
    /// Per-page text, when the service segments pages.
    pub pages: Vec<AnalyzedPage>,
}

impl AnalysisOutput {
    /// Build an output from per-page text; `content` joins the pages.
    pub fn from_pages(pages: Vec<AnalyzedPage>) -> Self {
        let content = pages
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { content, pages }
    }
}

#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<AnalysisOutput, AnalysisError>;
}

/// Instantiate the backend named by `analysis.provider`.
pub fn create_analyzer(config: &AnalysisConfig) -> anyhow::Result<Box<dyn DocumentAnalyzer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledAnalyzer)),
        "local" => Ok(Box::new(LocalPdfAnalyzer::new(Duration::from_secs(
            config.timeout_secs,
        )))),
        "azure" => Ok(Box::new(AzureLayoutAnalyzer::from_config(config)?)),
        other => anyhow::bail!("Unknown analysis provider: {}", other),
    }
}

// ============ Disabled ============

pub struct DisabledAnalyzer;

#[async_trait]
impl DocumentAnalyzer for DisabledAnalyzer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn analyze(&self, _: &[u8], _: &str) -> Result<AnalysisOutput, AnalysisError> {
        Err(AnalysisError::Disabled)
    }
}

// ============ Local (pdf-extract) ============

/// In-process text extraction. Runs on the blocking pool; a panic inside
/// the PDF parser is reported as a permanent failure.
pub struct LocalPdfAnalyzer {
    timeout: Duration,
}

impl LocalPdfAnalyzer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DocumentAnalyzer for LocalPdfAnalyzer {
    fn name(&self) -> &str {
        "local"
    }

    async fn analyze(
        &self,
        document: &[u8],
        _file_name: &str,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let bytes = document.to_vec();
        let task = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        });

        let pages = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => return Err(AnalysisError::Timeout(self.timeout)),
            Ok(Err(join)) => {
                return Err(AnalysisError::Permanent(format!(
                    "PDF extraction aborted: {}",
                    join
                )))
            }
            Ok(Ok(Err(e))) => return Err(AnalysisError::Permanent(e.to_string())),
            Ok(Ok(Ok(pages))) => pages,
        };

        Ok(AnalysisOutput::from_pages(
            pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| AnalyzedPage {
                    page_number: i as u32 + 1,
                    text,
                })
                .collect(),
        ))
    }
}

// ============ Azure Document Intelligence ============

/// Layout analysis over the Azure Document Intelligence REST API.
///
/// `POST {endpoint}/formrecognizer/documentModels/{model}:analyze` returns
/// `202` with an `Operation-Location` header; that URL is polled until the
/// operation reports `succeeded` or `failed`.
pub struct AzureLayoutAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_version: String,
    api_key: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl AzureLayoutAnalyzer {
    pub fn from_config(config: &AnalysisConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("analysis.endpoint required"))?;
        let api_key = std::env::var(ANALYSIS_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{} not set", ANALYSIS_KEY_ENV))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model, self.api_version
        )
    }

    async fn submit(&self, document: &[u8]) -> Result<String, AnalysisError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/pdf")
            .body(document.to_vec())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AnalysisError::Permanent("response has no Operation-Location header".to_string())
            })
    }

    async fn poll(&self, operation_url: &str) -> Result<serde_json::Value, AnalysisError> {
        loop {
            let response = self
                .client
                .get(operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.api_key)
                .send()
                .await
                .map_err(request_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, &body));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| AnalysisError::Permanent(format!("invalid poll response: {}", e)))?;

            match json.get("status").and_then(|s| s.as_str()) {
                Some("succeeded") => return Ok(json),
                Some("failed") => {
                    return Err(AnalysisError::Permanent(format!(
                        "operation failed: {}",
                        json.get("error").cloned().unwrap_or_default()
                    )))
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for AzureLayoutAnalyzer {
    fn name(&self) -> &str {
        "azure"
    }

    async fn analyze(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let run = async {
            let operation = self.submit(document).await?;
            tracing::debug!(file = file_name, "analysis submitted; polling");
            let json = self.poll(&operation).await?;
            parse_layout_response(&json)
        };
        tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| AnalysisError::Timeout(self.timeout))?
    }
}

fn request_error(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        AnalysisError::Transient(e.to_string())
    } else {
        AnalysisError::Permanent(e.to_string())
    }
}

/// 429 and 5xx are transient; other client errors are not.
fn status_error(status: reqwest::StatusCode, body: &str) -> AnalysisError {
    let message = format!("HTTP {}: {}", status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        AnalysisError::Transient(message)
    } else {
        AnalysisError::Permanent(message)
    }
}

/// Extract `analyzeResult.content` and per-page line text.
fn parse_layout_response(json: &serde_json::Value) -> Result<AnalysisOutput, AnalysisError> {
    let result = json
        .get("analyzeResult")
        .ok_or_else(|| AnalysisError::Permanent("missing analyzeResult".to_string()))?;

    let content = result
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let pages = result
        .get("pages")
        .and_then(|p| p.as_array())
        .map(|pages| {
            pages
                .iter()
                .enumerate()
                .map(|(i, page)| {
                    let page_number = page
                        .get("pageNumber")
                        .and_then(|n| n.as_u64())
                        .map(|n| n as u32)
                        .unwrap_or(i as u32 + 1);
                    let text = page
                        .get("lines")
                        .and_then(|l| l.as_array())
                        .map(|lines| {
                            lines
                                .iter()
                                .filter_map(|line| line.get("content").and_then(|c| c.as_str()))
                                .collect::<Vec<_>>()
                                .join("\n")
                        })
                        .unwrap_or_default();
                    AnalyzedPage { page_number, text }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(AnalysisOutput { content, pages })
}
