use std::time::Duration;

use monitor_core::{CrawlConfig, ExtractedRecord, FlowRecord, PageRecord};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::{
    ControlError, ControlFailure, CrawlSessionSnapshot, DownloadedFile, ExportRequest,
    ExportedFiles, SessionId,
};

#[derive(Debug, Clone)]
pub struct ControlSettings {
    /// Root of the control API, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Longest silence tolerated on the event stream before it counts as lost.
    pub stream_idle_timeout: Duration,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

impl ControlSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ControlError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|err| ControlError::new(ControlFailure::InvalidUrl, err.to_string()))
    }
}

/// Request/response interface of the remote crawler.
#[async_trait::async_trait]
pub trait ControlApi: Send + Sync {
    async fn start(&self, config: &CrawlConfig) -> Result<CrawlSessionSnapshot, ControlError>;
    async fn pause(&self, session_id: &SessionId) -> Result<(), ControlError>;
    async fn resume(&self, session_id: &SessionId) -> Result<(), ControlError>;
    async fn stop(&self, session_id: &SessionId) -> Result<(), ControlError>;
    async fn status(&self, session_id: &SessionId) -> Result<CrawlSessionSnapshot, ControlError>;
    async fn pages(&self, session_id: &SessionId) -> Result<Vec<PageRecord>, ControlError>;
    async fn flows(&self, session_id: &SessionId) -> Result<Vec<FlowRecord>, ControlError>;
    async fn extracted_data(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ExtractedRecord>, ControlError>;
    async fn downloads(&self, session_id: &SessionId) -> Result<Vec<DownloadedFile>, ControlError>;
    async fn export(
        &self,
        session_id: &SessionId,
        request: &ExportRequest,
    ) -> Result<ExportedFiles, ControlError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestControlApi {
    settings: ControlSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportBody<'a> {
    session_id: &'a SessionId,
    #[serde(flatten)]
    request: &'a ExportRequest,
}

impl ReqwestControlApi {
    pub fn new(settings: ControlSettings) -> Result<Self, ControlError> {
        settings.endpoint("crawler")?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ControlError::new(ControlFailure::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    fn session_url(&self, session_id: &SessionId, action: &str) -> Result<Url, ControlError> {
        self.settings
            .endpoint(&format!("crawler/{}/{}", session_id, action))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ControlError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ControlError::new(
                ControlFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ControlError> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                ControlError::new(ControlFailure::Decode, err.to_string())
            } else {
                map_reqwest_error(err)
            }
        })
    }

    async fn lifecycle(&self, session_id: &SessionId, action: &str) -> Result<(), ControlError> {
        let url = self.session_url(session_id, action)?;
        monitor_logging::monitor_debug!("POST {}", url);
        self.send(self.client.post(url)).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl ControlApi for ReqwestControlApi {
    async fn start(&self, config: &CrawlConfig) -> Result<CrawlSessionSnapshot, ControlError> {
        let url = self.settings.endpoint("crawler/start")?;
        monitor_logging::monitor_debug!("POST {} start_url={}", url, config.start_url);
        self.fetch_json(self.client.post(url).json(config)).await
    }

    async fn pause(&self, session_id: &SessionId) -> Result<(), ControlError> {
        self.lifecycle(session_id, "pause").await
    }

    async fn resume(&self, session_id: &SessionId) -> Result<(), ControlError> {
        self.lifecycle(session_id, "resume").await
    }

    async fn stop(&self, session_id: &SessionId) -> Result<(), ControlError> {
        self.lifecycle(session_id, "stop").await
    }

    async fn status(&self, session_id: &SessionId) -> Result<CrawlSessionSnapshot, ControlError> {
        let url = self.session_url(session_id, "status")?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn pages(&self, session_id: &SessionId) -> Result<Vec<PageRecord>, ControlError> {
        let url = self.session_url(session_id, "pages")?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn flows(&self, session_id: &SessionId) -> Result<Vec<FlowRecord>, ControlError> {
        let url = self.session_url(session_id, "flows")?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn extracted_data(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ExtractedRecord>, ControlError> {
        let url = self.session_url(session_id, "extracted")?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn downloads(&self, session_id: &SessionId) -> Result<Vec<DownloadedFile>, ControlError> {
        let url = self.session_url(session_id, "downloads")?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn export(
        &self,
        session_id: &SessionId,
        request: &ExportRequest,
    ) -> Result<ExportedFiles, ControlError> {
        let url = self.session_url(session_id, "export")?;
        let body = ExportBody {
            session_id,
            request,
        };
        self.fetch_json(self.client.post(url).json(&body)).await
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ControlError {
    if err.is_timeout() {
        return ControlError::new(ControlFailure::Timeout, err.to_string());
    }
    ControlError::new(ControlFailure::Network, err.to_string())
}
