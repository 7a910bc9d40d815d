use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, Url};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::entities::DocumentRecord;

use super::types::MacroRender;

#[derive(Debug, Error)]
pub enum MacroServiceError {
    #[error("macro service unavailable: {0}")]
    Unavailable(String),
    #[error("macro service returned an invalid payload: {0}")]
    InvalidPayload(String),
    #[error("macro service is disabled")]
    Disabled,
}

/// Contract the pipeline requires from the remote macro-expansion backend.
#[async_trait]
pub trait MacroService: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Expand the document's source into presentable HTML.
    ///
    /// `cache_control` is forwarded as the cache hint (`no-cache` forces the
    /// service to discard its own cached expansion); `base_url` lets the
    /// service absolutify intra-wiki links.
    async fn render(
        &self,
        document: &DocumentRecord,
        cache_control: Option<&str>,
        base_url: &str,
    ) -> Result<MacroRender, MacroServiceError>;
}

#[derive(Serialize)]
struct RenderRequestBody<'a> {
    html: &'a str,
    base_url: &'a str,
}

/// HTTP client for the expansion service. Every call is bounded by the
/// configured timeout; a timeout or connection failure surfaces as
/// `Unavailable` and is handled by the pipeline's raw fallback.
pub struct HttpMacroService {
    client: Client,
    endpoint: Url,
}

impl HttpMacroService {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, MacroServiceError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| MacroServiceError::Unavailable(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn user_agent() -> &'static str {
        concat!("foglio/", env!("CARGO_PKG_VERSION"))
    }

    fn document_url(&self, document: &DocumentRecord) -> Result<Url, MacroServiceError> {
        self.endpoint
            .join(&format!("docs/{}/{}", document.locale, document.slug))
            .map_err(|err| MacroServiceError::InvalidPayload(err.to_string()))
    }
}

#[async_trait]
impl MacroService for HttpMacroService {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn render(
        &self,
        document: &DocumentRecord,
        cache_control: Option<&str>,
        base_url: &str,
    ) -> Result<MacroRender, MacroServiceError> {
        let url = self.document_url(document)?;
        let body = RenderRequestBody {
            html: &document.html,
            base_url,
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(hint) = cache_control {
            request = request.header(reqwest::header::CACHE_CONTROL, hint);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|err| MacroServiceError::Unavailable(err.to_string()))?;
        histogram!("foglio_macro_render_ms").record(started.elapsed().as_millis() as f64);

        let status = response.status();
        if !status.is_success() {
            return Err(MacroServiceError::Unavailable(format!(
                "expansion request returned status {status}"
            )));
        }

        response
            .json::<MacroRender>()
            .await
            .map_err(|err| MacroServiceError::InvalidPayload(err.to_string()))
    }
}

/// Stand-in used when no expansion endpoint is configured. The pipeline then
/// serves stored renderings or raw source only.
pub struct DisabledMacroService;

#[async_trait]
impl MacroService for DisabledMacroService {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn render(
        &self,
        _document: &DocumentRecord,
        _cache_control: Option<&str>,
        _base_url: &str,
    ) -> Result<MacroRender, MacroServiceError> {
        Err(MacroServiceError::Disabled)
    }
}
