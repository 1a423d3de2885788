//! reqwest-backed transport for the review backend's `/api` endpoints.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::redirect::Policy;
use reviewsync_core::RawResponse;
use tracing::{debug, info};

use crate::SyncError;
use crate::config::SyncConfig;
use crate::transport::{ApiRequest, Method, RequestBody, Transport, with_dry_run};

/// HTTP transport with bearer auth, a fixed timeout, and redirects captured
/// rather than followed.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
    dry_run: bool,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            dry_run: config.dry_run,
        })
    }

    /// Absolute URL for `path`, carrying the dry-run marker in simulation mode.
    fn url_for(&self, path: &str) -> String {
        let path = if self.dry_run {
            with_dry_run(path)
        } else {
            path.to_string()
        };
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, SyncError> {
        let url = self.url_for(&request.path);
        debug!(method = request.method.as_str(), url = %url, params = request.form_len(), "sending request");

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .header(AUTHORIZATION, format!("bearer {}", self.token));

        let builder = match &request.body {
            RequestBody::Empty if request.method == Method::Post => {
                builder.form(&Vec::<(String, String)>::new())
            }
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => builder.header(ACCEPT, "application/json").form(pairs),
            RequestBody::Json(value) => builder.json(value),
        };

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.text().await?;

        info!(method = request.method.as_str(), path = %request.path, status, "backend replied");
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
