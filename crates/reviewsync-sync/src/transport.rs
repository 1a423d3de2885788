//! The request/response seam. One call in, one [`RawResponse`] out; no retries here.

use async_trait::async_trait;
use reviewsync_core::RawResponse;
use serde_json::Value;

use crate::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded`, pairs kept in send order.
    Form(Vec<(String, String)>),
    Json(Value),
}

/// One backend call. `path` is relative to the configured base URL and may
/// carry a query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    /// POST with an empty body.
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_form(path: impl Into<String>, pairs: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: RequestBody::Form(pairs),
        }
    }

    /// Last value of a form key, if the body is a form.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            RequestBody::Empty | RequestBody::Json(_) => None,
        }
    }

    pub fn form_len(&self) -> usize {
        match &self.body {
            RequestBody::Form(pairs) => pairs.len(),
            RequestBody::Empty | RequestBody::Json(_) => 0,
        }
    }
}

/// Performs exactly one HTTP exchange. Network failures are errors; every
/// HTTP status, including 3xx and 5xx, is a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, SyncError>;
}

/// Append the simulation marker, joining with `&` when a query string exists.
pub fn with_dry_run(path: &str) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}dry_run=1")
}

/// Backend endpoint paths.
pub mod endpoint {
    pub fn assign(paper_id: u64) -> String {
        format!("/api/assign?p={paper_id}")
    }

    pub fn accept(paper_id: u64, review_id: &str) -> String {
        format!(
            "/api/acceptreview?p={paper_id}&r={}",
            urlencoding::encode(review_id)
        )
    }

    /// Review listing for a paper, optionally filtered server-side by reviewer.
    pub fn reviews(paper_id: u64, reviewer_email: Option<&str>) -> String {
        match reviewer_email {
            Some(email) => format!("/api/review?p={paper_id}&u={}", urlencoding::encode(email)),
            None => format!("/api/review?p={paper_id}"),
        }
    }

    pub fn submit(paper_id: u64, review_id: &str) -> String {
        format!(
            "/api/review?p={paper_id}&r={}",
            urlencoding::encode(review_id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_marker_joins_existing_query() {
        assert_eq!(with_dry_run("/api/assign?p=3"), "/api/assign?p=3&dry_run=1");
        assert_eq!(with_dry_run("/api/status"), "/api/status?dry_run=1");
    }

    #[test]
    fn reviewer_filter_is_url_encoded() {
        assert_eq!(
            endpoint::reviews(316, Some("r+1@x.edu")),
            "/api/review?p=316&u=r%2B1%40x.edu"
        );
        assert_eq!(endpoint::reviews(316, None), "/api/review?p=316");
        assert_eq!(endpoint::accept(316, "812"), "/api/acceptreview?p=316&r=812");
    }

    #[test]
    fn form_value_returns_last_occurrence() {
        let req = ApiRequest::post_form(
            "/api/review",
            vec![
                ("ready".into(), "1".into()),
                ("ready".into(), "0".into()),
            ],
        );
        assert_eq!(req.form_value("ready"), Some("0"));
        assert_eq!(req.form_value("missing"), None);
        assert_eq!(ApiRequest::get("/x").form_value("ready"), None);
    }
}
