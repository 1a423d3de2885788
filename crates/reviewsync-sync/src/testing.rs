//! In-memory stand-in for the review backend.
//!
//! Models just enough of the real thing to exercise the stages: assignment
//! creates reviews, reads can lag behind writes, submits persist according to
//! [`Persist`], and every request is captured for inspection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reviewsync_core::RawResponse;
use serde_json::{Map, Value, json};

use crate::SyncError;
use crate::pace::RecordingSleeper;
use crate::remote::Remote;
use crate::transport::{ApiRequest, Method, RequestBody, Transport};

/// Form keys of a submit that are not review fields.
const CONTROL_KEYS: &[&str] = &[
    "p",
    "r",
    "paperId",
    "reviewerEmail",
    "ready",
    "override",
    "update",
    "submitreview",
    "savedraft",
    "if_vtag_match",
    "edit_version",
    "round",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Persist {
    /// Any submit or draft save stores its fields.
    #[default]
    Always,
    /// A combined submit is accepted but its fields are dropped unless a
    /// draft was saved first.
    DraftOnly,
    Never,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredReview {
    pub rid: u64,
    pub pid: u64,
    pub email: String,
    pub status: u8,
    pub fields: BTreeMap<String, Value>,
    pub edit_version: u64,
    pub vtag: u64,
    /// Reads that will still miss this review.
    pub hidden_reads: u32,
}

#[derive(Debug, Default)]
pub(crate) struct BackendState {
    pub reviews: Vec<StoredReview>,
    pub next_rid: u64,
    pub hide_new_reviews_for: u32,
    pub targeted_lookup_empty: bool,
    pub persist: Persist,
    pub accept_ignored: bool,
    pub assign_reply: Option<RawResponse>,
    pub accept_reply: Option<RawResponse>,
    pub submit_reply: Option<RawResponse>,
    pub draft_reply: Option<RawResponse>,
    /// Requests whose path starts with this fail at the network level.
    pub unreachable_prefix: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    state: Mutex<BackendState>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState {
                next_rid: 800,
                ..BackendState::default()
            }),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn configure(&self, f: impl FnOnce(&mut BackendState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn seed(&self, pid: u64, email: &str, status: u8, edit_version: u64) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_rid += 1;
        let rid = state.next_rid;
        state.reviews.push(StoredReview {
            rid,
            pid,
            email: email.to_string(),
            status,
            fields: BTreeMap::new(),
            edit_version,
            vtag: 1_700_000_000,
            hidden_reads: 0,
        });
        rid
    }

    pub fn review(&self, pid: u64, email: &str) -> Option<StoredReview> {
        self.state
            .lock()
            .unwrap()
            .reviews
            .iter()
            .find(|r| r.pid == pid && r.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Captured POSTs whose path starts with `prefix`.
    pub fn posts_to(&self, prefix: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Post && r.path.starts_with(prefix))
            .collect()
    }

    fn handle(&self, request: &ApiRequest) -> Result<RawResponse, SyncError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if let Some(prefix) = &state.unreachable_prefix
            && request.path.starts_with(prefix.as_str())
        {
            return Err(SyncError::Transport("connection refused".into()));
        }

        let (path, query) = split_query(&request.path);
        let form = form_pairs(request);
        let param = |key: &str| {
            query
                .iter()
                .chain(form.iter())
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let response = match (request.method, path) {
            (Method::Post, "/api/assign") => {
                let batch: Vec<Value> = param("assignments")
                    .and_then(|a| serde_json::from_str(&a).ok())
                    .unwrap_or_default();
                for item in batch {
                    let pid = item["paper"].as_u64().unwrap_or_default();
                    let email = item["email"].as_str().unwrap_or_default().to_string();
                    let exists = state
                        .reviews
                        .iter()
                        .any(|r| r.pid == pid && r.email.eq_ignore_ascii_case(&email));
                    if !exists {
                        state.next_rid += 1;
                        let review = StoredReview {
                            rid: state.next_rid,
                            pid,
                            email,
                            status: 0,
                            fields: BTreeMap::new(),
                            edit_version: 0,
                            vtag: 1_700_000_000,
                            hidden_reads: state.hide_new_reviews_for,
                        };
                        state.reviews.push(review);
                    }
                }
                state.assign_reply.clone().unwrap_or_else(ok_json)
            }
            (Method::Post, "/api/acceptreview") => {
                let rid = param("r").and_then(|r| r.parse::<u64>().ok());
                let ignored = state.accept_ignored;
                match state.reviews.iter_mut().find(|r| Some(r.rid) == rid) {
                    Some(review) => {
                        if !ignored && review.status == 0 {
                            review.status = 1;
                        }
                        state.accept_reply.clone().unwrap_or_else(ok_json)
                    }
                    None => json_reply(json!({
                        "ok": false,
                        "message_list": [{"field": "r", "message": "Review not found.", "status": 2}]
                    })),
                }
            }
            (Method::Get, "/api/review") => {
                let pid = param("p").and_then(|p| p.parse::<u64>().ok());
                let filter = param("u");
                let targeted_empty = state.targeted_lookup_empty;
                let mut reviews = Vec::new();
                for review in state.reviews.iter_mut().filter(|r| Some(r.pid) == pid) {
                    if review.hidden_reads > 0 {
                        review.hidden_reads -= 1;
                        continue;
                    }
                    if let Some(email) = &filter
                        && (targeted_empty || !review.email.eq_ignore_ascii_case(email))
                    {
                        continue;
                    }
                    reviews.push(review_json(review));
                }
                json_reply(json!({"ok": true, "reviews": reviews}))
            }
            (Method::Post, "/api/review") => {
                let rid = param("r").and_then(|r| r.parse::<u64>().ok());
                let draft = param("savedraft").is_some();
                let submit = param("submitreview").is_some();
                let persist = state.persist;
                let reply = if draft {
                    state.draft_reply.clone()
                } else {
                    state.submit_reply.clone()
                };
                if let Some(review) = state.reviews.iter_mut().find(|r| Some(r.rid) == rid) {
                    let store = match persist {
                        Persist::Always => true,
                        Persist::DraftOnly => draft || (submit && !review.fields.is_empty()),
                        Persist::Never => false,
                    };
                    if store {
                        for (k, v) in form.iter().filter(|(k, _)| {
                            !CONTROL_KEYS.contains(&k.as_str()) && !k.starts_with("has_")
                        }) {
                            let value = v
                                .parse::<i64>()
                                .map(Value::from)
                                .unwrap_or_else(|_| Value::from(v.clone()));
                            review.fields.insert(read_name(k).to_string(), value);
                        }
                        review.edit_version += 1;
                        review.vtag += 1;
                        review.status = if submit { 3 } else { review.status.max(2) };
                    }
                }
                reply.unwrap_or_else(ok_json)
            }
            _ => RawResponse::new(404, "<html><body>Not Found</body></html>")
                .with_header("content-type", "text/html"),
        };
        Ok(response)
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, SyncError> {
        self.requests.lock().unwrap().push(request.clone());
        self.handle(request)
    }
}

/// A [`Remote`] over `backend` whose sleeps are recorded, not taken.
pub(crate) fn remote(backend: &Arc<FakeBackend>) -> (Remote, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::new());
    let remote = Remote::new(backend.clone(), sleeper.clone()).unwrap();
    (remote, sleeper)
}

pub(crate) fn ok_json() -> RawResponse {
    json_reply(json!({"ok": true}))
}

pub(crate) fn json_reply(value: Value) -> RawResponse {
    RawResponse::new(200, value.to_string()).with_header("content-type", "application/json")
}

pub(crate) fn html_reply(status: u16, body: &str) -> RawResponse {
    RawResponse::new(status, body).with_header("content-type", "text/html; charset=utf-8")
}

/// Reads report fields under their display abbreviations, not their form ids.
fn read_name(form_key: &str) -> &str {
    match form_key {
        "s01" => "OveMer",
        "s02" => "RevExp",
        "t01" => "PapSum",
        "t02" => "ComAut",
        other => other,
    }
}

fn review_json(review: &StoredReview) -> Value {
    let mut obj = Map::new();
    obj.insert("rid".into(), json!(review.rid));
    obj.insert("reviewer_email".into(), json!(review.email));
    obj.insert("reviewStatus".into(), json!(review.status));
    obj.insert("reviewTime".into(), json!(review.vtag));
    obj.insert("reviewEditVersion".into(), json!(review.edit_version));
    obj.insert("OveMer".into(), Value::Null);
    obj.insert("PapSum".into(), json!(""));
    for (k, v) in &review.fields {
        obj.insert(k.clone(), v.clone());
    }
    Value::Object(obj)
}

fn split_query(path: &str) -> (&str, Vec<(String, String)>) {
    match path.split_once('?') {
        Some((base, query)) => (base, parse_pairs(query)),
        None => (path, Vec::new()),
    }
}

fn parse_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            };
            (decode(k), decode(v))
        })
        .collect()
}

fn form_pairs(request: &ApiRequest) -> Vec<(String, String)> {
    match &request.body {
        RequestBody::Form(pairs) => pairs.clone(),
        RequestBody::Empty | RequestBody::Json(_) => Vec::new(),
    }
}
