//! Review lifecycle types shared between the backend client and the CLI.
//!
//! A review is identified by `(paper_id, reviewer_email)`. The backend creates
//! it on assignment and owns every later transition; this crate only decodes
//! what the backend reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Review lifecycle state, totally ordered from `Empty` to `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Empty,
    Acknowledged,
    Draft,
    Delivered,
    Approved,
    Complete,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Empty,
        Status::Acknowledged,
        Status::Draft,
        Status::Delivered,
        Status::Approved,
        Status::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Empty => "empty",
            Status::Acknowledged => "acknowledged",
            Status::Draft => "draft",
            Status::Delivered => "delivered",
            Status::Approved => "approved",
            Status::Complete => "complete",
        }
    }

    /// Decode a textual status such as `"Acknowledged"` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }

    /// Decode the numeric `reviewStatus` code (0 = empty ... 5 = complete).
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Acceptance is only meaningful while the review is still `Empty`.
    pub fn needs_acceptance(self) -> bool {
        self == Status::Empty
    }

    pub fn is_beyond_acknowledged(self) -> bool {
        self > Status::Acknowledged
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar review field value. Integers are score slots, text is free-form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    /// Parse a raw cell: blank becomes `None`, integers become `Int`.
    pub fn from_cell(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<i64>() {
            Ok(n) => FieldValue::Int(n),
            Err(_) => FieldValue::Text(raw.to_string()),
        })
    }

    /// Decode a scalar JSON value from a review read. `null`, booleans,
    /// arrays and objects yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Text(n.to_string()),
            }),
            Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Int(_) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FieldValue::Text(_))
    }

    /// Value as sent in a form-encoded body.
    pub fn to_form_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Field values keyed by the backend's short field identifiers (`s01`, `t02`, ...).
///
/// Empty values are dropped on insert, so everything in the set is sendable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, FieldValue>")]
pub struct FieldSet(BTreeMap<String, FieldValue>);

impl From<BTreeMap<String, FieldValue>> for FieldSet {
    fn from(map: BTreeMap<String, FieldValue>) -> Self {
        map.into_iter().collect()
    }
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning `false` when it was empty and therefore skipped.
    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<FieldValue>) -> bool {
        let value = value.into();
        if value.is_empty() {
            return false;
        }
        self.0.insert(id.into(), value);
        true
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = FieldSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Named review form fields as the backend reports them on a read.
pub const DEFAULT_CONTENT_FIELDS: &[&str] = &[
    "PapSum",
    "Str",
    "Wea",
    "OveMer",
    "RevExp",
    "ComAut",
    "Strengths",
    "Weaknesses",
];

/// Backend field identifiers that hold review content.
///
/// Besides the named fields, the numbered score and text slots (`s01`,
/// `t02`, ...) always count. Any other key of a review object is metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFields {
    names: Vec<String>,
}

impl Default for ContentFields {
    fn default() -> Self {
        Self {
            names: DEFAULT_CONTENT_FIELDS.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl ContentFields {
    pub fn with_field(mut self, id: &str) -> Self {
        let id = id.trim();
        if !id.is_empty() && !self.contains(id) {
            self.names.push(id.to_string());
        }
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        is_numbered_slot(key) || self.names.iter().any(|n| n == key)
    }
}

/// `s` or `t` followed by one or more digits.
fn is_numbered_slot(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some('s' | 't'))
        && !chars.as_str().is_empty()
        && chars.all(|c| c.is_ascii_digit())
}

/// One reviewer's review of one paper, as last read from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    pub paper_id: u64,
    pub reviewer_email: String,
    /// Opaque backend identifier; absent until assignment has propagated.
    pub review_id: Option<String>,
    pub status: Status,
    /// Content fields as reported by the backend. `None` means present but null.
    pub fields: BTreeMap<String, Option<FieldValue>>,
    /// Optimistic-concurrency precondition sent back as `if_vtag_match`.
    pub version_tag: Option<String>,
    pub edit_version: Option<u64>,
}

impl ReviewRecord {
    /// Decode one entry of the backend's `reviews` array with the default
    /// content fields.
    pub fn from_json(paper_id: u64, value: &Value) -> Option<Self> {
        Self::decode(paper_id, value, &ContentFields::default())
    }

    /// Decode one entry of the backend's `reviews` array. Only keys listed in
    /// `content` are kept as content fields.
    ///
    /// Returns `None` when `value` is not an object.
    pub fn decode(paper_id: u64, value: &Value, content: &ContentFields) -> Option<Self> {
        let obj = value.as_object()?;

        let reviewer_email = ["reviewer_email", "email"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let review_id = ["rid", "reviewId"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(scalar_string));

        let status = decode_status(obj.get("status"), obj.get("reviewStatus"));

        let version_tag = ["version", "reviewTime"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(scalar_string));

        let edit_version = obj.get("reviewEditVersion").and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        let fields = obj
            .iter()
            .filter(|(k, v)| content.contains(k) && is_scalar(v))
            .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
            .collect();

        Some(Self {
            paper_id,
            reviewer_email,
            review_id,
            status,
            fields,
            version_tag,
            edit_version,
        })
    }

    /// At least one content field holds a non-empty value.
    pub fn has_content(&self) -> bool {
        self.fields
            .values()
            .any(|v| v.as_ref().is_some_and(|v| !v.is_empty()))
    }

    /// The success predicate: the status moved past `Acknowledged`, or some
    /// content field is filled in.
    pub fn has_persisted_content(&self) -> bool {
        self.status.is_beyond_acknowledged() || self.has_content()
    }

    /// The `edit_version` to send with the next write: last known plus one,
    /// or 1 when the backend never reported one.
    pub fn next_edit_version(&self) -> u64 {
        self.edit_version.map_or(1, |n| n.saturating_add(1))
    }

    pub fn matches_email(&self, email: &str) -> bool {
        self.reviewer_email.trim().eq_ignore_ascii_case(email.trim())
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode_status(text: Option<&Value>, code: Option<&Value>) -> Status {
    if let Some(s) = text.and_then(Value::as_str)
        && let Some(status) = Status::from_name(s)
    {
        return status;
    }
    if let Some(n) = text.and_then(Value::as_i64).or_else(|| code.and_then(Value::as_i64))
        && let Some(status) = Status::from_code(n)
    {
        return status;
    }
    Status::Empty
}

/// A request to put a reviewer on a paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRequest {
    pub paper_id: u64,
    pub reviewer_email: String,
    pub reviewer_name: Option<String>,
    pub round: Option<String>,
}

impl AssignmentRequest {
    /// Blank name and round are normalised to `None`.
    pub fn new(
        paper_id: u64,
        reviewer_email: &str,
        reviewer_name: Option<&str>,
        round: Option<&str>,
    ) -> Self {
        Self {
            paper_id,
            reviewer_email: reviewer_email.trim().to_string(),
            reviewer_name: non_blank(reviewer_name),
            round: non_blank(round),
        }
    }
}

/// One input row handed over by the CSV layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub paper_id: u64,
    pub reviewer_email: String,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub round: Option<String>,
    #[serde(default)]
    pub fields: FieldSet,
}

impl ImportRecord {
    pub fn assignment(&self) -> AssignmentRequest {
        AssignmentRequest::new(
            self.paper_id,
            &self.reviewer_email,
            self.reviewer_name.as_deref(),
            self.round.as_deref(),
        )
    }

    pub fn round(&self) -> Option<&str> {
        self.round.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
