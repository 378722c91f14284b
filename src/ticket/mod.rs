//! Ticket 모듈 - 이슈 트래커 레코드 입력 모델
//!
//! 티켓 필드는 두 가지 형태로 들어옵니다:
//! - API 형태: `{"priority": {"name": "High"}}`, `{"assignee": {"displayName": "Jane"}}`
//! - 평면 형태: `{"priority": "High", "issue_type": "Bug"}`
//!
//! 수집 시점에 한 번 `FieldValue`로 파싱하고, 이후에는 match로만 해석합니다.
//!
//! - document: 임베딩용 고정 템플릿 문서 생성
//! - metadata: 필터링용 평면 메타데이터 추출

mod document;
mod metadata;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{KbError, KbResult};

// Re-exports
pub use document::{build_document, read_field, DocumentLabel};
pub use metadata::{
    extract_metadata, extract_metadata_at, Metadata, INDEXED_AT_KEY, TRACKED_KEYS,
};

// ============================================================================
// FieldValue
// ============================================================================

/// 티켓 필드 값
///
/// 문자열이면 `Scalar`, 객체면 `Named` (name / displayName / key 하위 필드),
/// 그 외 JSON 값(숫자, 불리언, 배열)은 `Other`로 보존합니다.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    Named(Map<String, Value>),
    Other(Value),
}

impl FieldValue {
    /// 필드 값을 문자열로 해석
    ///
    /// - `Scalar` → 그대로
    /// - `Named` → `sub_key` 하위 필드 값 (없으면 빈 문자열)
    /// - `Other` → 값이 비어있지 않으면 문자열화, 아니면 빈 문자열
    pub fn resolve(&self, sub_key: Option<&str>) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            Self::Named(map) => match sub_key {
                Some(k) => map.get(k).map(stringify).unwrap_or_default(),
                None if map.is_empty() => String::new(),
                None => Value::Object(map.clone()).to_string(),
            },
            Self::Other(value) => stringify(value),
        }
    }
}

/// JSON 값 문자열화 (null, false, 0, 빈 컬렉션은 빈 문자열)
fn stringify(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        Value::Array(a) if a.is_empty() => String::new(),
        Value::Object(o) if o.is_empty() => String::new(),
        other => other.to_string(),
    }
}

/// Option 필드 해석 헬퍼
fn resolve(field: &Option<FieldValue>, sub_key: Option<&str>) -> String {
    field
        .as_ref()
        .map(|v| v.resolve(sub_key))
        .unwrap_or_default()
}

// ============================================================================
// Ticket
// ============================================================================

/// 이슈 트래커 티켓 (입력)
///
/// 알 수 없는 필드는 무시됩니다. `key` 또는 `summary` 중 하나는 있어야 합니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub key: Option<FieldValue>,
    #[serde(default)]
    pub summary: Option<FieldValue>,
    #[serde(default)]
    pub description: Option<FieldValue>,
    #[serde(default)]
    pub created: Option<FieldValue>,
    /// API 형태 이슈 타입 (`{"name": "Bug"}`)
    #[serde(default)]
    pub issuetype: Option<FieldValue>,
    /// 평면 형태 이슈 타입 (`"Bug"`)
    #[serde(default)]
    pub issue_type: Option<FieldValue>,
    #[serde(default)]
    pub priority: Option<FieldValue>,
    #[serde(default)]
    pub status: Option<FieldValue>,
    #[serde(default)]
    pub assignee: Option<FieldValue>,
    #[serde(default)]
    pub reporter: Option<FieldValue>,
    #[serde(default)]
    pub project: Option<FieldValue>,
}

impl Ticket {
    /// JSON 문자열에서 티켓 파싱
    pub fn from_json(json: &str) -> KbResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|_| KbError::validation("Invalid JSON format provided"))?;
        Self::from_value(value)
    }

    /// JSON 값에서 티켓 파싱 (객체만 허용)
    pub fn from_value(value: Value) -> KbResult<Self> {
        if !value.is_object() {
            return Err(KbError::validation("Ticket must be a JSON object"));
        }

        serde_json::from_value(value)
            .map_err(|e| KbError::validation(format!("Invalid ticket: {}", e)))
    }

    /// 필수 식별 필드 검증 (`key` 또는 `summary`)
    pub fn validate(&self) -> KbResult<()> {
        if self.key().is_none() && self.summary().trim().is_empty() {
            return Err(KbError::validation(
                "Ticket must have either 'key' or 'summary' field",
            ));
        }
        Ok(())
    }

    /// 외부 식별자 (비어있으면 None)
    pub fn key(&self) -> Option<String> {
        let key = resolve(&self.key, None);
        if key.trim().is_empty() {
            None
        } else {
            Some(key)
        }
    }

    pub fn summary(&self) -> String {
        resolve(&self.summary, None)
    }

    pub fn description(&self) -> String {
        resolve(&self.description, None)
    }

    pub fn created(&self) -> String {
        resolve(&self.created, None)
    }

    /// 이슈 타입: `issuetype.name` → 평면 `issue_type`
    pub fn issue_type(&self) -> String {
        let primary = resolve(&self.issuetype, Some("name"));
        if primary.is_empty() {
            resolve(&self.issue_type, Some("name"))
        } else {
            primary
        }
    }

    pub fn priority(&self) -> String {
        resolve(&self.priority, Some("name"))
    }

    pub fn status(&self) -> String {
        resolve(&self.status, Some("name"))
    }

    pub fn assignee(&self) -> String {
        resolve(&self.assignee, Some("displayName"))
    }

    pub fn reporter(&self) -> String {
        resolve(&self.reporter, Some("displayName"))
    }

    pub fn project(&self) -> String {
        resolve(&self.project, Some("key"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_ticket() {
        let ticket = Ticket::from_value(json!({
            "key": "PROJ-1",
            "summary": "Login fails",
            "issue_type": "Bug",
            "priority": "High",
            "status": "Open",
            "assignee": "John",
            "project": "PROJ"
        }))
        .unwrap();

        assert_eq!(ticket.key().as_deref(), Some("PROJ-1"));
        assert_eq!(ticket.issue_type(), "Bug");
        assert_eq!(ticket.priority(), "High");
        assert_eq!(ticket.status(), "Open");
        assert_eq!(ticket.assignee(), "John");
        assert_eq!(ticket.project(), "PROJ");
    }

    #[test]
    fn test_api_shaped_ticket() {
        let ticket = Ticket::from_value(json!({
            "key": "API-7",
            "issuetype": {"name": "Story", "id": "10001"},
            "priority": {"name": "Medium"},
            "status": {"name": "In Progress"},
            "assignee": {"displayName": "Jane Designer", "name": "jane"},
            "reporter": {"displayName": "PM"},
            "project": {"key": "API", "name": "Api Project"}
        }))
        .unwrap();

        assert_eq!(ticket.issue_type(), "Story");
        assert_eq!(ticket.priority(), "Medium");
        assert_eq!(ticket.status(), "In Progress");
        assert_eq!(ticket.assignee(), "Jane Designer");
        assert_eq!(ticket.reporter(), "PM");
        assert_eq!(ticket.project(), "API");
    }

    #[test]
    fn test_issuetype_falls_back_to_flat_alias() {
        let ticket = Ticket::from_value(json!({
            "summary": "x",
            "issuetype": {"id": "1"},
            "issue_type": "Task"
        }))
        .unwrap();
        assert_eq!(ticket.issue_type(), "Task");
    }

    #[test]
    fn test_named_field_without_sub_key_is_empty() {
        let ticket = Ticket::from_value(json!({
            "summary": "x",
            "assignee": {"name": "jdoe"}
        }))
        .unwrap();
        assert_eq!(ticket.assignee(), "");
    }

    #[test]
    fn test_other_values_stringified() {
        let ticket = Ticket::from_value(json!({
            "key": 42,
            "summary": "numbers",
            "project": false,
            "reporter": 0
        }))
        .unwrap();
        assert_eq!(ticket.key().as_deref(), Some("42"));
        assert_eq!(ticket.project(), "");
        assert_eq!(ticket.reporter(), "");
    }

    #[test]
    fn test_null_fields_are_absent() {
        let ticket = Ticket::from_value(json!({"key": null, "summary": "only summary"})).unwrap();
        assert!(ticket.key().is_none());
        assert!(ticket.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_identity() {
        let ticket = Ticket::from_value(json!({"description": "no identity"})).unwrap();
        let err = ticket.validate().unwrap_err();
        assert!(err.is_validation());

        let ticket = Ticket::from_value(json!({"key": "", "summary": "  "})).unwrap();
        assert!(ticket.validate().is_err());
    }

    #[test]
    fn test_from_json_rejects_malformed_and_non_object() {
        let err = Ticket::from_json("{not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON format provided");

        let err = Ticket::from_json("[1, 2, 3]").unwrap_err();
        assert!(err.is_validation());
    }
}
