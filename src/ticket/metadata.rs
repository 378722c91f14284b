//! Metadata Extractor - 필터링용 평면 메타데이터
//!
//! 빈 값은 저장하지 않습니다. 따라서 필드가 비어 있던 티켓은
//! 해당 필드 기준 필터에 매칭되지 않습니다.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use super::Ticket;

/// 저장 메타데이터 (키 → 스칼라 문자열)
pub type Metadata = BTreeMap<String, String>;

/// 추적하는 티켓 메타데이터 키
pub const TRACKED_KEYS: [&str; 8] = [
    "key",
    "issue_type",
    "priority",
    "status",
    "assignee",
    "reporter",
    "project",
    "created",
];

/// 인덱싱 시각 키 (ISO-8601)
pub const INDEXED_AT_KEY: &str = "indexed_at";

/// 티켓에서 메타데이터 추출 (indexed_at = 현재 시각)
pub fn extract_metadata(ticket: &Ticket) -> Metadata {
    extract_metadata_at(ticket, Utc::now())
}

/// 지정 시각으로 메타데이터 추출
pub fn extract_metadata_at(ticket: &Ticket, indexed_at: DateTime<Utc>) -> Metadata {
    let values = [
        ticket.key().unwrap_or_default(),
        ticket.issue_type(),
        ticket.priority(),
        ticket.status(),
        ticket.assignee(),
        ticket.reporter(),
        ticket.project(),
        ticket.created(),
    ];

    let mut metadata: Metadata = TRACKED_KEYS
        .iter()
        .zip(values)
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    metadata.insert(
        INDEXED_AT_KEY.to_string(),
        indexed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    );

    // 빈 값 제거 (저장 공간 최적화)
    metadata.retain(|_, value| !value.trim().is_empty());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_ticket_metadata() {
        let ticket = Ticket::from_value(json!({
            "key": "PROJ-101",
            "summary": "Login failing",
            "issue_type": "Bug",
            "priority": "High",
            "status": "In Progress",
            "assignee": "John Developer",
            "reporter": "Sarah QA",
            "project": "PROJ",
            "created": "2024-01-15T10:30:00.000Z"
        }))
        .unwrap();

        let now = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let meta = extract_metadata_at(&ticket, now);

        assert_eq!(meta.len(), 9);
        assert_eq!(meta["issue_type"], "Bug");
        assert_eq!(meta["assignee"], "John Developer");
        assert_eq!(meta["created"], "2024-01-15T10:30:00.000Z");
        assert_eq!(meta[INDEXED_AT_KEY], "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_api_ticket_metadata() {
        let ticket = Ticket::from_value(json!({
            "key": "API-9",
            "issuetype": {"name": "Task"},
            "assignee": {"displayName": "Backend Team"},
            "project": {"key": "API"}
        }))
        .unwrap();

        let meta = extract_metadata(&ticket);
        assert_eq!(meta["issue_type"], "Task");
        assert_eq!(meta["assignee"], "Backend Team");
        assert_eq!(meta["project"], "API");
    }

    #[test]
    fn test_empty_values_dropped() {
        let ticket = Ticket::from_value(json!({
            "summary": "sparse",
            "priority": "",
            "status": "   ",
            "assignee": {"name": "no display name"},
            "reporter": null,
            "project": 0
        }))
        .unwrap();

        let meta = extract_metadata(&ticket);
        let keys: Vec<&str> = meta.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![INDEXED_AT_KEY]);
        assert!(meta.values().all(|v| !v.trim().is_empty()));
    }
}
