//! Document Builder - 임베딩용 티켓 문서 생성
//!
//! 모든 티켓을 같은 6줄 템플릿으로 직렬화합니다.
//! 필드가 비어 있어도 줄은 유지되므로 부분적으로 채워진 티켓도
//! 같은 임베딩 구조를 갖습니다.
//!
//! ```text
//! Ticket: PROJ-101
//! Type: Bug
//! Priority: High
//! Status: In Progress
//! Summary: Login authentication failing intermittently
//! Description: Users report random login failures ...
//! ```

use super::Ticket;

// ============================================================================
// DocumentLabel
// ============================================================================

/// 문서 템플릿 라벨 (줄 순서 = 선언 순서)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLabel {
    Ticket,
    Type,
    Priority,
    Status,
    Summary,
    Description,
}

impl DocumentLabel {
    /// 템플릿 순서대로 전체 라벨
    pub const ALL: [DocumentLabel; 6] = [
        Self::Ticket,
        Self::Type,
        Self::Priority,
        Self::Status,
        Self::Summary,
        Self::Description,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticket => "Ticket",
            Self::Type => "Type",
            Self::Priority => "Priority",
            Self::Status => "Status",
            Self::Summary => "Summary",
            Self::Description => "Description",
        }
    }

    /// 템플릿 내 줄 번호 (0-based)
    pub fn line_index(&self) -> usize {
        *self as usize
    }
}

// ============================================================================
// Builder
// ============================================================================

/// 티켓을 임베딩용 문서로 변환
///
/// 값에 포함된 줄바꿈은 공백으로 접어서 항상 6줄을 유지합니다.
pub fn build_document(ticket: &Ticket) -> String {
    let values = [
        ticket.key().unwrap_or_default(),
        ticket.issue_type(),
        ticket.priority(),
        ticket.status(),
        ticket.summary(),
        ticket.description(),
    ];

    let document = DocumentLabel::ALL
        .iter()
        .zip(values.iter())
        .map(|(label, value)| format!("{}: {}", label.as_str(), fold_lines(value)))
        .collect::<Vec<_>>()
        .join("\n");

    document.trim().to_string()
}

/// 저장된 문서에서 라벨 값 읽기
///
/// 템플릿 위치로 줄을 찾고 `"Label:"` 접두사를 제거합니다.
/// 템플릿 형태가 아니면 빈 문자열을 반환합니다.
pub fn read_field(document: &str, label: DocumentLabel) -> &str {
    let prefix = format!("{}:", label.as_str());

    document
        .lines()
        .nth(label.line_index())
        .and_then(|line| line.strip_prefix(prefix.as_str()))
        .map(str::trim)
        .unwrap_or("")
}

/// 여러 줄 값을 한 줄로 접기
fn fold_lines(value: &str) -> String {
    value
        .split(|c| c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticket(value: serde_json::Value) -> Ticket {
        Ticket::from_value(value).unwrap()
    }

    fn labels_of(document: &str) -> Vec<String> {
        document
            .lines()
            .map(|line| line.split(':').next().unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn test_full_ticket_document() {
        let doc = build_document(&ticket(json!({
            "key": "PROJ-101",
            "summary": "Login failing",
            "description": "Random failures",
            "issue_type": "Bug",
            "priority": "High",
            "status": "In Progress"
        })));

        assert_eq!(
            doc,
            "Ticket: PROJ-101\nType: Bug\nPriority: High\nStatus: In Progress\n\
             Summary: Login failing\nDescription: Random failures"
        );
    }

    #[test]
    fn test_template_shape_is_invariant() {
        let expected: Vec<String> = DocumentLabel::ALL
            .iter()
            .map(|l| l.as_str().to_string())
            .collect();

        let samples = [
            json!({"summary": "only summary"}),
            json!({"key": "K-1"}),
            json!({"key": "K-2", "description": "line one\nline two\r\nline three"}),
            json!({"summary": "api", "issuetype": {"name": "Bug"}, "status": {"name": "Done"}}),
        ];

        for sample in samples {
            let doc = build_document(&ticket(sample));
            assert_eq!(doc.lines().count(), 6, "document: {:?}", doc);
            assert_eq!(labels_of(&doc), expected);
        }
    }

    #[test]
    fn test_api_shape_uses_name_sub_field() {
        let doc = build_document(&ticket(json!({
            "key": "API-1",
            "issuetype": {"name": "Story"},
            "priority": {"name": "Low"},
            "status": {"name": "Done"}
        })));

        assert_eq!(read_field(&doc, DocumentLabel::Type), "Story");
        assert_eq!(read_field(&doc, DocumentLabel::Priority), "Low");
        assert_eq!(read_field(&doc, DocumentLabel::Status), "Done");
    }

    #[test]
    fn test_multiline_description_folded() {
        let doc = build_document(&ticket(json!({
            "key": "K-3",
            "description": "first\n\n  second  "
        })));
        assert_eq!(read_field(&doc, DocumentLabel::Description), "first second");
    }

    #[test]
    fn test_read_field() {
        let doc = build_document(&ticket(json!({"key": "T-1", "summary": "X"})));
        assert_eq!(read_field(&doc, DocumentLabel::Ticket), "T-1");
        assert_eq!(read_field(&doc, DocumentLabel::Summary), "X");
        assert_eq!(read_field(&doc, DocumentLabel::Description), "");
        assert_eq!(read_field("free text", DocumentLabel::Summary), "");
    }
}
