//! Query Formatter - 검색/필터 결과 요약
//!
//! 검색과 필터 결과를 같은 방식으로 요약합니다:
//! - 구조화된 티켓 요약 목록 (`TicketSummary`)
//! - 사람이 읽는 여러 줄 요약 텍스트
//!
//! 티켓 한 줄 요약은 저장 문서의 템플릿 줄에서 읽습니다 (별도 저장 필드 없음).

use serde::Serialize;

use crate::ticket::{read_field, DocumentLabel};

use super::store::{Histogram, SearchResult, StatsSnapshot, UNKNOWN_BUCKET};
use super::vector::MetadataFilter;

/// assignee가 없을 때 표시값
pub const UNASSIGNED: &str = "Unassigned";

// ============================================================================
// TicketSummary
// ============================================================================

/// 티켓 요약 (도구 응답용)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketSummary {
    pub ticket_id: String,
    /// 필터 결과에서는 생략
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    pub summary: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub priority: String,
    pub status: String,
    pub assignee: String,
}

// ============================================================================
// Formatter
// ============================================================================

/// 결과 포맷터
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    include_relevance: bool,
}

impl Formatter {
    /// 시맨틱 검색 결과용 (관련도 포함)
    pub fn search() -> Self {
        Self {
            include_relevance: true,
        }
    }

    /// 필터 결과용 (관련도 생략)
    pub fn filter() -> Self {
        Self {
            include_relevance: false,
        }
    }

    /// 결과 → 티켓 요약 목록
    pub fn summarize(&self, results: &[SearchResult]) -> Vec<TicketSummary> {
        results.iter().map(|r| self.summarize_one(r)).collect()
    }

    fn summarize_one(&self, result: &SearchResult) -> TicketSummary {
        let field = |key: &str, default: &str| {
            result
                .metadata
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        TicketSummary {
            ticket_id: result.ticket_id.clone(),
            relevance_score: self.include_relevance.then_some(result.relevance_score),
            summary: summary_text(&result.content),
            issue_type: field("issue_type", UNKNOWN_BUCKET),
            priority: field("priority", UNKNOWN_BUCKET),
            status: field("status", UNKNOWN_BUCKET),
            assignee: field("assignee", UNASSIGNED),
        }
    }
}

/// 저장 문서에서 한 줄 요약 추출
///
/// Summary 줄이 비어 있으면 Ticket 줄(식별자)로 대체합니다.
pub fn summary_text(document: &str) -> String {
    let summary = read_field(document, DocumentLabel::Summary);
    if summary.is_empty() {
        read_field(document, DocumentLabel::Ticket).to_string()
    } else {
        summary.to_string()
    }
}

// ============================================================================
// Digests
// ============================================================================

/// 검색 결과 요약 텍스트
pub fn search_digest(tickets: &[TicketSummary]) -> String {
    if tickets.is_empty() {
        return "No tickets found matching your query.".to_string();
    }

    let mut out = format!("Found {} relevant tickets:\n\n", tickets.len());
    for ticket in tickets {
        match ticket.relevance_score {
            Some(score) => {
                out.push_str(&format!("- **{}** (Relevance: {})\n", ticket.ticket_id, score))
            }
            None => out.push_str(&format!("- **{}**\n", ticket.ticket_id)),
        }
        out.push_str(&format!(
            "   Type: {} | Priority: {} | Status: {}\n",
            ticket.issue_type, ticket.priority, ticket.status
        ));
        out.push_str(&format!("   Assignee: {}\n", ticket.assignee));
        out.push_str(&format!("   {}\n\n", ticket.summary));
    }

    out
}

/// 필터 결과 요약 텍스트
pub fn filter_digest(filter: &MetadataFilter, tickets: &[TicketSummary]) -> String {
    let description = filter.describe();

    if tickets.is_empty() {
        return format!("No tickets found matching filters: {}", description);
    }

    let mut out = format!(
        "Found {} tickets matching filters ({}):\n\n",
        tickets.len(),
        description
    );
    for ticket in tickets {
        out.push_str(&format!("- **{}**\n", ticket.ticket_id));
        out.push_str(&format!("   Type: {}\n", ticket.issue_type));
        out.push_str(&format!("   Priority: {}\n", ticket.priority));
        out.push_str(&format!("   Status: {}\n", ticket.status));
        out.push_str(&format!("   Assignee: {}\n", ticket.assignee));
        out.push_str(&format!("   {}\n\n", ticket.summary));
    }

    out
}

/// 통계 요약 텍스트
pub fn stats_digest(stats: &StatsSnapshot) -> String {
    let mut out = String::from("**Ticket Knowledge Base Statistics**\n\n");
    out.push_str(&format!("Total Tickets: {}\n", stats.total_tickets));

    if stats.total_tickets == 0 {
        return out;
    }

    out.push_str(&format!("Sample Size: {}\n", stats.sample_size.unwrap_or(0)));

    let sections = [
        ("Issue Types", &stats.issue_types),
        ("Priorities", &stats.priorities),
        ("Statuses", &stats.statuses),
    ];
    for (title, histogram) in sections {
        if let Some(histogram) = histogram {
            out.push('\n');
            out.push_str(&histogram_section(title, histogram));
        }
    }

    out
}

fn histogram_section(title: &str, histogram: &Histogram) -> String {
    let mut out = format!("**{}:**\n", title);
    for (name, count) in histogram {
        out.push_str(&format!("  - {}: {}\n", name, count));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{build_document, Metadata, Ticket};
    use serde_json::json;

    fn result(value: serde_json::Value, metadata: &[(&str, &str)], score: f64) -> SearchResult {
        let ticket = Ticket::from_value(value).unwrap();
        SearchResult {
            ticket_id: ticket.key().unwrap_or_default(),
            content: build_document(&ticket),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Metadata>(),
            relevance_score: score,
        }
    }

    #[test]
    fn test_summary_text_tracks_template() {
        let ticket = Ticket::from_value(json!({"key": "T-1", "summary": "X"})).unwrap();
        assert_eq!(summary_text(&build_document(&ticket)), "X");

        let keyless = Ticket::from_value(json!({"key": "T-2"})).unwrap();
        assert_eq!(summary_text(&build_document(&keyless)), "T-2");
    }

    #[test]
    fn test_search_summary_defaults() {
        let results = vec![result(
            json!({"key": "P-1", "summary": "Login failing"}),
            &[("issue_type", "Bug")],
            0.912,
        )];

        let summaries = Formatter::search().summarize(&results);
        assert_eq!(
            summaries[0],
            TicketSummary {
                ticket_id: "P-1".into(),
                relevance_score: Some(0.912),
                summary: "Login failing".into(),
                issue_type: "Bug".into(),
                priority: "Unknown".into(),
                status: "Unknown".into(),
                assignee: "Unassigned".into(),
            }
        );
    }

    #[test]
    fn test_filter_summary_omits_relevance() {
        let results = vec![result(json!({"key": "P-2", "summary": "s"}), &[], 0.0)];
        let summaries = Formatter::filter().summarize(&results);
        assert_eq!(summaries[0].relevance_score, None);

        let json = serde_json::to_value(&summaries[0]).unwrap();
        assert!(json.get("relevance_score").is_none());
        assert_eq!(json["type"], "Unknown");
    }

    #[test]
    fn test_search_digest() {
        assert_eq!(search_digest(&[]), "No tickets found matching your query.");

        let results = vec![result(
            json!({"key": "P-3", "summary": "Database timeout"}),
            &[("priority", "Critical"), ("assignee", "DB Team")],
            0.5,
        )];
        let digest = search_digest(&Formatter::search().summarize(&results));

        assert!(digest.starts_with("Found 1 relevant tickets:"));
        assert!(digest.contains("**P-3** (Relevance: 0.5)"));
        assert!(digest.contains("Priority: Critical"));
        assert!(digest.contains("Assignee: DB Team"));
        assert!(digest.contains("Database timeout"));
    }

    #[test]
    fn test_filter_digest() {
        let filter = MetadataFilter::new().with("issue_type", "Bug").with("status", "Open");
        assert_eq!(
            filter_digest(&filter, &[]),
            "No tickets found matching filters: issue_type=Bug, status=Open"
        );

        let results = vec![result(json!({"key": "P-4", "summary": "s"}), &[], 0.0)];
        let digest = filter_digest(&filter, &Formatter::filter().summarize(&results));
        assert!(digest.starts_with("Found 1 tickets matching filters (issue_type=Bug, status=Open)"));
        assert!(!digest.contains("Relevance"));
    }

    #[test]
    fn test_stats_digest() {
        let empty = stats_digest(&StatsSnapshot::default());
        assert!(empty.contains("Total Tickets: 0"));
        assert!(!empty.contains("Sample Size"));

        let mut issue_types = Histogram::new();
        issue_types.insert("Bug".into(), 2);
        let stats = StatsSnapshot {
            total_tickets: 2,
            sample_size: Some(2),
            issue_types: Some(issue_types),
            ..Default::default()
        };
        let digest = stats_digest(&stats);
        assert!(digest.contains("Sample Size: 2"));
        assert!(digest.contains("**Issue Types:**\n  - Bug: 2"));
        assert!(!digest.contains("Priorities"));
    }
}
