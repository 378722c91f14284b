//! 샘플 티켓 로딩
//!
//! 데모/초기 확인용 PROJ-101 ~ PROJ-104 티켓 네 개.

use serde_json::{json, Value};

use crate::error::KbResult;
use crate::knowledge::KnowledgeBase;
use crate::ticket::Ticket;

/// 샘플 티켓 (JSON)
pub fn sample_tickets() -> Vec<Value> {
    vec![
        json!({
            "key": "PROJ-101",
            "summary": "Login authentication failing intermittently",
            "description": "Users report random login failures with correct credentials. Happens about 20% of the time during peak hours.",
            "issue_type": "Bug",
            "priority": "High",
            "status": "In Progress",
            "assignee": "John Developer",
            "reporter": "Sarah QA",
            "project": "PROJ",
            "created": "2024-01-15T10:30:00.000Z"
        }),
        json!({
            "key": "PROJ-102",
            "summary": "Implement dark mode for mobile app",
            "description": "Add dark mode theme support for the mobile application to improve user experience and reduce eye strain.",
            "issue_type": "Story",
            "priority": "Medium",
            "status": "To Do",
            "assignee": "Jane Designer",
            "reporter": "Product Manager",
            "project": "PROJ",
            "created": "2024-01-16T09:15:00.000Z"
        }),
        json!({
            "key": "PROJ-103",
            "summary": "Database connection timeout in production",
            "description": "Production database queries are timing out after 30 seconds. Affecting user dashboard load times.",
            "issue_type": "Bug",
            "priority": "Critical",
            "status": "Open",
            "assignee": "Database Team",
            "reporter": "Monitoring System",
            "project": "PROJ",
            "created": "2024-01-17T14:22:00.000Z"
        }),
        json!({
            "key": "PROJ-104",
            "summary": "Add unit tests for payment processing",
            "description": "Increase test coverage for payment processing module to ensure reliability.",
            "issue_type": "Task",
            "priority": "Medium",
            "status": "In Progress",
            "assignee": "Test Team",
            "reporter": "Tech Lead",
            "project": "PROJ",
            "created": "2024-01-18T11:45:00.000Z"
        }),
    ]
}

/// 샘플 티켓 로딩 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub added: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// 컬렉션이 비어 있지 않아 건너뜀
    pub skipped: bool,
}

/// 샘플 티켓 로딩
///
/// 컬렉션이 비어 있을 때만 로딩합니다 (`force`면 항상).
/// 개별 티켓 실패는 기록만 하고 계속 진행합니다.
pub async fn load_sample_data(kb: &KnowledgeBase, force: bool) -> KbResult<SeedReport> {
    let existing = kb.count().await?;
    if existing > 0 && !force {
        tracing::info!(
            "Knowledge base already contains {} tickets, skipping sample data",
            existing
        );
        return Ok(SeedReport {
            skipped: true,
            ..SeedReport::default()
        });
    }

    tracing::info!("Loading sample tickets...");

    let mut report = SeedReport::default();
    for value in sample_tickets() {
        let key = value["key"].as_str().unwrap_or_default().to_string();

        let added = match Ticket::from_value(value) {
            Ok(ticket) => kb.add_ticket(&ticket).await,
            Err(e) => Err(e),
        };

        match added {
            Ok(id) => report.added.push(id),
            Err(e) => {
                tracing::warn!("Failed to add sample ticket {}: {}", key, e);
                report.failed.push((key, e.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KbConfig;
    use tempfile::TempDir;

    #[test]
    fn test_sample_tickets_are_valid() {
        for value in sample_tickets() {
            let ticket = Ticket::from_value(value).unwrap();
            assert!(ticket.validate().is_ok());
            assert!(ticket.key().unwrap().starts_with("PROJ-10"));
        }
    }

    #[tokio::test]
    async fn test_load_only_into_empty_collection() {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::open(&KbConfig::local(dir.path())).await.unwrap();

        let report = load_sample_data(&kb, false).await.unwrap();
        assert_eq!(report.added, vec!["PROJ-101", "PROJ-102", "PROJ-103", "PROJ-104"]);
        assert!(report.failed.is_empty());

        let report = load_sample_data(&kb, false).await.unwrap();
        assert!(report.skipped);
        assert_eq!(kb.count().await.unwrap(), 4);

        let report = load_sample_data(&kb, true).await.unwrap();
        assert_eq!(report.added.len(), 4);
        assert_eq!(kb.count().await.unwrap(), 8);
    }
}
