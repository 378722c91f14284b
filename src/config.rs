//! 런타임 설정
//!
//! 우선순위: CLI 플래그 > 환경변수 > 기본값
//!
//! | 환경변수 | 기본값 |
//! |---|---|
//! | `TICKET_KB_DATA_DIR` | `<local data dir>/.ticket-kb` |
//! | `TICKET_KB_COLLECTION` | `jira_tickets` |
//! | `TICKET_KB_BACKEND` | `sqlite` |
//! | `TICKET_KB_EMBEDDER` | API 키가 있으면 `gemini`, 없으면 `hashing` |

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::ValueEnum;

use crate::embedding::has_api_key;

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION: &str = "jira_tickets";

const ENV_DATA_DIR: &str = "TICKET_KB_DATA_DIR";
const ENV_COLLECTION: &str = "TICKET_KB_COLLECTION";
const ENV_BACKEND: &str = "TICKET_KB_BACKEND";
const ENV_EMBEDDER: &str = "TICKET_KB_EMBEDDER";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.ticket-kb/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ticket-kb")
}

// ============================================================================
// Types
// ============================================================================

/// 벡터 저장소 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// SQLite 파일 (knowledge.db) + 전수 코사인 검색
    Sqlite,
    /// LanceDB (vectors.lance)
    Lance,
}

/// 임베딩 프로바이더
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Gemini API (gemini-embedding-001)
    Gemini,
    /// 로컬 해싱 임베딩 (오프라인)
    Hashing,
}

/// 지식베이스 설정
#[derive(Debug, Clone)]
pub struct KbConfig {
    pub data_dir: PathBuf,
    pub collection: String,
    pub backend: BackendKind,
    pub embedder: EmbedderKind,
}

impl KbConfig {
    /// 환경변수 + 기본값으로 설정 생성
    pub fn from_env() -> Result<Self> {
        let data_dir = non_empty_env(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(get_data_dir);

        let collection =
            non_empty_env(ENV_COLLECTION).unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let backend = match non_empty_env(ENV_BACKEND) {
            Some(value) => BackendKind::from_str(&value, true)
                .map_err(|e| anyhow!("Invalid {}: {}", ENV_BACKEND, e))?,
            None => BackendKind::Sqlite,
        };

        let embedder = match non_empty_env(ENV_EMBEDDER) {
            Some(value) => EmbedderKind::from_str(&value, true)
                .map_err(|e| anyhow!("Invalid {}: {}", ENV_EMBEDDER, e))?,
            None if has_api_key() => EmbedderKind::Gemini,
            None => {
                tracing::debug!("No Gemini API key found, using hashing embedder");
                EmbedderKind::Hashing
            }
        };

        Ok(Self {
            data_dir,
            collection,
            backend,
            embedder,
        })
    }

    /// 오프라인 설정 (SQLite + 해싱 임베딩)
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            collection: DEFAULT_COLLECTION.to_string(),
            backend: BackendKind::Sqlite,
            embedder: EmbedderKind::Hashing,
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_config() {
        let config = KbConfig::local("/tmp/kb").with_collection("other");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/kb"));
        assert_eq!(config.collection, "other");
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.embedder, EmbedderKind::Hashing);
    }

    #[test]
    fn test_kind_parsing_ignores_case() {
        assert_eq!(BackendKind::from_str("LANCE", true), Ok(BackendKind::Lance));
        assert_eq!(
            EmbedderKind::from_str("hashing", true),
            Ok(EmbedderKind::Hashing)
        );
        assert!(BackendKind::from_str("chroma", true).is_err());
    }

    #[test]
    fn test_data_dir_suffix() {
        assert!(get_data_dir().ends_with(".ticket-kb"));
    }
}
