//! CLI 모듈
//!
//! ticket-kb CLI 명령어 정의 및 구현.
//! 각 명령은 도구 함수를 호출하고 사람이 읽는 텍스트(또는 `--json`이면 응답 전체)를 출력합니다.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{BackendKind, EmbedderKind, KbConfig};
use crate::embedding::has_api_key;
use crate::knowledge::{FilterCriteria, KnowledgeBase};
use crate::seed::load_sample_data;
use crate::tools::{self, ToolResponse};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "ticket-kb")]
#[command(version, about = "티켓 시맨틱 지식베이스", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 공통 옵션 (환경변수보다 우선)
#[derive(Args)]
pub struct GlobalArgs {
    /// 데이터 디렉토리
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 컬렉션 이름
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// 벡터 저장소 백엔드
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendKind>,

    /// 임베딩 제공자
    #[arg(long, value_enum, global = true)]
    pub embedder: Option<EmbedderKind>,

    /// 응답 전체를 JSON으로 출력
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 티켓 추가 (JSON)
    Add {
        /// 티켓 JSON 문자열
        ticket: Option<String>,

        /// 티켓 JSON 파일
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// 시맨틱 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 (1 ~ 20)
        #[arg(short, long, default_value = "5", allow_hyphen_values = true)]
        limit: i64,
    },

    /// 속성 필터
    Filter {
        #[arg(long)]
        issue_type: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        assignee: Option<String>,
    },

    /// 통계
    Stats,

    /// 샘플 티켓 로딩
    Seed {
        /// 컬렉션이 비어 있지 않아도 로딩
        #[arg(long)]
        force: bool,
    },

    /// 상태 확인
    Status,
}

impl GlobalArgs {
    /// 환경변수 설정에 CLI 옵션 덮어쓰기
    pub fn resolve(&self) -> Result<KbConfig> {
        Ok(self.apply(KbConfig::from_env()?))
    }

    /// 주어진 설정에 CLI 옵션 덮어쓰기
    pub fn apply(&self, mut config: KbConfig) -> KbConfig {
        if let Some(ref dir) = self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(ref collection) = self.collection {
            config.collection = collection.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(embedder) = self.embedder {
            config.embedder = embedder;
        }

        config
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.global.resolve()?;
    let json = cli.global.json;

    if let Commands::Status = cli.command {
        return cmd_status(&config).await;
    }

    let kb = KnowledgeBase::open(&config)
        .await
        .context("Failed to open knowledge base")?;

    match cli.command {
        Commands::Add { ticket, file } => cmd_add(&kb, ticket, file, json).await,
        Commands::Search { query, limit } => {
            emit(tools::search_tickets(&kb, &query, limit).await, json)
        }
        Commands::Filter {
            issue_type,
            priority,
            status,
            assignee,
        } => {
            let criteria = FilterCriteria {
                issue_type,
                priority,
                status,
                assignee,
            };
            emit(tools::filter_tickets(&kb, &criteria).await, json)
        }
        Commands::Stats => emit(tools::get_statistics(&kb).await, json),
        Commands::Seed { force } => cmd_seed(&kb, force).await,
        Commands::Status => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 티켓 추가 명령어 (add)
async fn cmd_add(
    kb: &KnowledgeBase,
    ticket: Option<String>,
    file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let ticket_json = match (ticket, file) {
        (Some(text), None) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ticket file: {}", path.display()))?,
        (Some(_), Some(_)) => bail!("티켓 JSON과 --file 중 하나만 지정해야 합니다"),
        (None, None) => bail!("티켓 JSON 또는 --file을 지정해야 합니다"),
    };

    emit(tools::add_ticket(kb, &ticket_json).await, json)
}

/// 샘플 로딩 명령어 (seed)
async fn cmd_seed(kb: &KnowledgeBase, force: bool) -> Result<()> {
    println!("[*] 샘플 티켓 로딩 중...");

    let report = load_sample_data(kb, force).await?;

    if report.skipped {
        println!(
            "[!] 지식베이스에 이미 티켓이 있습니다 ({} 건). --force로 다시 로딩할 수 있습니다.",
            kb.count().await?
        );
        return Ok(());
    }

    for id in &report.added {
        println!("[OK] {} 추가됨", id);
    }
    for (key, error) in &report.failed {
        println!("[!] {} 추가 실패: {}", key, error);
    }

    println!();
    println!("[OK] 완료: 현재 {} 건", kb.count().await?);

    Ok(())
}

/// 상태 명령어 (status)
///
/// 지식베이스를 열지 못해도 설정 정보는 출력합니다.
async fn cmd_status(config: &KbConfig) -> Result<()> {
    println!("ticket-kb v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 컬렉션: {}", config.collection);
    println!("[*] 백엔드: {:?} / 임베딩: {:?}", config.backend, config.embedder);

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정 (오프라인 해싱 임베딩 사용 가능)");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match KnowledgeBase::open(config).await {
        Ok(kb) => match kb.count().await {
            Ok(count) => {
                println!(
                    "[OK] 저장된 티켓: {} 건 ({})",
                    count,
                    kb.collection().name()
                );
            }
            Err(e) => println!("[!] 티켓 수 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 지식베이스 열기 실패: {:#}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 도구 응답 출력
///
/// 텍스트 모드에서 에러 응답은 명령 실패로 처리합니다.
fn emit(response: ToolResponse, json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(&response)
            .context("Failed to serialize tool response")?;
        println!("{}", rendered);
        return Ok(());
    }

    if !response.is_success() {
        bail!("{}", response.text());
    }

    println!("{}", response.text().trim_end());
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_globals() {
        let cli = Cli::try_parse_from([
            "ticket-kb",
            "--backend",
            "lance",
            "search",
            "login failures",
            "-l",
            "3",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.global.backend, Some(BackendKind::Lance));
        assert!(cli.global.json);
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query, "login failures");
                assert_eq!(limit, 3);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_parse_filter_and_seed() {
        let cli = Cli::try_parse_from([
            "ticket-kb",
            "filter",
            "--issue-type",
            "Bug",
            "--status",
            "Open",
        ])
        .unwrap();
        match cli.command {
            Commands::Filter {
                issue_type, status, priority, ..
            } => {
                assert_eq!(issue_type.as_deref(), Some("Bug"));
                assert_eq!(status.as_deref(), Some("Open"));
                assert!(priority.is_none());
            }
            _ => panic!("expected filter command"),
        }

        let cli = Cli::try_parse_from(["ticket-kb", "seed", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Seed { force: true }));
    }

    #[test]
    fn test_invalid_backend_rejected() {
        assert!(Cli::try_parse_from(["ticket-kb", "--backend", "chroma", "stats"]).is_err());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = Cli::try_parse_from([
            "ticket-kb",
            "--data-dir",
            "/tmp/kb-test",
            "--collection",
            "support",
            "--backend",
            "lance",
            "stats",
        ])
        .unwrap();

        let config = cli.global.apply(KbConfig::local("/tmp/kb-base"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/kb-test"));
        assert_eq!(config.collection, "support");
        assert_eq!(config.backend, BackendKind::Lance);
        assert_eq!(config.embedder, EmbedderKind::Hashing);
    }

    #[test]
    fn test_missing_flags_keep_base_config() {
        let cli = Cli::try_parse_from(["ticket-kb", "stats"]).unwrap();
        let config = cli
            .global
            .apply(KbConfig::local("/tmp/kb-base").with_collection("base"));

        assert_eq!(config.data_dir, PathBuf::from("/tmp/kb-base"));
        assert_eq!(config.collection, "base");
        assert_eq!(config.backend, BackendKind::Sqlite);
    }

    #[test]
    fn test_emit_error_fails_in_text_mode() {
        assert!(emit(ToolResponse::error("boom"), false).is_err());
        assert!(emit(ToolResponse::error("boom"), true).is_ok());
        assert!(emit(ToolResponse::success("ok"), false).is_ok());
    }
}
