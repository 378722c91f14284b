//! 로컬 해싱 임베딩
//!
//! 네트워크 없이 동작하는 결정적 bag-of-words 임베딩입니다.
//! 토큰을 SHA-256으로 해싱해 부호 있는 버킷에 누적한 뒤 정규화합니다.
//! 의미적 유사도는 어휘 겹침 수준이지만 테스트와 오프라인 사용에 충분합니다.

use std::sync::OnceLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::{normalize, EmbeddingProvider};

/// 해싱 임베딩 차원 (all-MiniLM-L6-v2와 동일)
pub const HASHING_DIMENSION: usize = 384;

/// 유니코드 문자/숫자 연속 구간
const TOKEN_PATTERN: &str = r"[\p{L}\p{N}]+";

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern is valid"))
}

/// SHA-256 기반 해싱 임베딩
#[derive(Debug, Clone, Default)]
pub struct HashingEmbedding;

impl HashingEmbedding {
    pub fn new() -> Self {
        Self
    }

    /// 동기 임베딩 계산
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; HASHING_DIMENSION];
        let lowered = text.to_lowercase();

        for token in token_regex().find_iter(&lowered) {
            let digest = Sha256::digest(token.as_str().as_bytes());

            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % HASHING_DIMENSION as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

            vector[bucket] += sign;
        }

        normalize(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        HASHING_DIMENSION
    }

    fn name(&self) -> &str {
        "hashing-sha256-384"
    }
}
