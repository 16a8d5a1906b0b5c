use super::EmbeddingClient;
use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use svcgraph_core::BackendError;

pub const DEFAULT_HASHING_DIMENSIONS: usize = 512;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9]*|[0-9]+").expect("valid token regex"))
}

/// Offline embedder: signed feature hashing of identifier tokens, L2-normalised.
///
/// Identifiers are also split on case boundaries and separators, so
/// `ordersClient`, `orders_client` and `orders-client` share features.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn tokens(text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for m in token_pattern().find_iter(text) {
            let word = m.as_str();
            tokens.push(word.to_lowercase());

            let mut part = String::new();
            let mut parts = Vec::new();
            for ch in word.chars() {
                if ch.is_uppercase() && !part.is_empty() {
                    parts.push(std::mem::take(&mut part));
                }
                part.push(ch.to_ascii_lowercase());
            }
            if !part.is_empty() {
                parts.push(part);
            }
            if parts.len() > 1 {
                tokens.extend(parts);
            }
        }
        tokens
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in Self::tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimensions;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("hashing-{}", self.dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_vectors_are_normalised() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed_one("fetch('http://gateway/api/orders')");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        assert!(embedder.embed_one("  ;; ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_related_texts_score_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_one("http client request url fetch");
        let http = embedder.embed_one("const res = await fetch(url); httpClient.request()");
        let sql = embedder.embed_one("SELECT * FROM invoices WHERE id = $1");
        assert!(dot(&query, &http) > dot(&query, &sql));
    }

    #[test]
    fn test_camel_case_split() {
        let tokens = HashingEmbedder::tokens("ordersClient");
        assert_eq!(tokens, vec!["ordersclient", "orders", "client"]);
    }
}
