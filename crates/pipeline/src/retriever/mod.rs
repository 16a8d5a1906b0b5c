//! Per-run retrieval corpus over each service's source files

mod chunker;
mod interpreter;

pub use chunker::{chunk_file, chunk_id};
pub use interpreter::{interpreted_text, ChunkInterpreter, DEFAULT_INTERPRET_MAX_TOKENS};

use crate::blacklist::{FileBlacklist, DIR_BLACKLIST};
use crate::catalog::ConfigCatalog;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use svcgraph_core::fs::is_binary;
use svcgraph_core::model::{CodeChunk, Service};
use svcgraph_core::{FileSystem, RetrievalError};
use svcgraph_llm::EmbeddingClient;
use svcgraph_store::{VectorRecord, VectorStore};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CHUNK_BYTES: usize = 8 * 1024;

/// Interpretation calls in flight per service.
const INTERPRET_CONCURRENCY: usize = 4;

pub struct CodeRetriever {
    fs: Arc<dyn FileSystem>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    run_id: String,
    collection: String,
    project_root: Option<PathBuf>,
    max_chunk_bytes: usize,
    catalog: Arc<ConfigCatalog>,
    interpreter: Option<Arc<ChunkInterpreter>>,
}

impl CodeRetriever {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        run_id: impl Into<String>,
    ) -> Self {
        let run_id = run_id.into();
        Self {
            fs,
            embedder,
            store,
            collection: format!("chunks_{}", run_id),
            run_id,
            project_root: None,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            catalog: Arc::new(ConfigCatalog::empty()),
            interpreter: None,
        }
    }

    /// Chunk paths are stored relative to this root.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn with_max_chunk_bytes(mut self, max_chunk_bytes: usize) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }

    /// Config-center files are indexed with the service that owns them.
    pub fn with_catalog(mut self, catalog: Arc<ConfigCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Embed a model description of each chunk instead of its raw text.
    pub fn with_interpreter(mut self, interpreter: Arc<ChunkInterpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn prepare(&self) -> Result<(), RetrievalError> {
        self.store.create_collection(&self.collection).await
    }

    pub async fn cleanup(&self) -> Result<(), RetrievalError> {
        self.store.drop_collection(&self.collection).await
    }

    /// Chunks, embeds and stores one service's source. Returns the chunk count.
    pub async fn index(&self, service: &Service) -> Result<usize, RetrievalError> {
        let start = Instant::now();
        let chunks = self.chunk_service(service)?;
        if chunks.is_empty() {
            debug!(service = %service.id, "No indexable files");
            return Ok(0);
        }

        let texts = self.embedding_texts(&chunks).await;
        let vectors = self.embedder.embed(&texts).await.map_err(|e| {
            RetrievalError::EmbeddingUnavailable {
                service: service.id.clone(),
                message: e.to_string(),
            }
        })?;
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::EmbeddingUnavailable {
                service: service.id.clone(),
                message: format!(
                    "embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
            });
        }

        let count = chunks.len();
        let records = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord { chunk, vector })
            .collect();
        self.store.upsert(&self.collection, records).await?;

        info!(
            service = %service.id,
            chunks = count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Indexed service"
        );
        Ok(count)
    }

    /// Most relevant chunks first, at most `k`. `scope` restricts the search
    /// to one service.
    pub async fn retrieve(
        &self,
        query: &str,
        scope: Option<&str>,
        k: usize,
    ) -> Result<Vec<CodeChunk>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut vectors = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| RetrievalError::EmbeddingUnavailable {
                service: scope.unwrap_or("*").to_string(),
                message: e.to_string(),
            })?;
        let vector = vectors
            .pop()
            .ok_or_else(|| RetrievalError::EmbeddingUnavailable {
                service: scope.unwrap_or("*").to_string(),
                message: "embedding provider returned no vector".to_string(),
            })?;

        let hits = self
            .store
            .search(&self.collection, &vector, scope, k)
            .await?;
        Ok(hits.into_iter().map(|hit| hit.chunk).collect())
    }

    /// Raw chunk text, or the interpreter's description when one is set.
    /// A chunk whose interpretation fails falls back to its raw text.
    async fn embedding_texts(&self, chunks: &[CodeChunk]) -> Vec<String> {
        let Some(interpreter) = &self.interpreter else {
            return chunks.iter().map(|c| c.text.clone()).collect();
        };

        let layout: Vec<String> = chunks
            .iter()
            .map(|c| c.path.display().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        stream::iter(chunks)
            .map(|chunk| {
                let layout = &layout;
                async move {
                    match interpreter.interpret(chunk, layout).await {
                        Ok(summary) => interpreted_text(chunk, &summary),
                        Err(e) => {
                            warn!(chunk = %chunk.provenance(), error = %e, "Interpretation failed, embedding raw text");
                            chunk.text.clone()
                        }
                    }
                }
            })
            .buffered(INTERPRET_CONCURRENCY)
            .boxed()
            .collect()
            .await
    }

    fn chunk_service(&self, service: &Service) -> Result<Vec<CodeChunk>, RetrievalError> {
        let Some(source_root) = &service.source_root else {
            return Ok(Vec::new());
        };

        let unreadable = |e: anyhow::Error| RetrievalError::SourceUnreadable {
            service: service.id.clone(),
            message: e.to_string(),
        };
        let mut files = self
            .fs
            .walk_files(source_root, DIR_BLACKLIST)
            .map_err(unreadable)?;

        if service.is_config_center {
            let owned = self.catalog.attributed_files();
            files.retain(|f| !owned.contains(f));
        }
        for file in self.catalog.files_for(&service.id) {
            if !files.contains(&file) {
                files.push(file);
            }
        }

        let blacklist = FileBlacklist::new(source_root);
        let mut chunks = Vec::new();
        for path in files {
            if blacklist.is_blacklisted(&path) {
                continue;
            }
            match is_binary(self.fs.as_ref(), &path) {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            }
            let text = match self.fs.read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping non-text file");
                    continue;
                }
            };
            let display_path = self.display_path(&path);
            chunks.extend(chunk_file(
                &self.run_id,
                &service.id,
                &display_path,
                &text,
                self.max_chunk_bytes,
            ));
        }

        Ok(chunks)
    }

    fn display_path(&self, path: &Path) -> PathBuf {
        self.project_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcgraph_core::MockFileSystem;
    use svcgraph_llm::{HashingEmbedder, MockEmbeddingClient, MockLLMClient, MockResponse};
    use svcgraph_store::InMemoryVectorStore;

    fn shop() -> Arc<MockFileSystem> {
        let fs = MockFileSystem::with_root(PathBuf::from("/shop"));
        fs.add_file(
            "orders/src/gatewayClient.ts",
            "export async function listRoutes() {\n  return fetch('http://gateway:8080/routes');\n}\n",
        );
        fs.add_file("orders/src/db.ts", "const pool = new Pool({ connectionString: config.get('db.url') });\n");
        fs.add_file("orders/package-lock.json", "{\"lockfileVersion\": 3}");
        fs.add_file("orders/node_modules/pg/index.js", "module.exports = {}");
        fs.add_binary("orders/assets/logo.bin", &[0x89, 0x00, 0x01]);
        fs.add_file("gateway/src/server.ts", "app.listen(8080);\n");
        fs.add_file("config/gateway.yml", "db:\n  url: postgres://db/gateway\n");
        fs.add_file("config/README.txt", "Shared configuration\n");
        Arc::new(fs)
    }

    fn retriever(fs: Arc<MockFileSystem>, embedder: Arc<dyn EmbeddingClient>) -> CodeRetriever {
        CodeRetriever::new(fs, embedder, Arc::new(InMemoryVectorStore::new()), "run1")
            .with_project_root("/shop")
    }

    #[tokio::test]
    async fn test_index_skips_blacklisted_and_binary_files() {
        let r = retriever(shop(), Arc::new(HashingEmbedder::default()));
        r.prepare().await.unwrap();

        let orders = Service::new("orders").with_source_root("/shop/orders");
        assert_eq!(r.index(&orders).await.unwrap(), 2);

        let chunks = r.retrieve("http client call", Some("orders"), 10).await.unwrap();
        let paths: Vec<_> = chunks.iter().map(|c| c.path.clone()).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&PathBuf::from("orders/src/gatewayClient.ts")));
        assert!(paths.contains(&PathBuf::from("orders/src/db.ts")));
    }

    #[tokio::test]
    async fn test_retrieve_ranks_and_scopes() {
        let r = retriever(shop(), Arc::new(HashingEmbedder::default()));
        r.prepare().await.unwrap();
        r.index(&Service::new("orders").with_source_root("/shop/orders"))
            .await
            .unwrap();
        r.index(&Service::new("gateway").with_source_root("/shop/gateway"))
            .await
            .unwrap();

        let top = r.retrieve("fetch gateway routes", Some("orders"), 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, PathBuf::from("orders/src/gatewayClient.ts"));

        let gateway_only = r.retrieve("listen", Some("gateway"), 10).await.unwrap();
        assert!(gateway_only.iter().all(|c| c.service == "gateway"));

        let everything = r.retrieve("listen", None, 10).await.unwrap();
        assert_eq!(everything.len(), 3);

        assert!(r.retrieve("listen", None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_files_follow_their_owner() {
        let fs = shop();
        let services = vec![
            Service::new("gateway").with_source_root("/shop/gateway"),
            Service::new("orders").with_source_root("/shop/orders"),
        ];
        let catalog = ConfigCatalog::build(fs.as_ref(), Path::new("/shop/config"), &services);
        let r = retriever(fs, Arc::new(HashingEmbedder::default())).with_catalog(Arc::new(catalog));
        r.prepare().await.unwrap();

        assert_eq!(r.index(&services[0]).await.unwrap(), 2);

        let mut config = Service::new("config").with_source_root("/shop/config");
        config.is_config_center = true;
        assert_eq!(r.index(&config).await.unwrap(), 1);

        let gateway = r.retrieve("db url", Some("gateway"), 10).await.unwrap();
        assert!(gateway
            .iter()
            .any(|c| c.path == PathBuf::from("config/gateway.yml")));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_surfaced() {
        let embedder = MockEmbeddingClient::default();
        embedder.fail_when_contains("gateway:8080");
        let r = retriever(shop(), Arc::new(embedder));
        r.prepare().await.unwrap();

        let err = r
            .index(&Service::new("orders").with_source_root("/shop/orders"))
            .await
            .unwrap_err();
        match err {
            RetrievalError::EmbeddingUnavailable { service, .. } => assert_eq!(service, "orders"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_prebuilt_service_has_nothing_to_index() {
        let r = retriever(shop(), Arc::new(HashingEmbedder::default()));
        r.prepare().await.unwrap();
        let redis = Service::new("redis").with_image("redis:7");
        assert_eq!(r.index(&redis).await.unwrap(), 0);
    }

    #[test]
    fn test_collection_is_scoped_to_run() {
        let r = retriever(shop(), Arc::new(HashingEmbedder::default()));
        assert_eq!(r.collection(), "chunks_run1");
    }

    #[tokio::test]
    async fn test_interpreter_description_is_embedded() {
        let llm = Arc::new(MockLLMClient::new());
        llm.route(
            ["listRoutes"],
            MockResponse::text("Lists routes through the HTTP API of the gateway service."),
        );
        llm.route(
            ["connectionString"],
            MockResponse::text("Opens a Postgres connection pool from the db.url setting."),
        );
        let embedder = Arc::new(MockEmbeddingClient::default());
        let r = retriever(shop(), embedder.clone())
            .with_interpreter(Arc::new(ChunkInterpreter::new(llm.clone())));
        r.prepare().await.unwrap();

        let orders = Service::new("orders").with_source_root("/shop/orders");
        assert_eq!(r.index(&orders).await.unwrap(), 2);
        assert_eq!(llm.request_count(), 2);

        let embedded = embedder.embedded_texts();
        assert!(embedded
            .iter()
            .any(|t| t.ends_with("Lists routes through the HTTP API of the gateway service.")));
        assert!(!embedded.iter().any(|t| t.contains("connectionString")));

        let chunks = r.retrieve("postgres pool", Some("orders"), 10).await.unwrap();
        let db = chunks
            .iter()
            .find(|c| c.path == PathBuf::from("orders/src/db.ts"))
            .unwrap();
        assert!(db.text.contains("connectionString"));
    }

    #[tokio::test]
    async fn test_failed_interpretation_embeds_raw_text() {
        let llm = Arc::new(MockLLMClient::new());
        llm.set_fallback(MockResponse::error(svcgraph_core::BackendError::NetworkError {
            message: "connection refused".to_string(),
        }));
        let embedder = Arc::new(MockEmbeddingClient::default());
        let r = retriever(shop(), embedder.clone())
            .with_interpreter(Arc::new(ChunkInterpreter::new(llm)));
        r.prepare().await.unwrap();

        let orders = Service::new("orders").with_source_root("/shop/orders");
        assert_eq!(r.index(&orders).await.unwrap(), 2);
        assert!(embedder
            .embedded_texts()
            .iter()
            .any(|t| t.contains("connectionString")));
    }
}
