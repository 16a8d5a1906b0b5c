use super::{GraphStore, NodeRef, Props};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use svcgraph_core::{GraphAuth, GraphStoreSettings, PersistenceError, RetryPolicy};
use tracing::debug;

/// Writes through the Neo4j HTTP transactional endpoint
/// (`POST /db/<database>/tx/commit`), one auto-committed statement per upsert.
#[derive(Debug)]
pub struct Neo4jHttpStore {
    client: reqwest::Client,
    commit_url: String,
    auth: GraphAuth,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    errors: Vec<CommitError>,
}

#[derive(Deserialize)]
struct CommitError {
    code: String,
    message: String,
}

/// Labels and relationship types cannot be query parameters, so they are
/// restricted to identifier characters and backtick-quoted.
fn quote_identifier(raw: &str) -> Result<String, PersistenceError> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PersistenceError::Rejected(format!(
            "invalid label or relationship type {:?}",
            raw
        )));
    }
    Ok(format!("`{}`", raw))
}

/// Nodes merge on `(label, project, id)`. A null prop removes the property.
fn node_statement(label: &str, extra_labels: &[&str]) -> Result<String, PersistenceError> {
    let mut statement = format!(
        "MERGE (n:{} {{project: $project, id: $id}}) SET n += $props",
        quote_identifier(label)?
    );
    for extra in extra_labels {
        statement.push_str(&format!(" SET n:{}", quote_identifier(extra)?));
    }
    Ok(statement)
}

fn edge_statement(
    source_label: &str,
    target_label: &str,
    rel_type: &str,
) -> Result<String, PersistenceError> {
    Ok(format!(
        "MATCH (a:{} {{project: $source_project, id: $source}}) \
         MATCH (b:{} {{project: $target_project, id: $target}}) \
         MERGE (a)-[r:{}]->(b) SET r = $props",
        quote_identifier(source_label)?,
        quote_identifier(target_label)?,
        quote_identifier(rel_type)?
    ))
}

impl Neo4jHttpStore {
    pub fn new(
        settings: &GraphStoreSettings,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, PersistenceError> {
        let url = settings.url.as_deref().ok_or_else(|| {
            PersistenceError::PersistenceUnavailable("no graph store URL configured".to_string())
        })?;
        if let GraphAuth::Kerberos { .. } = settings.auth {
            return Err(PersistenceError::Rejected(
                "kerberos authentication is not available over HTTP".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistenceError::PersistenceUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            commit_url: format!(
                "{}/db/{}/tx/commit",
                url.trim_end_matches('/'),
                settings.database
            ),
            auth: settings.auth.clone(),
            retry,
        })
    }

    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }

    async fn commit_once(&self, body: &Value) -> Result<(), PersistenceError> {
        let mut request = self.client.post(&self.commit_url).json(body);
        request = match &self.auth {
            GraphAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
            GraphAuth::Bearer { token } => request.bearer_auth(token),
            GraphAuth::None | GraphAuth::Kerberos { .. } => request,
        };

        let res = request
            .send()
            .await
            .map_err(|e| PersistenceError::PersistenceUnavailable(e.to_string()))?;

        let status = res.status();
        if status.is_server_error() {
            return Err(PersistenceError::PersistenceUnavailable(format!(
                "graph store answered {}",
                status
            )));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected(format!("{}: {}", status, body)));
        }

        let response: CommitResponse = res
            .json()
            .await
            .map_err(|e| PersistenceError::PersistenceUnavailable(e.to_string()))?;
        match response.errors.into_iter().next() {
            Some(err) if err.code.contains("TransientError") => Err(
                PersistenceError::PersistenceUnavailable(format!("{}: {}", err.code, err.message)),
            ),
            Some(err) => Err(PersistenceError::Rejected(format!(
                "{}: {}",
                err.code, err.message
            ))),
            None => Ok(()),
        }
    }

    async fn run(&self, statement: String, parameters: Value) -> Result<(), PersistenceError> {
        debug!(statement = %statement, "Committing graph statement");
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });
        self.retry
            .run("graph-commit", || self.commit_once(&body))
            .await
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn upsert_node(
        &self,
        node: NodeRef<'_>,
        extra_labels: &[&str],
        props: Props,
    ) -> Result<(), PersistenceError> {
        let statement = node_statement(node.label, extra_labels)?;
        self.run(
            statement,
            json!({ "project": node.project, "id": node.id, "props": props }),
        )
        .await
    }

    async fn upsert_edge(
        &self,
        source: NodeRef<'_>,
        target: NodeRef<'_>,
        rel_type: &str,
        props: Props,
    ) -> Result<(), PersistenceError> {
        let statement = edge_statement(source.label, target.label, rel_type)?;
        self.run(
            statement,
            json!({
                "source_project": source.project,
                "source": source.id,
                "target_project": target.project,
                "target": target.id,
                "props": props
            }),
        )
        .await
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.run("RETURN 1".to_string(), json!({})).await
    }

    fn name(&self) -> &str {
        "neo4j-http"
    }
}
