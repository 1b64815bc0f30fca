use super::{DropOptions, InvalidArgument, ManagedVectorStore, SetupOptions, VectorStore};
use crate::document::{Metadata, VectorDocument};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Matches requested per query when neither the caller nor the constructor
/// overrides it.
const DEFAULT_TOP_K: usize = 3;

const DEFAULT_CONTROLLER_HOST: &str = "https://api.pinecone.io";

/// Serverless spec defaults applied when setup options leave them unset.
const DEFAULT_CLOUD: &str = "aws";
const DEFAULT_REGION: &str = "us-east-1";

/// Pinecone client (using REST API)
///
/// Index lifecycle calls go to the controller host; data operations go to
/// the per-index data-plane host, e.g.
/// `https://my-index-abc123.svc.us-east-1.pinecone.io`.
pub struct PineconeClient {
    client: Client,
    api_key: String,
    controller_host: String,
    index_host: String,
}

#[derive(Debug, Serialize)]
pub struct CreateIndexRequest {
    pub name: String,
    pub dimension: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    pub spec: IndexSpec,
}

#[derive(Debug, Serialize)]
pub struct IndexSpec {
    pub serverless: ServerlessSpec,
}

#[derive(Debug, Serialize)]
pub struct ServerlessSpec {
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Serialize)]
pub struct UpsertRequest {
    pub vectors: Vec<VectorRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// One upserted vector: id, raw values, and the full metadata map.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filter: Map<String, Value>,
    pub include_values: bool,
    pub include_metadata: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl PineconeClient {
    pub fn new(api_key: &str, index_host: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            controller_host: DEFAULT_CONTROLLER_HOST.to_string(),
            index_host: index_host.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_controller_host(mut self, host: &str) -> Self {
        self.controller_host = host.trim_end_matches('/').to_string();
        self
    }

    /// Build a client from `PINECONE_API_KEY`, `PINECONE_INDEX_HOST`, and
    /// optionally `PINECONE_CONTROLLER_HOST`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY").context("PINECONE_API_KEY is not set")?;
        let index_host =
            std::env::var("PINECONE_INDEX_HOST").context("PINECONE_INDEX_HOST is not set")?;

        let mut client = Self::new(&api_key, &index_host);
        if let Ok(host) = std::env::var("PINECONE_CONTROLLER_HOST") {
            client = client.with_controller_host(&host);
        }

        Ok(client)
    }

    fn indexes_url(&self) -> String {
        format!("{}/indexes", self.controller_host)
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/indexes/{}", self.controller_host, name)
    }

    fn upsert_url(&self) -> String {
        format!("{}/vectors/upsert", self.index_host)
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.index_host)
    }

    pub async fn create_serverless_index(&self, request: &CreateIndexRequest) -> Result<()> {
        let response = self
            .client
            .post(self.indexes_url())
            .header("Api-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send create index request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone API error ({}): {}", status, body);
        }

        Ok(())
    }

    pub async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.index_url(name))
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .context("Failed to send delete index request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone API error ({}): {}", status, body);
        }

        Ok(())
    }

    pub async fn upsert(&self, request: &UpsertRequest) -> Result<()> {
        let response = self
            .client
            .post(self.upsert_url())
            .header("Api-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send upsert request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone API error ({}): {}", status, body);
        }

        Ok(())
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let response = self
            .client
            .post(self.query_url())
            .header("Api-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send query request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse query response")
    }
}

/// Query options for [`PineconeVectorStore`]. Unset fields fall back to the
/// values configured at construction.
#[derive(Debug, Clone, Default)]
pub struct PineconeQueryOptions {
    pub namespace: Option<String>,
    pub filter: Option<Map<String, Value>>,
    pub top_k: Option<usize>,
}

/// Vector store backed by a Pinecone serverless index.
///
/// Unlike Chroma there is no separate document channel, so metadata is
/// stored whole, reserved text key included.
pub struct PineconeVectorStore {
    client: PineconeClient,
    index_name: String,
    namespace: Option<String>,
    filter: Map<String, Value>,
    top_k: usize,
}

impl PineconeVectorStore {
    pub fn new(client: PineconeClient, index_name: &str) -> Self {
        Self {
            client,
            index_name: index_name.to_string(),
            namespace: None,
            filter: Map::new(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Namespace used for adds and as the query default.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Metadata filter applied to queries that carry none.
    pub fn with_filter(mut self, filter: Map<String, Value>) -> Self {
        self.filter = filter;
        self
    }

    /// Match count applied to queries that carry none.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn build_records(documents: Vec<VectorDocument>) -> Vec<VectorRecord> {
        documents
            .into_iter()
            .map(|document| VectorRecord {
                id: document.id.to_string(),
                values: document.vector,
                metadata: document.metadata,
            })
            .collect()
    }

    fn build_query_request(&self, vector: &[f32], options: PineconeQueryOptions) -> QueryRequest {
        QueryRequest {
            vector: vector.to_vec(),
            top_k: options.top_k.unwrap_or(self.top_k),
            namespace: options.namespace.or_else(|| self.namespace.clone()),
            filter: options.filter.unwrap_or_else(|| self.filter.clone()),
            include_values: true,
            include_metadata: true,
        }
    }

    /// Matches arrive score-ranked from the service; order is preserved.
    fn documents_from_matches(matches: Vec<QueryMatch>) -> Result<Vec<VectorDocument>> {
        matches
            .into_iter()
            .map(|m| {
                Ok(VectorDocument {
                    id: Uuid::parse_str(&m.id).context("Failed to parse match id")?,
                    vector: m.values,
                    metadata: m.metadata.unwrap_or_default(),
                    score: Some(m.score),
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl VectorStore for PineconeVectorStore {
    type QueryOptions = PineconeQueryOptions;

    async fn add(&self, documents: Vec<VectorDocument>) -> Result<()> {
        let records = Self::build_records(documents);

        // The upsert endpoint rejects an empty vector list.
        if records.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            "Upserting {} records into index: {}",
            records.len(),
            self.index_name
        );

        let request = UpsertRequest {
            vectors: records,
            namespace: self.namespace.clone(),
        };

        self.client.upsert(&request).await
    }

    async fn query(
        &self,
        vector: &[f32],
        options: PineconeQueryOptions,
    ) -> Result<Vec<VectorDocument>> {
        let request = self.build_query_request(vector, options);
        let response = self.client.query(&request).await?;
        Self::documents_from_matches(response.matches)
    }
}

#[async_trait::async_trait]
impl ManagedVectorStore for PineconeVectorStore {
    async fn setup(&self, options: SetupOptions) -> Result<()> {
        let dimension = options
            .dimension
            .ok_or_else(|| InvalidArgument("the \"dimension\" option is required".to_string()))?;

        tracing::info!("Creating serverless index: {}", self.index_name);

        let request = CreateIndexRequest {
            name: self.index_name.clone(),
            dimension,
            metric: options.metric,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: options.cloud.unwrap_or_else(|| DEFAULT_CLOUD.to_string()),
                    region: options.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
                },
            },
        };

        self.client.create_serverless_index(&request).await
    }

    async fn drop(&self, _options: DropOptions) -> Result<()> {
        tracing::info!("Deleting index: {}", self.index_name);
        self.client.delete_index(&self.index_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Client aimed at an unroutable endpoint; any request through it fails,
    /// so reaching Ok proves no network call was made.
    fn offline_store() -> PineconeVectorStore {
        let client = PineconeClient::new("test-key", "http://127.0.0.1:9")
            .with_controller_host("http://127.0.0.1:9");
        PineconeVectorStore::new(client, "test-index")
    }

    #[tokio::test]
    async fn test_add_empty_batch_is_a_no_op() {
        let store = offline_store();
        store.add(Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_requires_dimension() {
        let store = offline_store();
        let err = store.setup(SetupOptions::default()).await.unwrap_err();

        let invalid = err.downcast_ref::<InvalidArgument>();
        assert!(invalid.is_some(), "unexpected error: {}", err);
        assert!(err.to_string().contains("dimension"));
    }

    #[test]
    fn test_build_records_keeps_text_in_metadata() {
        let id = Uuid::new_v4();
        let mut metadata = Metadata::new();
        metadata.insert("lang", "en");
        metadata.set_text("hello");

        let records =
            PineconeVectorStore::build_records(vec![VectorDocument::new(id, vec![0.1], metadata)]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id.to_string());
        assert_eq!(records[0].values, vec![0.1]);

        let serialized = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(serialized["metadata"]["_text"], json!("hello"));
        assert_eq!(serialized["metadata"]["lang"], json!("en"));
    }

    #[test]
    fn test_query_request_defaults() {
        let store = offline_store();
        let request = store.build_query_request(&[0.1, 0.2], PineconeQueryOptions::default());

        assert_eq!(request.top_k, 3);
        assert_eq!(request.namespace, None);
        assert!(request.filter.is_empty());
        assert!(request.include_values);
        assert!(request.include_metadata);
    }

    #[test]
    fn test_query_request_overrides() {
        let mut filter = Map::new();
        filter.insert("lang".to_string(), json!("en"));

        let store = offline_store().with_namespace("prod").with_top_k(5);
        let options = PineconeQueryOptions {
            namespace: Some("staging".to_string()),
            filter: Some(filter.clone()),
            top_k: Some(10),
        };

        let request = store.build_query_request(&[0.1], options);
        assert_eq!(request.top_k, 10);
        assert_eq!(request.namespace.as_deref(), Some("staging"));
        assert_eq!(request.filter, filter);
    }

    #[test]
    fn test_query_request_falls_back_to_constructor_defaults() {
        let store = offline_store().with_namespace("prod").with_top_k(5);
        let request = store.build_query_request(&[0.1], PineconeQueryOptions::default());

        assert_eq!(request.top_k, 5);
        assert_eq!(request.namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn test_query_request_serializes_camel_case() {
        let store = offline_store();
        let request = store.build_query_request(&[0.1], PineconeQueryOptions::default());
        let value = serde_json::to_value(&request).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object["topK"], json!(3));
        assert_eq!(object["includeValues"], json!(true));
        assert_eq!(object["includeMetadata"], json!(true));
        assert!(!object.contains_key("filter"));
        assert!(!object.contains_key("namespace"));
    }

    #[test]
    fn test_documents_from_matches_preserves_order_and_score() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let matches = vec![
            QueryMatch {
                id: first.to_string(),
                score: 0.9,
                values: vec![0.1, 0.2],
                metadata: Some(Metadata::from(
                    json!({"lang": "en", "_text": "hello"}).as_object().unwrap().clone(),
                )),
            },
            QueryMatch {
                id: second.to_string(),
                score: 0.4,
                values: vec![0.3, 0.4],
                metadata: None,
            },
        ];

        let documents = PineconeVectorStore::documents_from_matches(matches).unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].id, first);
        assert_eq!(documents[0].vector, vec![0.1, 0.2]);
        assert_eq!(documents[0].metadata.text(), Some("hello"));
        assert_eq!(documents[0].score, Some(0.9));
        assert_eq!(documents[1].id, second);
        assert!(documents[1].metadata.is_empty());
        assert_eq!(documents[1].score, Some(0.4));
    }

    #[test]
    fn test_documents_from_matches_rejects_malformed_id() {
        let matches = vec![QueryMatch {
            id: "not-a-uuid".to_string(),
            score: 0.5,
            values: vec![],
            metadata: None,
        }];

        assert!(PineconeVectorStore::documents_from_matches(matches).is_err());
    }
}
