use super::VectorStore;
use crate::document::{Metadata, VectorDocument};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Number of matches requested per query.
// TODO: expose this as a query option instead of a fixed cap
const QUERY_RESULT_CAP: usize = 4;

/// Response fields needed to rebuild documents, always requested when the
/// caller asks for extra fields.
const REQUIRED_INCLUDE: [&str; 3] = ["embeddings", "metadatas", "distances"];

/// Include list applied by the client when a query carries none.
const DEFAULT_INCLUDE: [&str; 4] = ["embeddings", "metadatas", "documents", "distances"];

/// ChromaDB client (using REST API)
pub struct ChromaClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    name: String,
    get_or_create: bool,
}

/// A collection handle returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// Batch add payload: four parallel arrays indexed by document.
#[derive(Debug, Serialize)]
pub struct AddRequest {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadatas: Vec<Map<String, Value>>,
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryRequest {
    pub query_embeddings: Vec<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_texts: Option<Vec<String>>,
    pub n_results: usize,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_document: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
}

/// Query response: parallel arrays indexed `[query][row]`. Fields outside
/// the requested include list come back absent.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub embeddings: Option<Vec<Vec<Vec<f32>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
}

impl ChromaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build a client from `CHROMA_URL`, defaulting to a local server.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("CHROMA_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        Self::new(&base_url)
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }

    fn add_url(&self, collection_id: &str) -> String {
        format!("{}/api/v1/collections/{}/add", self.base_url, collection_id)
    }

    fn query_url(&self, collection_id: &str) -> String {
        format!("{}/api/v1/collections/{}/query", self.base_url, collection_id)
    }

    /// Fetch a collection by name, creating it if absent.
    pub async fn get_or_create_collection(&self, name: &str) -> Result<Collection> {
        let request = CreateCollectionRequest {
            name: name.to_string(),
            get_or_create: true,
        };

        let response = self
            .client
            .post(self.collections_url())
            .json(&request)
            .send()
            .await
            .context("Failed to send create collection request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chroma API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse collection response")
    }

    pub async fn add(&self, collection_id: &str, request: &AddRequest) -> Result<()> {
        let response = self
            .client
            .post(self.add_url(collection_id))
            .json(request)
            .send()
            .await
            .context("Failed to send add request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chroma API error ({}): {}", status, body);
        }

        Ok(())
    }

    pub async fn query(
        &self,
        collection_id: &str,
        mut request: QueryRequest,
    ) -> Result<QueryResponse> {
        if request.include.is_none() {
            request.include = Some(DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect());
        }

        let response = self
            .client
            .post(self.query_url(collection_id))
            .json(&request)
            .send()
            .await
            .context("Failed to send query request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chroma API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse query response")
    }
}

/// Query options for [`ChromaVectorStore`].
#[derive(Debug, Clone, Default)]
pub struct ChromaQueryOptions {
    /// Equality filter over metadata fields.
    pub where_metadata: Option<Map<String, Value>>,
    /// Filter over document text.
    pub where_document: Option<Map<String, Value>>,
    /// Extra response fields, merged after the always-requested set. When
    /// empty, no include list is sent and the client default applies.
    pub include: Vec<String>,
    /// Text queries forwarded alongside the embedding.
    pub query_texts: Vec<String>,
}

/// Vector store backed by a ChromaDB collection.
///
/// The collection is resolved with get-or-create on every call, so it is
/// created lazily on first use. Document text travels on Chroma's document
/// channel and is spliced back into metadata on the way out.
pub struct ChromaVectorStore {
    client: ChromaClient,
    collection_name: String,
}

impl ChromaVectorStore {
    pub fn new(client: ChromaClient, collection_name: &str) -> Self {
        Self {
            client,
            collection_name: collection_name.to_string(),
        }
    }

    fn build_add_request(documents: Vec<VectorDocument>) -> AddRequest {
        let mut ids = Vec::with_capacity(documents.len());
        let mut embeddings = Vec::with_capacity(documents.len());
        let mut metadatas = Vec::with_capacity(documents.len());
        let mut texts = Vec::with_capacity(documents.len());

        for document in documents {
            ids.push(document.id.to_string());
            embeddings.push(document.vector);
            let (metadata, text) = document.metadata.into_parts();
            metadatas.push(metadata);
            texts.push(text.unwrap_or_default());
        }

        AddRequest {
            ids,
            embeddings,
            metadatas,
            documents: texts,
        }
    }

    fn build_query_request(vector: &[f32], options: ChromaQueryOptions) -> QueryRequest {
        QueryRequest {
            query_embeddings: vec![vector.to_vec()],
            query_texts: if options.query_texts.is_empty() {
                None
            } else {
                Some(options.query_texts)
            },
            n_results: QUERY_RESULT_CAP,
            where_metadata: options.where_metadata,
            where_document: options.where_document,
            include: Self::build_include(&options.include),
        }
    }

    /// Merge caller-requested fields after the required set, deduplicated.
    /// An empty caller list yields no include list at all.
    fn build_include(extra: &[String]) -> Option<Vec<String>> {
        if extra.is_empty() {
            return None;
        }

        let mut include: Vec<String> = REQUIRED_INCLUDE.iter().map(|s| s.to_string()).collect();
        for field in extra {
            if !include.iter().any(|f| f == field) {
                include.push(field.clone());
            }
        }

        Some(include)
    }

    fn documents_from_response(response: QueryResponse) -> Result<Vec<VectorDocument>> {
        let ids = response.ids.into_iter().next().unwrap_or_default();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = response
            .embeddings
            .and_then(|batches| batches.into_iter().next())
            .context("Query response did not include embeddings")?;
        let metadatas = response
            .metadatas
            .and_then(|batches| batches.into_iter().next())
            .unwrap_or_default();
        let texts = response
            .documents
            .and_then(|batches| batches.into_iter().next())
            .unwrap_or_default();
        let distances = response
            .distances
            .and_then(|batches| batches.into_iter().next())
            .unwrap_or_default();

        let mut documents = Vec::with_capacity(ids.len());
        for (i, id) in ids.into_iter().enumerate() {
            let id = Uuid::parse_str(&id).context("Failed to parse document id")?;
            let vector = embeddings
                .get(i)
                .cloned()
                .context("Query response missing embedding row")?;

            let mut metadata =
                Metadata::from(metadatas.get(i).cloned().flatten().unwrap_or_default());
            if let Some(Some(text)) = texts.get(i) {
                metadata.set_text(text);
            }

            documents.push(VectorDocument {
                id,
                vector,
                metadata,
                score: distances.get(i).copied(),
            });
        }

        Ok(documents)
    }
}

#[async_trait::async_trait]
impl VectorStore for ChromaVectorStore {
    type QueryOptions = ChromaQueryOptions;

    async fn add(&self, documents: Vec<VectorDocument>) -> Result<()> {
        tracing::debug!(
            "Adding {} documents to collection: {}",
            documents.len(),
            self.collection_name
        );

        let request = Self::build_add_request(documents);
        let collection = self
            .client
            .get_or_create_collection(&self.collection_name)
            .await?;

        self.client.add(&collection.id, &request).await
    }

    async fn query(
        &self,
        vector: &[f32],
        options: ChromaQueryOptions,
    ) -> Result<Vec<VectorDocument>> {
        let request = Self::build_query_request(vector, options);
        let collection = self
            .client
            .get_or_create_collection(&self.collection_name)
            .await?;

        let response = self.client.query(&collection.id, request).await?;
        Self::documents_from_response(response)
    }
}
