pub mod chroma;
pub mod pinecone;

use crate::document::VectorDocument;
use anyhow::Result;

/// Error raised before any network call when a required option is missing.
///
/// Remote failures are not wrapped in this type; they propagate as the
/// underlying `reqwest`/`serde_json` errors.
#[derive(Debug, thiserror::Error)]
#[error("invalid argument: {0}")]
pub struct InvalidArgument(pub String);

/// Uniform surface over vector store backends
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend-specific query options.
    type QueryOptions: Default + Send + Sync;

    /// Add a batch of documents to the store.
    async fn add(&self, documents: Vec<VectorDocument>) -> Result<()>;

    /// Add a single document as a one-element batch.
    async fn add_one(&self, document: VectorDocument) -> Result<()> {
        self.add(vec![document]).await
    }

    /// Search for the documents nearest to `vector`, best match first.
    async fn query(
        &self,
        vector: &[f32],
        options: Self::QueryOptions,
    ) -> Result<Vec<VectorDocument>>;
}

/// Extension for backends whose index lifecycle is managed through the store.
#[async_trait::async_trait]
pub trait ManagedVectorStore: VectorStore {
    /// Provision the backing index.
    async fn setup(&self, options: SetupOptions) -> Result<()>;

    /// Delete the backing index.
    async fn drop(&self, options: DropOptions) -> Result<()>;
}

/// Options for [`ManagedVectorStore::setup`].
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Embedding dimension of the index. Required; `setup` fails with
    /// [`InvalidArgument`] when unset.
    pub dimension: Option<usize>,
    /// Distance metric; the backend default applies when unset.
    pub metric: Option<String>,
    /// Cloud provider for serverless indexes; defaults to `aws`.
    pub cloud: Option<String>,
    /// Cloud region for serverless indexes; defaults to `us-east-1`.
    pub region: Option<String>,
}

/// Options for [`ManagedVectorStore::drop`]. Deletion always targets the
/// whole index; no options are currently honored.
#[derive(Debug, Clone, Default)]
pub struct DropOptions {}
