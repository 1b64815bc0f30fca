//! Uniform vector store adapters for ChromaDB and Pinecone.
//!
//! Both backends are reached through the same capability surface: the
//! [`VectorStore`] trait covers adding documents and querying by vector, and
//! [`ManagedVectorStore`] extends it with index provisioning and deletion for
//! backends that manage their own infrastructure. The adapters only translate
//! between [`VectorDocument`] and each service's wire shape; similarity
//! search, storage, and retries all belong to the remote service.
//!
//! # Example
//!
//! ```rust,no_run
//! use vector_store_bridge::{ChromaClient, ChromaQueryOptions, ChromaVectorStore, VectorStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = ChromaVectorStore::new(ChromaClient::from_env(), "my_collection");
//! let results = store.query(&[0.1, 0.2], ChromaQueryOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod store;

pub use document::{Metadata, VectorDocument, TEXT_KEY};
pub use store::chroma::{ChromaClient, ChromaQueryOptions, ChromaVectorStore};
pub use store::pinecone::{PineconeClient, PineconeQueryOptions, PineconeVectorStore};
pub use store::{DropOptions, InvalidArgument, ManagedVectorStore, SetupOptions, VectorStore};
