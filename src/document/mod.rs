use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Reserved metadata key holding a document's free text.
///
/// Backends with a dedicated document channel (Chroma) store this entry
/// separately from the rest of the metadata; backends without one (Pinecone)
/// keep it inline.
pub const TEXT_KEY: &str = "_text";

/// Key-value attributes stored alongside a vector, used for filtering.
///
/// Values are arbitrary JSON scalars or arrays. The [`TEXT_KEY`] entry is
/// expected to be a string and is accessible through [`Metadata::text`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The free text stored under [`TEXT_KEY`], if any.
    pub fn text(&self) -> Option<&str> {
        self.0.get(TEXT_KEY).and_then(|v| v.as_str())
    }

    pub fn set_text(&mut self, text: &str) {
        self.0
            .insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }

    /// Consume the metadata, separating the [`TEXT_KEY`] entry from the rest.
    pub fn into_parts(mut self) -> (Map<String, Value>, Option<String>) {
        let text = match self.0.remove(TEXT_KEY) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        (self.0, text)
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A document held in a vector store: an embedding vector plus the metadata
/// stored with it.
///
/// Documents are built by the caller before being added to a store and are
/// never mutated by the adapters; query results are freshly constructed from
/// each response row.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    /// Relevance reported by the backend, populated only on query results.
    /// Chroma reports a distance (lower is closer), Pinecone a similarity
    /// score (higher is closer); neither is translated.
    pub score: Option<f32>,
}

impl VectorDocument {
    pub fn new(id: Uuid, vector: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id,
            vector,
            metadata,
            score: None,
        }
    }
}
