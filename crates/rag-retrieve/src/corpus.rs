//! In-memory node corpus.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};
use ulid::Ulid;

use rag_core::{Node, RagError, Result};

/// One record in a corpus file.
#[derive(Debug, Deserialize)]
struct CorpusRecord {
    /// ULID, or any other string kept as `source_id` metadata.
    #[serde(default)]
    id: Option<String>,

    text: String,

    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl CorpusRecord {
    fn into_node(self) -> Node {
        let mut node = match self.id.as_deref().map(Ulid::from_string) {
            Some(Ok(id)) => Node::with_id(id, &self.text),
            Some(Err(_)) => {
                let source_id = self.id.clone().unwrap_or_default();
                Node::new(&self.text).with_metadata("source_id", source_id)
            }
            None => Node::new(&self.text),
        };
        node.metadata.extend(self.metadata);
        node
    }
}

/// The set of nodes retrievers search over.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    nodes: Vec<Node>,
}

impl Corpus {
    /// Build a corpus, dropping nodes whose text duplicates an earlier node.
    pub fn new(nodes: Vec<Node>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            if seen.insert(node.content_hash) {
                kept.push(node);
            } else {
                warn!(id = %node.id, hash = %node.hash_hex(), "Skipping duplicate node");
            }
        }
        Self { nodes: kept }
    }

    /// Load a corpus from a JSON array or JSON Lines file of
    /// `{"id"?, "text", "metadata"?}` records.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let corpus = Self::parse(&content).map_err(|e| RagError::Corpus {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!("Loaded {} nodes from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    /// Parse corpus text; a leading `[` selects JSON array, anything else
    /// is read as JSON Lines.
    pub fn parse(content: &str) -> Result<Self> {
        let records: Vec<CorpusRecord> = if content.trim_start().starts_with('[') {
            serde_json::from_str(content)?
        } else {
            content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<std::result::Result<_, _>>()?
        };

        if let Some(pos) = records.iter().position(|r| r.text.trim().is_empty()) {
            return Err(RagError::invalid_argument(format!(
                "record {} has empty text",
                pos + 1
            )));
        }

        Ok(Self::new(
            records.into_iter().map(CorpusRecord::into_node).collect(),
        ))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
