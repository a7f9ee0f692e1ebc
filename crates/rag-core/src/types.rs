//! Core domain types for the RAG pipeline.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Result;

/// Text emitted when a query has no source nodes to answer from.
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// A unit of retrievable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Node text content.
    pub text: String,

    /// Source metadata (file name, page, url, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Blake3 hash of the text.
    #[serde(with = "serde_hash")]
    pub content_hash: [u8; 32],
}

impl Node {
    /// Create a new node with a fresh id.
    pub fn new(text: &str) -> Self {
        Self::with_id(Ulid::new(), text)
    }

    /// Create a node with a known id.
    pub fn with_id(id: Ulid, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            metadata: HashMap::new(),
            content_hash: *blake3::hash(text.as_bytes()).as_bytes(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Content hash as lowercase hex.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.content_hash)
    }
}

/// A node paired with its relevance score (higher is better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeWithScore {
    pub node: Node,
    pub score: f32,
}

impl NodeWithScore {
    pub fn new(node: Node, score: f32) -> Self {
        Self { node, score }
    }

    pub fn id(&self) -> Ulid {
        self.node.id
    }

    pub fn text(&self) -> &str {
        &self.node.text
    }
}

/// The query handed to retrievers and postprocessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBundle {
    pub query_str: String,
}

impl QueryBundle {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query_str: query.into(),
        }
    }
}

impl From<&str> for QueryBundle {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl fmt::Display for QueryBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_str)
    }
}

/// Incremental text chunks produced by a streaming language model.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Render source nodes as `> Source (Doc id: ...): ...` lines.
///
/// Texts longer than `length` characters are cut and suffixed with `...`.
pub fn format_sources(nodes: &[NodeWithScore], length: usize) -> String {
    nodes
        .iter()
        .map(|n| {
            format!(
                "> Source (Doc id: {}): {}",
                n.id(),
                truncate_text(n.text(), length)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cut `text` to at most `length` characters, appending `...` when cut.
pub fn truncate_text(text: &str, length: usize) -> String {
    match text.char_indices().nth(length) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// A fully generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Generated text.
    pub text: String,

    /// Nodes the answer was synthesized from.
    pub source_nodes: Vec<NodeWithScore>,
}

impl Response {
    pub fn new(text: impl Into<String>, source_nodes: Vec<NodeWithScore>) -> Self {
        Self {
            text: text.into(),
            source_nodes,
        }
    }

    pub fn get_formatted_sources(&self, length: usize) -> String {
        format_sources(&self.source_nodes, length)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An answer whose text arrives in chunks.
///
/// Chunks are pulled from the underlying stream as the caller asks for them;
/// everything received so far is kept in `response_txt`.
pub struct StreamingResponse {
    stream: Option<TokenStream>,
    response_txt: String,
    pub source_nodes: Vec<NodeWithScore>,
}

impl StreamingResponse {
    pub fn new(stream: TokenStream, source_nodes: Vec<NodeWithScore>) -> Self {
        Self {
            stream: Some(stream),
            response_txt: String::new(),
            source_nodes,
        }
    }

    /// A stream that yields `text` as its only chunk.
    pub fn completed(text: impl Into<String>, source_nodes: Vec<NodeWithScore>) -> Self {
        let chunks: Vec<Result<String>> = vec![Ok(text.into())];
        Self::new(Box::pin(futures::stream::iter(chunks)), source_nodes)
    }

    /// Pull the next chunk, or `None` once the stream is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<String>> {
        let stream = self.stream.as_mut()?;
        match stream.next().await {
            Some(Ok(chunk)) => {
                self.response_txt.push_str(&chunk);
                Some(Ok(chunk))
            }
            Some(Err(e)) => {
                self.stream = None;
                Some(Err(e))
            }
            None => {
                self.stream = None;
                None
            }
        }
    }

    /// Write every remaining chunk to `out` as it arrives.
    pub async fn print_response_stream<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        while let Some(chunk) = self.next_chunk().await {
            out.write_all(chunk?.as_bytes())?;
            out.flush()?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Text received so far.
    pub fn response_txt(&self) -> &str {
        &self.response_txt
    }

    pub fn is_done(&self) -> bool {
        self.stream.is_none()
    }

    pub fn get_formatted_sources(&self, length: usize) -> String {
        format_sources(&self.source_nodes, length)
    }

    /// Drain the stream and return the complete response.
    pub async fn get_response(mut self) -> Result<Response> {
        while let Some(chunk) = self.next_chunk().await {
            chunk?;
        }
        Ok(Response::new(self.response_txt, self.source_nodes))
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("done", &self.is_done())
            .field("response_txt", &self.response_txt)
            .field("source_nodes", &self.source_nodes.len())
            .finish()
    }
}

/// Result of running a query engine.
#[derive(Debug)]
pub enum QueryResponse {
    Complete(Response),
    Streaming(StreamingResponse),
}

impl QueryResponse {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }

    pub fn source_nodes(&self) -> &[NodeWithScore] {
        match self {
            Self::Complete(r) => &r.source_nodes,
            Self::Streaming(s) => &s.source_nodes,
        }
    }

    /// Resolve to a complete response, draining any remaining stream.
    pub async fn into_response(self) -> Result<Response> {
        match self {
            Self::Complete(r) => Ok(r),
            Self::Streaming(s) => s.get_response().await,
        }
    }
}

/// Hex (de)serialization for content hashes.
mod serde_hash {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex::encode(value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid hash length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    fn scored(text: &str, score: f32) -> NodeWithScore {
        NodeWithScore::new(Node::new(text), score)
    }

    #[test]
    fn test_node_hash_tracks_text() {
        let a = Node::new("same text");
        let b = Node::new("same text");
        let c = Node::new("other text");
        assert_ne!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
        assert_eq!(a.hash_hex().len(), 64);
    }

    #[test]
    fn test_node_serde_hex_hash() {
        let node = Node::new("hello").with_metadata("file_name", "a.txt");
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(&node.hash_hex()));
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("abc", 3), "abc");
        assert_eq!(truncate_text("héllo", 2), "hé...");
    }

    #[test]
    fn test_format_sources() {
        let nodes = vec![scored("first source", 0.9), scored("second", 0.5)];
        let out = format_sources(&nodes, 5);
        let parts: Vec<&str> = out.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            format!("> Source (Doc id: {}): first...", nodes[0].id())
        );
        assert!(parts[1].ends_with("): secon..."));
    }

    #[tokio::test]
    async fn test_streaming_response_accumulates() {
        let chunks: Vec<Result<String>> = vec![Ok("Hello".into()), Ok(", world".into())];
        let stream: TokenStream = Box::pin(futures::stream::iter(chunks));
        let mut resp = StreamingResponse::new(stream, vec![scored("ctx", 1.0)]);

        let mut out = Vec::new();
        resp.print_response_stream(&mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Hello, world\n");
        assert_eq!(resp.response_txt(), "Hello, world");
        assert!(resp.is_done());
    }

    #[tokio::test]
    async fn test_streaming_response_error_stops_stream() {
        let chunks: Vec<Result<String>> = vec![
            Ok("partial".into()),
            Err(RagError::streaming("connection reset")),
            Ok("never".into()),
        ];
        let stream: TokenStream = Box::pin(futures::stream::iter(chunks));
        let resp = StreamingResponse::new(stream, Vec::new());

        let err = resp.get_response().await.unwrap_err();
        assert_eq!(err.error_code(), "STREAMING_ERROR");
    }

    #[tokio::test]
    async fn test_completed_stream_prints_text() {
        let mut resp = StreamingResponse::completed(EMPTY_RESPONSE, Vec::new());
        let mut out = Vec::new();
        resp.print_response_stream(&mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Empty Response\n");
        assert_eq!(resp.response_txt(), EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn test_query_response_into_response() {
        let stream: TokenStream = Box::pin(futures::stream::iter(vec![
            Ok::<_, RagError>("a".to_string()),
            Ok("b".to_string()),
        ]));
        let qr = QueryResponse::Streaming(StreamingResponse::new(stream, Vec::new()));
        assert!(qr.is_streaming());
        let resp = qr.into_response().await.unwrap();
        assert_eq!(resp.text, "ab");
    }
}
