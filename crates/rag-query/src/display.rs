//! Text rendering of nodes and responses.

use std::io::Write;

use rag_core::{truncate_text, DisplayConfig, NodeWithScore, Response, Result};

/// Renders nodes and responses as Markdown-flavoured text.
#[derive(Debug, Clone, Copy)]
pub struct NodeDisplay {
    /// Characters of node text shown.
    pub source_length: usize,

    /// Include node metadata.
    pub show_metadata: bool,
}

impl Default for NodeDisplay {
    fn default() -> Self {
        Self {
            source_length: 100,
            show_metadata: true,
        }
    }
}

impl From<&DisplayConfig> for NodeDisplay {
    fn from(config: &DisplayConfig) -> Self {
        Self {
            source_length: config.source_length,
            show_metadata: config.show_metadata,
        }
    }
}

impl NodeDisplay {
    /// Write one node: id, score, truncated text and metadata.
    pub fn source_node<W: Write + ?Sized>(&self, out: &mut W, node: &NodeWithScore) -> Result<()> {
        writeln!(out, "**Node ID:** {}", node.id())?;
        writeln!(out, "**Similarity:** {}", node.score)?;
        writeln!(
            out,
            "**Text:** {}",
            truncate_text(node.text(), self.source_length)
        )?;
        if self.show_metadata && !node.node.metadata.is_empty() {
            // sorted for stable output
            let metadata: std::collections::BTreeMap<_, _> = node.node.metadata.iter().collect();
            writeln!(out, "**Metadata:** {}", serde_json::to_string(&metadata)?)?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Write every node in order.
    pub fn nodes<W: Write + ?Sized>(&self, out: &mut W, nodes: &[NodeWithScore]) -> Result<()> {
        for node in nodes {
            self.source_node(out, node)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write a final response, optionally followed by its sources.
    pub fn response<W: Write + ?Sized>(
        &self,
        out: &mut W,
        response: &Response,
        show_source: bool,
    ) -> Result<()> {
        writeln!(out, "**`Final Response:`** {}", response.text)?;
        if show_source {
            let total = response.source_nodes.len();
            for (i, node) in response.source_nodes.iter().enumerate() {
                writeln!(out, "---")?;
                writeln!(out, "**`Source Node {}/{}`**", i + 1, total)?;
                self.source_node(out, node)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}
