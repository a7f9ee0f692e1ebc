//! Prompt construction from retrieved nodes.

use rag_core::{NodeWithScore, QueryBundle, RagError, Result, DEFAULT_TEXT_QA_TEMPLATE};

/// A text-QA prompt template with `{context_str}` and `{query_str}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{context_str}", "{query_str}"] {
            if !template.contains(placeholder) {
                return Err(RagError::invalid_argument(format!(
                    "prompt template is missing {}",
                    placeholder
                )));
            }
        }
        Ok(Self { template })
    }

    /// Fill the template with the node texts and the query.
    pub fn format(&self, nodes: &[NodeWithScore], query: &QueryBundle) -> String {
        self.template
            .replace("{context_str}", &build_context(nodes))
            .replace("{query_str}", &query.query_str)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEXT_QA_TEMPLATE.to_string(),
        }
    }
}

/// Node texts in order, separated by blank lines.
pub fn build_context(nodes: &[NodeWithScore]) -> String {
    nodes
        .iter()
        .map(|n| n.text())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::Node;

    #[test]
    fn test_default_template_format() {
        let nodes = vec![
            NodeWithScore::new(Node::new("X is a letter."), 0.9),
            NodeWithScore::new(Node::new("X follows W."), 0.6),
        ];
        let prompt = PromptTemplate::default().format(&nodes, &QueryBundle::new("What is X?"));

        assert!(prompt.starts_with("Context information is below.\n"));
        assert!(prompt.contains("X is a letter.\n\nX follows W."));
        assert!(prompt.ends_with("Query: What is X?\nAnswer: "));
    }

    #[test]
    fn test_template_requires_placeholders() {
        assert!(PromptTemplate::new("{query_str} only").is_err());
        let custom = PromptTemplate::new("Q={query_str} C={context_str}").unwrap();
        assert_eq!(custom.format(&[], &QueryBundle::new("q")), "Q=q C=");
    }
}
