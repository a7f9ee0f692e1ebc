//! One-call helpers over a configured retrieval pipeline.

use std::io::Write;
use std::sync::Arc;

use tracing::info;

use rag_core::{
    Llm, NodePostprocessor, NodeWithScore, QueryBundle, QueryResponse, RagConfig, Result,
    Retriever,
};
use rag_postprocess::SimilarityPostprocessor;

use crate::display::NodeDisplay;
use crate::engine::RetrieverQueryEngine;
use crate::synth::PromptTemplate;

/// Switches for [`RagUtilities::generate_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseOptions {
    /// Drop nodes below the similarity cutoff before generation.
    pub filtering: bool,

    /// Emit the answer chunk by chunk as it is generated.
    pub streaming: bool,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            filtering: true,
            streaming: true,
        }
    }
}

/// Retrieve, rerank, filter and answer with shared collaborators.
///
/// Holds no per-query state; every call runs its own
/// retrieve → rerank → (filter) → generate/display pass. Output goes to the
/// sink passed to each call.
pub struct RagUtilities {
    retriever: Arc<dyn Retriever>,
    reranker: Arc<dyn NodePostprocessor>,
    llm: Arc<dyn Llm>,
    filter: SimilarityPostprocessor,
    template: PromptTemplate,
    display: NodeDisplay,
    echo_nodes: bool,
    defaults: ResponseOptions,
}

impl RagUtilities {
    /// Wire the collaborators together using `config` for the filter cutoff,
    /// prompt template, display settings and default response options.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        reranker: Arc<dyn NodePostprocessor>,
        llm: Arc<dyn Llm>,
        config: &RagConfig,
    ) -> Result<Self> {
        Ok(Self {
            retriever,
            reranker,
            llm,
            filter: SimilarityPostprocessor::new(config.filter.similarity_cutoff),
            template: PromptTemplate::new(config.query.template.clone())?,
            display: NodeDisplay::from(&config.display),
            echo_nodes: config.display.echo_nodes,
            defaults: ResponseOptions {
                filtering: config.query.filtering,
                streaming: config.query.streaming,
            },
        })
    }

    /// Response options taken from configuration.
    pub fn default_options(&self) -> ResponseOptions {
        self.defaults
    }

    /// Retrieve nodes for `prompt` and rerank them against the same prompt.
    ///
    /// The reranked nodes are echoed to `out` when node echo is enabled.
    pub async fn retrieve_and_rerank<W: Write + ?Sized>(
        &self,
        prompt: &str,
        out: &mut W,
    ) -> Result<Vec<NodeWithScore>> {
        let query = QueryBundle::new(prompt);
        let retrieved = self.retriever.retrieve(&query).await?;
        let reranked = self
            .reranker
            .postprocess_nodes(retrieved, Some(&query))
            .await?;

        info!("Reranked to {} nodes", reranked.len());

        if self.echo_nodes {
            self.display_nodes(&reranked, out)?;
        }
        Ok(reranked)
    }

    /// Drop nodes scoring below `threshold` (the configured cutoff when
    /// `None`), keeping survivors in order.
    ///
    /// Survivors are echoed to `out` when node echo is enabled.
    pub fn filter_nodes<W: Write + ?Sized>(
        &self,
        nodes: Vec<NodeWithScore>,
        threshold: Option<f32>,
        out: &mut W,
    ) -> Result<Vec<NodeWithScore>> {
        let filter = threshold.map_or(self.filter, SimilarityPostprocessor::new);
        let filtered = filter.filter(nodes);

        if self.echo_nodes {
            self.display_nodes(&filtered, out)?;
        }
        Ok(filtered)
    }

    /// Write each node to `out`.
    pub fn display_nodes<W: Write + ?Sized>(
        &self,
        nodes: &[NodeWithScore],
        out: &mut W,
    ) -> Result<()> {
        self.display.nodes(out, nodes)
    }

    /// Build the query engine `generate_response` uses for `options`.
    ///
    /// The reranker always runs; the similarity filter follows it only when
    /// filtering is on.
    pub fn build_engine(&self, options: ResponseOptions) -> RetrieverQueryEngine {
        let mut postprocessors: Vec<Arc<dyn NodePostprocessor>> = vec![self.reranker.clone()];
        if options.filtering {
            postprocessors.push(Arc::new(self.filter));
        }

        RetrieverQueryEngine::from_args(
            self.retriever.clone(),
            postprocessors,
            self.llm.clone(),
            options.streaming,
        )
        .with_template(self.template.clone())
    }

    /// Answer `prompt` and render the answer to `out`.
    ///
    /// When streaming, chunks are written as they arrive, followed by the
    /// formatted sources; the returned stream is already drained and holds
    /// the full text. Otherwise the complete answer is written together with
    /// its source nodes and their metadata.
    pub async fn generate_response<W: Write + ?Sized>(
        &self,
        prompt: &str,
        options: ResponseOptions,
        out: &mut W,
    ) -> Result<QueryResponse> {
        let engine = self.build_engine(options);
        let mut response = engine.query(prompt).await?;

        match &mut response {
            QueryResponse::Streaming(stream) => {
                stream.print_response_stream(out).await?;
                let sources = stream.get_formatted_sources(self.display.source_length);
                if !sources.is_empty() {
                    writeln!(out)?;
                    writeln!(out, "{}", sources)?;
                }
                out.flush()?;
            }
            QueryResponse::Complete(complete) => {
                self.display.response(out, complete, true)?;
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_core::Node;
    use rag_llm::MockLlm;
    use rag_postprocess::ScoreReranker;

    struct FixedRetriever(Vec<NodeWithScore>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, _query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn utilities(echo: bool) -> RagUtilities {
        let nodes = vec![
            NodeWithScore::new(Node::new("alpha"), 0.4),
            NodeWithScore::new(Node::new("beta"), 0.9),
        ];
        let mut config = RagConfig::default();
        config.display.echo_nodes = echo;
        RagUtilities::new(
            Arc::new(FixedRetriever(nodes)),
            Arc::new(ScoreReranker::new(5)),
            Arc::new(MockLlm::with_response("ok")),
            &config,
        )
        .unwrap()
    }

    #[test]
    fn test_default_options_follow_config() {
        let utils = utilities(false);
        assert_eq!(utils.default_options(), ResponseOptions::default());
    }

    #[test]
    fn test_build_engine_filter_toggle() {
        let utils = utilities(false);
        let with = utils.build_engine(ResponseOptions {
            filtering: true,
            streaming: false,
        });
        assert_eq!(
            with.postprocessor_names(),
            vec!["score_rerank", "similarity_cutoff"]
        );
        assert!(!with.is_streaming());

        let without = utils.build_engine(ResponseOptions {
            filtering: false,
            streaming: true,
        });
        assert_eq!(without.postprocessor_names(), vec!["score_rerank"]);
        assert!(without.is_streaming());
    }

    #[tokio::test]
    async fn test_retrieve_and_rerank_echoes_when_enabled() {
        let mut out = Vec::new();
        let nodes = utilities(true)
            .retrieve_and_rerank("q", &mut out)
            .await
            .unwrap();
        assert_eq!(nodes[0].text(), "beta");
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("**Node ID:**").count(), 2);

        let mut quiet = Vec::new();
        utilities(false)
            .retrieve_and_rerank("q", &mut quiet)
            .await
            .unwrap();
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_filter_nodes_threshold_override() {
        let utils = utilities(false);
        let nodes = vec![
            NodeWithScore::new(Node::new("a"), 0.3),
            NodeWithScore::new(Node::new("b"), 0.7),
        ];
        let mut out = Vec::new();
        assert_eq!(utils.filter_nodes(nodes.clone(), None, &mut out).unwrap().len(), 1);
        assert_eq!(utils.filter_nodes(nodes.clone(), Some(0.2), &mut out).unwrap().len(), 2);
        assert!(utils.filter_nodes(nodes, Some(0.8), &mut out).unwrap().is_empty());
    }
}
