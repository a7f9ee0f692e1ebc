//! Retriever-backed query engine.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use rag_core::{
    Llm, NodePostprocessor, NodeWithScore, QueryBundle, QueryResponse, Response, Result,
    Retriever, StreamingResponse, EMPTY_RESPONSE,
};

use crate::synth::PromptTemplate;

/// Answers queries by retrieving nodes, running them through the
/// postprocessors in order, and asking the language model.
pub struct RetrieverQueryEngine {
    retriever: Arc<dyn Retriever>,
    postprocessors: Vec<Arc<dyn NodePostprocessor>>,
    llm: Arc<dyn Llm>,
    template: PromptTemplate,
    streaming: bool,
}

impl RetrieverQueryEngine {
    /// Assemble an engine from its collaborators.
    pub fn from_args(
        retriever: Arc<dyn Retriever>,
        postprocessors: Vec<Arc<dyn NodePostprocessor>>,
        llm: Arc<dyn Llm>,
        streaming: bool,
    ) -> Self {
        Self {
            retriever,
            postprocessors,
            llm,
            template: PromptTemplate::default(),
            streaming,
        }
    }

    /// Use a custom prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Names of the postprocessors, in the order they run.
    pub fn postprocessor_names(&self) -> Vec<&str> {
        self.postprocessors.iter().map(|p| p.name()).collect()
    }

    /// Retrieve and postprocess nodes for a query.
    pub async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let mut nodes = self.retriever.retrieve(query).await?;
        debug!(
            "Retriever '{}' returned {} nodes",
            self.retriever.name(),
            nodes.len()
        );

        for postprocessor in &self.postprocessors {
            nodes = postprocessor.postprocess_nodes(nodes, Some(query)).await?;
            debug!("After '{}': {} nodes", postprocessor.name(), nodes.len());
        }
        Ok(nodes)
    }

    /// Generate an answer from already-selected nodes.
    pub async fn synthesize(
        &self,
        query: &QueryBundle,
        nodes: Vec<NodeWithScore>,
    ) -> Result<QueryResponse> {
        if nodes.is_empty() {
            info!("No source nodes left for query; skipping generation");
            return Ok(if self.streaming {
                QueryResponse::Streaming(StreamingResponse::completed(EMPTY_RESPONSE, nodes))
            } else {
                QueryResponse::Complete(Response::new(EMPTY_RESPONSE, nodes))
            });
        }

        let prompt = self.template.format(&nodes, query);
        debug!(
            model = self.llm.model_name(),
            "Prompt built from {} nodes ({} chars)",
            nodes.len(),
            prompt.len()
        );

        if self.streaming {
            let stream = self.llm.stream_complete(&prompt).await?;
            Ok(QueryResponse::Streaming(StreamingResponse::new(stream, nodes)))
        } else {
            let text = self.llm.complete(&prompt).await?;
            Ok(QueryResponse::Complete(Response::new(text, nodes)))
        }
    }

    /// Run the full pipeline for a prompt.
    pub async fn query(&self, prompt: &str) -> Result<QueryResponse> {
        let start = Instant::now();
        info!("Querying: {:?}", prompt);

        let query = QueryBundle::new(prompt);
        let nodes = self.retrieve(&query).await?;
        let response = self.synthesize(&query, nodes).await?;

        info!(
            "Query answered in {}ms from {} source nodes (streaming: {})",
            start.elapsed().as_millis(),
            response.source_nodes().len(),
            self.streaming
        );
        Ok(response)
    }
}
