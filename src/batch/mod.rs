//! Batch compilation of one template for many recipients.
//!
//! Contexts are split into chunks and each chunk is compiled on the tokio
//! blocking pool. A semaphore bounds how many chunks run at once. Results come
//! back in the order the contexts were given.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::BatchConfig;
use crate::template::{CompiledTemplate, Compiler, Render, SubstitutionRenderer, TemplateVariant};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Batch semaphore closed")]
    Closed,
}

pub struct BatchCompiler<R = SubstitutionRenderer> {
    compiler: Arc<Compiler<R>>,
    chunk_size: usize,
    permits: Arc<Semaphore>,
}

impl<R: Render + 'static> BatchCompiler<R> {
    pub fn new(compiler: Arc<Compiler<R>>, config: &BatchConfig) -> Self {
        Self {
            compiler,
            chunk_size: config.chunk_size.max(1),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    /// Compile `variant` once per context
    #[tracing::instrument(
        name = "batch.compile",
        skip(self, variant, contexts),
        fields(channel = %variant.channel(), recipients = contexts.len())
    )]
    pub async fn compile_all(
        &self,
        variant: Arc<TemplateVariant>,
        contexts: Vec<Value>,
    ) -> Result<Vec<CompiledTemplate>, BatchError> {
        let total = contexts.len();
        let mut tasks = JoinSet::new();

        let mut contexts = contexts.into_iter();
        let mut index = 0;
        loop {
            let chunk: Vec<Value> = contexts.by_ref().take(self.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }

            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BatchError::Closed)?;
            let compiler = self.compiler.clone();
            let variant = variant.clone();
            let offset = index;
            index += chunk.len();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let compiled: Vec<CompiledTemplate> = chunk
                    .iter()
                    .map(|variables| compiler.compile(&variant, variables))
                    .collect();
                (offset, compiled)
            });
        }

        let mut chunks = Vec::with_capacity(tasks.len());
        while let Some(result) = tasks.join_next().await {
            chunks.push(result?);
        }
        chunks.sort_by_key(|(offset, _)| *offset);

        let results: Vec<CompiledTemplate> =
            chunks.into_iter().flat_map(|(_, compiled)| compiled).collect();

        tracing::debug!(compiled = results.len(), total, "Batch compiled");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{CompiledText, TextTemplate};
    use serde_json::json;

    fn batch(chunk_size: usize, max_concurrency: usize) -> BatchCompiler {
        BatchCompiler::new(
            Arc::new(Compiler::default()),
            &BatchConfig {
                chunk_size,
                max_concurrency,
            },
        )
    }

    fn text(template: &str) -> Arc<TemplateVariant> {
        Arc::new(TemplateVariant::Text(TextTemplate {
            text: template.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let contexts: Vec<Value> = (0..50).map(|i| json!({ "n": i })).collect();

        let results = batch(7, 3)
            .compile_all(text("#{{n}}"), contexts)
            .await
            .unwrap();

        assert_eq!(results.len(), 50);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(
                result,
                &CompiledTemplate::Text(CompiledText {
                    text: format!("#{}", i)
                })
            );
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results = batch(10, 2)
            .compile_all(text("hi"), Vec::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_sizes_are_clamped() {
        let results = batch(0, 0)
            .compile_all(text("{{a}}"), vec![json!({ "a": "x" }), json!({})])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }
}
