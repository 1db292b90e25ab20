use std::sync::Arc;
use tracing::{info, instrument};

use super::{contract, or_fallback};
use crate::core::{LowLevelClient, PromptInvoker};
use crate::error::GenerationError;
use crate::model::{GeneratedTest, NcertTestRequest, NCERT_QUESTION_COUNT};
use crate::prompts::PromptSpec;

const FLOW: &str = "ncert";

/// Fifteen questions drawn from one NCERT chapter. Questions carry no subject or topic.
#[derive(Debug)]
pub struct NcertFlow<C: LowLevelClient> {
    invoker: Arc<PromptInvoker<C>>,
    spec: PromptSpec,
}

impl<C: LowLevelClient> NcertFlow<C> {
    pub fn new(invoker: Arc<PromptInvoker<C>>, spec: PromptSpec) -> Self {
        Self { invoker, spec }
    }

    #[instrument(skip(self, request), fields(class = %request.selected_class, subject = %request.subject, chapter = %request.chapter))]
    pub async fn try_generate(&self, request: &NcertTestRequest) -> Result<GeneratedTest, GenerationError> {
        request.validate()?;
        let seed = request.seed.to_string();
        let prompt = self.spec.render(&[
            ("seed", seed.as_str()),
            ("selected_class", request.selected_class.as_str()),
            ("subject", request.subject.as_str()),
            ("chapter", request.chapter.as_str()),
        ])?;

        let candidate = self.invoker.invoke(prompt).await?;
        let test = contract::question_set_of(FLOW, candidate, NCERT_QUESTION_COUNT)?;
        info!(questions = test.len(), "NCERT test generated");
        Ok(test)
    }

    pub async fn generate(&self, request: &NcertTestRequest) -> Result<GeneratedTest, GenerationError> {
        or_fallback(self.try_generate(request).await, GeneratedTest::empty)
    }
}
