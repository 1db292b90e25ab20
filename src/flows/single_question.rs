use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::or_fallback;
use crate::core::{LowLevelClient, PromptInvoker};
use crate::error::{ContractViolation, GenerationError};
use crate::model::{Question, QuestionDraft};
use crate::prompts::PromptSpec;

const FLOW: &str = "single-question";

/// Turns a user's raw question, text and/or image, into a complete [`Question`].
#[derive(Debug)]
pub struct SingleQuestionFlow<C: LowLevelClient> {
    invoker: Arc<PromptInvoker<C>>,
    spec: PromptSpec,
}

impl<C: LowLevelClient> SingleQuestionFlow<C> {
    pub fn new(invoker: Arc<PromptInvoker<C>>, spec: PromptSpec) -> Self {
        Self { invoker, spec }
    }

    #[instrument(skip(self, draft), fields(text_len = draft.question_text.len(), has_image = draft.image_data_uri.is_some()))]
    pub async fn try_create(&self, draft: &QuestionDraft) -> Result<Question, GenerationError> {
        if draft.question_text.trim().is_empty() && draft.image_data_uri.is_none() {
            return Err(GenerationError::InvalidRequest("question text or image is required".into()));
        }
        let image_note = if draft.image_data_uri.is_some() { "Image: attached" } else { "" };
        let prompt = self
            .spec
            .render(&[("question_text", draft.question_text.as_str()), ("image_note", image_note)])?
            .with_image(draft.image_data_uri.clone());

        let question: Question = self.invoker.invoke_typed(FLOW, prompt).await?;
        question
            .validate()
            .map_err(|detail| ContractViolation::new(FLOW, detail))?;
        info!(difficulty = %question.difficulty, "Question created from user input");
        Ok(question)
    }

    /// [`SingleQuestionFlow::try_create`], with the empty-field placeholder in place of a
    /// contract violation or a failed completion call. Configuration errors and invalid
    /// drafts are still reported.
    pub async fn create(&self, draft: &QuestionDraft) -> Result<Question, GenerationError> {
        match self.try_create(draft).await {
            Err(GenerationError::Invoke(e)) => {
                warn!(error = %e, "Completion failed, returning placeholder question");
                Ok(Question::placeholder())
            }
            other => or_fallback(other, Question::placeholder),
        }
    }
}
