//! Generation flows, one per content type.
//!
//! Each flow renders its [`crate::prompts::PromptSpec`], runs it through the shared
//! [`crate::core::PromptInvoker`] and checks the result against its output contract.
//! `try_*` entry points report contract violations as errors; the plain entry points
//! substitute the flow's documented fallback for them.

use async_trait::async_trait;
use tracing::warn;

use crate::error::GenerationError;
use crate::model::{GeneratedTest, GenerationRequest};

pub mod contract;
pub mod current_affairs;
pub mod mock_test;
pub mod ncert;
pub mod single_question;

pub use current_affairs::CurrentAffairsFlow;
pub use custom_test::CustomTestFlow;
pub use mock_test::MockTestFlow;
pub use ncert::NcertFlow;
pub use single_question::SingleQuestionFlow;

/// A flow that turns a [`GenerationRequest`] into a question set. This is the unit the
/// blueprint composer fans out over and the batch generator loops over.
///
/// Implementations check the shape of the result but leave the count to the caller.
#[async_trait]
pub trait QuestionSetFlow: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedTest, GenerationError>;
}

/// Replace a contract violation with `fallback()`; pass every other outcome through.
pub(crate) fn or_fallback<T>(
    result: Result<T, GenerationError>,
    fallback: impl FnOnce() -> T,
) -> Result<T, GenerationError> {
    match result {
        Err(GenerationError::Contract(violation)) => {
            warn!(flow = violation.flow, detail = %violation.detail, "Contract violation, returning fallback");
            Ok(fallback())
        }
        other => other,
    }
}
