use std::sync::Arc;
use tracing::{info, instrument};

use super::{contract, or_fallback};
use crate::core::{LowLevelClient, PromptInvoker};
use crate::error::GenerationError;
use crate::model::{CurrentAffairsRequest, GeneratedTest, CURRENT_AFFAIRS_QUESTION_COUNT};
use crate::prompts::PromptSpec;

const FLOW: &str = "current-affairs";

/// Ten-question quiz on one day's news. Caching by date happens in the service.
#[derive(Debug)]
pub struct CurrentAffairsFlow<C: LowLevelClient> {
    invoker: Arc<PromptInvoker<C>>,
    spec: PromptSpec,
}

impl<C: LowLevelClient> CurrentAffairsFlow<C> {
    pub fn new(invoker: Arc<PromptInvoker<C>>, spec: PromptSpec) -> Self {
        Self { invoker, spec }
    }

    #[instrument(skip(self, request), fields(date = %request.date))]
    pub async fn try_generate(&self, request: &CurrentAffairsRequest) -> Result<GeneratedTest, GenerationError> {
        let seed = request.seed.to_string();
        let date = request.date_string();
        let prompt = self.spec.render(&[("seed", seed.as_str()), ("date", date.as_str())])?;

        let candidate = self.invoker.invoke(prompt).await?;
        let test = contract::question_set_of(FLOW, candidate, CURRENT_AFFAIRS_QUESTION_COUNT)?;
        info!(questions = test.len(), "Current affairs quiz generated");
        Ok(test)
    }

    pub async fn generate(&self, request: &CurrentAffairsRequest) -> Result<GeneratedTest, GenerationError> {
        or_fallback(self.try_generate(request).await, GeneratedTest::empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::{MockClient, MockHandle, MockResponse};
    use crate::core::RetryConfig;
    use crate::prompts::PromptCatalog;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn news_quiz(n: usize) -> Value {
        let items: Vec<Value> = (0..n)
            .map(|i| {
                json!({
                    "question": format!("Headline {} / शीर्षक {}", i, i),
                    "options": ["A / अ", "B / ब", "C / स", "D / द"],
                    "answer": "C / स",
                    "explanation": "Reported that day / उस दिन की खबर",
                    "subject": "Current Affairs / करेंट अफेयर्स",
                    "topic": "National / राष्ट्रीय",
                    "difficulty": "Medium"
                })
            })
            .collect();
        json!({ "questions": items })
    }

    fn quiz_flow(responses: Vec<MockResponse>) -> (CurrentAffairsFlow<MockClient>, Arc<MockHandle>) {
        let (client, handle) = MockClient::with_responses(responses);
        let invoker = Arc::new(PromptInvoker::new(client, RetryConfig::default()));
        (CurrentAffairsFlow::new(invoker, PromptCatalog::standard().unwrap().current_affairs), handle)
    }

    fn may_day() -> CurrentAffairsRequest {
        CurrentAffairsRequest::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    #[tokio::test]
    async fn date_is_rendered_into_the_prompt() {
        let (flow, handle) = quiz_flow(vec![MockResponse::Json(news_quiz(10))]);
        let test = flow.generate(&may_day()).await.unwrap();
        assert_eq!(test.len(), 10);
        let prompt = &handle.prompts()[0];
        assert!(prompt.system.contains("2024-05-01") || prompt.user.contains("2024-05-01"));
    }

    #[tokio::test]
    async fn eleven_questions_are_rejected() {
        let (flow, _) = quiz_flow(vec![MockResponse::Json(news_quiz(11))]);
        let err = flow.try_generate(&may_day()).await.unwrap_err();
        assert!(err.is_contract_violation());
        let (flow, _) = quiz_flow(vec![MockResponse::Json(news_quiz(11))]);
        assert!(flow.generate(&may_day()).await.unwrap().is_empty());
    }
}
