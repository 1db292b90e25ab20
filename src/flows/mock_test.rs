use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{contract, QuestionSetFlow};
use crate::core::{LowLevelClient, Prompt, PromptInvoker};
use crate::error::GenerationError;
use crate::model::{GeneratedTest, GenerationRequest};
use crate::prompts::PromptSpec;

const FLOW: &str = "mock-test";

/// Target share of each difficulty, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyMix {
    pub easy: u8,
    pub medium: u8,
    pub hard: u8,
}

impl DifficultyMix {
    /// Above 75% accuracy the mix leans hard, below 40% it leans easy.
    pub fn for_accuracy(accuracy: Option<f64>) -> Self {
        match accuracy {
            Some(a) if a > 75.0 => Self { easy: 10, medium: 50, hard: 40 },
            Some(a) if a < 40.0 => Self { easy: 40, medium: 50, hard: 10 },
            _ => Self { easy: 30, medium: 50, hard: 20 },
        }
    }
}

fn quoted_list(items: &[String]) -> String {
    items.iter().map(|t| format!("'{}'", t)).collect::<Vec<_>>().join(", ")
}

fn year_instruction(year: Option<u16>) -> String {
    match year {
        Some(year) => format!(
            "Your question style and difficulty MUST strictly simulate the exam trend of **{}**, \
             using the PYQ trend of the 25 years leading up to that year.",
            year
        ),
        None => "Follow the latest exam pattern.".to_string(),
    }
}

/// Weak-topic and difficulty guidance for the adaptive section of the prompt.
pub fn adaptive_instructions(request: &GenerationRequest) -> String {
    if request.practice_weak_topics && !request.weak_topics.is_empty() {
        return format!(
            "- **WEAK TOPIC PRACTICE MODE:** Generate questions ONLY from these weak topics: {}.",
            quoted_list(&request.weak_topics)
        );
    }

    let mut lines = vec!["- **STANDARD ADAPTIVE MODE:**".to_string()];
    if !request.weak_topics.is_empty() {
        lines.push(format!(
            "  - **Prioritize Weak Topics:** The user's weak topics are {}. Include more questions from these topics.",
            quoted_list(&request.weak_topics)
        ));
    }
    let mix = DifficultyMix::for_accuracy(request.overall_accuracy);
    let mix_line = format!("{}% Easy, {}% Medium, {}% Hard", mix.easy, mix.medium, mix.hard);
    match request.overall_accuracy {
        Some(accuracy) => lines.push(format!(
            "  - **Adjust Difficulty:** The user's accuracy is {:.0}%. Use this difficulty mix: {}.",
            accuracy, mix_line
        )),
        None => lines.push(format!("  - **Default Mix:** {}.", mix_line)),
    }
    lines.join("\n")
}

fn exam_instructions(request: &GenerationRequest) -> String {
    if request.is_state_exam() {
        "- **State-Specific Content (25-30%):** For this State Exam, ensure 25-30% of questions \
         are from the General Knowledge of the relevant state."
            .to_string()
    } else {
        format!(
            "- **Central Exam Content:** For this Central Exam ({}), DO NOT include any state-specific GK.",
            request.exam
        )
    }
}

/// Full-exam mock test for one or more subjects.
#[derive(Debug)]
pub struct MockTestFlow<C: LowLevelClient> {
    invoker: Arc<PromptInvoker<C>>,
    spec: PromptSpec,
}

impl<C: LowLevelClient> MockTestFlow<C> {
    pub fn new(invoker: Arc<PromptInvoker<C>>, spec: PromptSpec) -> Self {
        Self { invoker, spec }
    }

    pub fn render(&self, request: &GenerationRequest) -> Result<Prompt, GenerationError> {
        let seed = request.seed.to_string();
        let subjects = request.subjects.join(", ");
        let year = year_instruction(request.year);
        let adaptive = adaptive_instructions(request);
        let exam_specific = exam_instructions(request);
        let count = request.question_count.to_string();
        self.spec.render(&[
            ("seed", seed.as_str()),
            ("exam", request.exam.as_str()),
            ("subjects", subjects.as_str()),
            ("year_instruction", year.as_str()),
            ("adaptive_instructions", adaptive.as_str()),
            ("exam_instructions", exam_specific.as_str()),
            ("question_count", count.as_str()),
        ])
    }
}

#[async_trait]
impl<C: LowLevelClient> QuestionSetFlow for MockTestFlow<C> {
    #[instrument(skip(self, request), fields(exam = %request.exam, subjects = ?request.subjects, count = request.question_count))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedTest, GenerationError> {
        let prompt = self.render(request)?;
        let candidate = self.invoker.invoke(prompt).await?;
        let test = contract::question_set(FLOW, candidate)?;
        debug!(returned = test.len(), "Mock test flow returned");
        Ok(test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::{MockClient, MockResponse};
    use crate::core::RetryConfig;
    use crate::prompts::PromptCatalog;
    use serde_json::json;

    fn flow(responses: Vec<MockResponse>) -> MockTestFlow<MockClient> {
        let (client, _handle) = MockClient::with_responses(responses);
        let catalog = PromptCatalog::standard().unwrap();
        MockTestFlow::new(Arc::new(PromptInvoker::new(client, RetryConfig::default())), catalog.mock_test)
    }

    #[test]
    fn difficulty_mix_follows_accuracy() {
        assert_eq!(DifficultyMix::for_accuracy(Some(80.0)), DifficultyMix { easy: 10, medium: 50, hard: 40 });
        assert_eq!(DifficultyMix::for_accuracy(Some(30.0)), DifficultyMix { easy: 40, medium: 50, hard: 10 });
        assert_eq!(DifficultyMix::for_accuracy(Some(60.0)), DifficultyMix { easy: 30, medium: 50, hard: 20 });
        assert_eq!(DifficultyMix::for_accuracy(None), DifficultyMix { easy: 30, medium: 50, hard: 20 });
    }

    #[test]
    fn practice_mode_lists_only_weak_topics() {
        let req = GenerationRequest::new("SSC CGL", vec!["Maths".into()], 10)
            .with_weak_topics(vec!["Percentage".into(), "Ratio".into()])
            .with_practice_weak_topics(true);
        let text = adaptive_instructions(&req);
        assert!(text.contains("ONLY from these weak topics: 'Percentage', 'Ratio'"));
        assert!(!text.contains("Mix"));
    }

    #[test]
    fn rendered_prompt_carries_request_details() {
        let req = GenerationRequest::new("JSSC CGL", vec!["Jharkhand GK".into()], 20)
            .with_category("state")
            .with_year(Some(2022))
            .with_accuracy(Some(85.0))
            .with_seed(42);
        let prompt = flow(vec![]).render(&req).unwrap();

        assert!(prompt.system.contains("**Request ID:** 42."));
        assert!(prompt.system.contains("- Subject(s): Jharkhand GK\n"));
        assert!(prompt.system.contains("exam trend of **2022**"));
        assert!(prompt.system.contains("10% Easy, 50% Medium, 40% Hard"));
        assert!(prompt.system.contains("State-Specific Content"));
        assert!(prompt.user.starts_with("Generate the mock test with 20 questions now for the exam: JSSC CGL."));
        assert_eq!(prompt.temperature, 0.7);
    }

    #[tokio::test]
    async fn malformed_output_is_a_contract_violation() {
        let flow = flow(vec![MockResponse::Json(json!({"questions": [{"question": "only text"}]}))]);
        let req = GenerationRequest::new("SSC CGL", vec!["Maths".into()], 1);
        assert!(flow.generate(&req).await.unwrap_err().is_contract_violation());
    }
}
