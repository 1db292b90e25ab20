//! Previous-year questions: serve stored historical records when there are enough of
//! them, otherwise generate the whole set.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::GenerationError;
use crate::model::{Difficulty, GeneratedTest, GenerationRequest, PyqRequest, Question};
use crate::store::{DocumentStore, FieldFilter, PYQ_QUESTIONS};

/// Category used for the generated fallback; stored records carry none.
pub const FALLBACK_CATEGORY: &str = "General";
/// Topic given to every question served from stored records.
pub const PYQ_TOPIC: &str = "PYQ";

/// One historical question as stored, with the language variants kept apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyqRecord {
    pub exam: String,
    pub subject: String,
    #[serde(default)]
    pub year: Option<u16>,
    pub question_en: String,
    #[serde(default)]
    pub question_hi: Option<String>,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub solution: String,
}

fn bilingual(text: &str) -> String {
    format!("{} / {}", text, text)
}

impl PyqRecord {
    /// Adapt to the bilingual [`Question`] shape. Options and answer have a single stored
    /// language and are mirrored, so the answer stays one of the options.
    pub fn into_question(self) -> Question {
        let hindi = self
            .question_hi
            .filter(|hi| !hi.trim().is_empty())
            .unwrap_or_else(|| self.question_en.clone());
        Question {
            question_text: format!("{} / {}", self.question_en, hindi),
            options: self.options.iter().map(|opt| bilingual(opt)).collect(),
            answer: bilingual(&self.answer),
            explanation: bilingual(&self.solution),
            subject: self.subject,
            topic: Some(PYQ_TOPIC.to_string()),
            difficulty: Difficulty::Medium,
        }
    }
}

/// Database-first resolution of PYQ tests against the `pyq_questions` collection.
#[derive(Debug, Clone)]
pub struct PyqResolver {
    store: Arc<dyn DocumentStore>,
}

impl PyqResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stored questions for `request`, adapted, at most `request.limit` of them.
    /// Records that do not parse, or whose adapted question breaks the question
    /// invariants, are skipped and do not count towards the limit.
    pub async fn stored_questions(&self, request: &PyqRequest) -> Result<Vec<Question>, GenerationError> {
        let mut filters = vec![
            FieldFilter::eq("exam", request.exam.as_str()),
            FieldFilter::eq("subject", request.subject.as_str()),
        ];
        if let Some(year) = request.year {
            filters.push(FieldFilter::eq("year", year));
        }

        let documents = self.store.query(PYQ_QUESTIONS, &filters, usize::MAX).await?;
        let questions = documents
            .into_iter()
            .filter_map(|document| match serde_json::from_value::<PyqRecord>(document) {
                Ok(record) => Some(record.into_question()),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed PYQ record");
                    None
                }
            })
            .filter(|question| match question.validate() {
                Ok(()) => true,
                Err(detail) => {
                    warn!(%detail, "Skipping PYQ record that breaks question invariants");
                    false
                }
            })
            .take(request.limit)
            .collect();
        Ok(questions)
    }

    /// Serve stored records if at least `request.limit` are available; otherwise hand a
    /// full-size request to `generate`. Partial stored results are never mixed in.
    #[instrument(skip(self, generate), fields(exam = %request.exam, subject = %request.subject, year = ?request.year, limit = request.limit))]
    pub async fn resolve<F, Fut>(&self, request: &PyqRequest, generate: F) -> Result<GeneratedTest, GenerationError>
    where
        F: FnOnce(GenerationRequest) -> Fut,
        Fut: Future<Output = Result<GeneratedTest, GenerationError>>,
    {
        request.validate()?;
        let stored = self.stored_questions(request).await?;

        if stored.len() >= request.limit {
            info!(found = stored.len(), "Serving PYQ test from stored records");
            return Ok(GeneratedTest::new(stored));
        }

        info!(found = stored.len(), "Not enough stored PYQs, generating instead");
        let fallback = GenerationRequest::new(&request.exam, vec![request.subject.clone()], request.limit)
            .with_category(FALLBACK_CATEGORY)
            .with_year(request.year);
        let test = generate(fallback).await?;
        info!(questions = test.len(), "Generated PYQ fallback test");
        Ok(test)
    }
}
