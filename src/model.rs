//! Request and result types shared by every generation flow.
//!
//! Wire names follow the stored documents: a question is
//! `{question, options, answer, explanation, subject, topic, difficulty}` and a test is
//! `{questions: [...]}`. Text fields are bilingual, `"English / हिंदी"`.

use chrono::{NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::GenerationError;

/// Options every question must carry.
pub const OPTION_COUNT: usize = 4;
pub const CUSTOM_COUNT_RANGE: std::ops::RangeInclusive<usize> = 5..=50;
pub const PYQ_LIMIT_RANGE: std::ops::RangeInclusive<usize> = 5..=50;
pub const MAX_MOCK_QUESTIONS: usize = 200;
pub const NCERT_QUESTION_COUNT: usize = 15;
pub const CURRENT_AFFAIRS_QUESTION_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum Difficulty {
    #[serde(alias = "easy")]
    Easy,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "hard")]
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    /// Question text in 'English / हिंदी' format
    #[serde(rename = "question")]
    pub question_text: String,
    /// Exactly 4 distinct options, each in 'English / हिंदी' format
    pub options: Vec<String>,
    /// The correct option, copied verbatim from `options`
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub difficulty: Difficulty,
}

impl Question {
    /// Empty-field question returned when single-question creation fails.
    pub fn placeholder() -> Self {
        Self {
            question_text: String::new(),
            options: Vec::new(),
            answer: String::new(),
            explanation: String::new(),
            subject: String::new(),
            topic: Some(String::new()),
            difficulty: Difficulty::Medium,
        }
    }

    /// Check the shape every generated question must have.
    pub fn validate(&self) -> Result<(), String> {
        if self.question_text.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.options.len() != OPTION_COUNT {
            return Err(format!("expected {} options, got {}", OPTION_COUNT, self.options.len()));
        }
        let distinct: HashSet<&str> = self.options.iter().map(String::as_str).collect();
        if distinct.len() != OPTION_COUNT {
            return Err("options are not distinct".to_string());
        }
        if !self.options.iter().any(|option| option == &self.answer) {
            return Err(format!("answer '{}' is not one of the options", self.answer));
        }
        Ok(())
    }

    /// Text before the first '/', trimmed. Used to spot repeated questions.
    pub fn first_language_segment(&self) -> &str {
        self.question_text.split('/').next().unwrap_or_default().trim()
    }
}

/// An assembled question set, also the document shape stored in the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedTest {
    pub questions: Vec<Question>,
}

impl GeneratedTest {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// A uniqueness seed: the current time in milliseconds plus a random sub-millisecond part,
/// so two requests in the same millisecond still differ.
pub fn fresh_seed() -> u64 {
    let millis = Utc::now().timestamp_millis().unsigned_abs();
    millis.wrapping_mul(1000).wrapping_add(rand::random::<u64>() % 1000)
}

/// Input to the mock-test flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub exam: String,
    /// Exam category such as "ssc", "railways" or "state"
    #[serde(default)]
    pub category: String,
    pub subjects: Vec<String>,
    pub question_count: usize,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub weak_topics: Vec<String>,
    #[serde(default)]
    pub overall_accuracy: Option<f64>,
    #[serde(default)]
    pub practice_weak_topics: bool,
    #[serde(default = "fresh_seed")]
    pub seed: u64,
}

impl GenerationRequest {
    pub fn new(exam: impl Into<String>, subjects: Vec<String>, question_count: usize) -> Self {
        Self {
            exam: exam.into(),
            category: String::new(),
            subjects,
            question_count,
            year: None,
            weak_topics: Vec::new(),
            overall_accuracy: None,
            practice_weak_topics: false,
            seed: fresh_seed(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_year(mut self, year: Option<u16>) -> Self {
        self.year = year;
        self
    }

    pub fn with_weak_topics(mut self, weak_topics: Vec<String>) -> Self {
        self.weak_topics = weak_topics;
        self
    }

    pub fn with_accuracy(mut self, overall_accuracy: Option<f64>) -> Self {
        self.overall_accuracy = overall_accuracy;
        self
    }

    pub fn with_practice_weak_topics(mut self, practice: bool) -> Self {
        self.practice_weak_topics = practice;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.exam.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("exam must not be empty".into()));
        }
        if self.subjects.is_empty() || self.subjects.iter().any(|s| s.trim().is_empty()) {
            return Err(GenerationError::InvalidRequest("at least one non-empty subject is required".into()));
        }
        if self.question_count == 0 || self.question_count > MAX_MOCK_QUESTIONS {
            return Err(GenerationError::InvalidRequest(format!(
                "question count must be within 1..={}, got {}",
                MAX_MOCK_QUESTIONS, self.question_count
            )));
        }
        if let Some(accuracy) = self.overall_accuracy {
            if !(0.0..=100.0).contains(&accuracy) {
                return Err(GenerationError::InvalidRequest(format!(
                    "overall accuracy must be a percentage, got {}",
                    accuracy
                )));
            }
        }
        Ok(())
    }

    /// State-level exams get a share of state GK questions.
    pub fn is_state_exam(&self) -> bool {
        let category = self.category.to_lowercase();
        ["state", "jssc", "bpsc", "police"]
            .iter()
            .any(|marker| category.contains(marker))
    }

    /// Sub-request for one blueprint partition: one subject, its count, a fresh seed,
    /// weak-topic-only practice switched off.
    pub fn for_partition(&self, subject: &str, count: usize) -> Self {
        Self {
            subjects: vec![subject.to_string()],
            question_count: count,
            practice_weak_topics: false,
            seed: fresh_seed(),
            ..self.clone()
        }
    }

    /// Sub-request for one sequential batch.
    pub fn for_batch(&self, count: usize, seed: u64) -> Self {
        Self {
            question_count: count,
            seed,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTestRequest {
    pub subject: String,
    pub topic: String,
    pub question_count: usize,
    #[serde(default = "fresh_seed")]
    pub seed: u64,
}

impl CustomTestRequest {
    pub fn new(subject: impl Into<String>, topic: impl Into<String>, question_count: usize) -> Self {
        Self {
            subject: subject.into(),
            topic: topic.into(),
            question_count,
            seed: fresh_seed(),
        }
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.subject.trim().is_empty() || self.topic.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("subject and topic are required".into()));
        }
        if !CUSTOM_COUNT_RANGE.contains(&self.question_count) {
            return Err(GenerationError::InvalidRequest(format!(
                "question count must be within {}..={}, got {}",
                CUSTOM_COUNT_RANGE.start(),
                CUSTOM_COUNT_RANGE.end(),
                self.question_count
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentAffairsRequest {
    pub date: NaiveDate,
    #[serde(default = "fresh_seed")]
    pub seed: u64,
}

impl CurrentAffairsRequest {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, seed: fresh_seed() }
    }

    /// Parse a `YYYY-MM-DD` date; `None` means today (UTC).
    pub fn for_date(date: Option<&str>) -> Result<Self, GenerationError> {
        let date = match date {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                GenerationError::InvalidRequest(format!("date must be YYYY-MM-DD, got '{}'", raw))
            })?,
            None => Utc::now().date_naive(),
        };
        Ok(Self::new(date))
    }

    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NcertTestRequest {
    /// e.g. "Class 10"
    pub selected_class: String,
    pub subject: String,
    pub chapter: String,
    #[serde(default = "fresh_seed")]
    pub seed: u64,
}

impl NcertTestRequest {
    pub fn new(selected_class: impl Into<String>, subject: impl Into<String>, chapter: impl Into<String>) -> Self {
        Self {
            selected_class: selected_class.into(),
            subject: subject.into(),
            chapter: chapter.into(),
            seed: fresh_seed(),
        }
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if [&self.selected_class, &self.subject, &self.chapter]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(GenerationError::InvalidRequest("class, subject and chapter are required".into()));
        }
        Ok(())
    }
}

/// A user-supplied raw question to be turned into a full [`Question`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub question_text: String,
    #[serde(default)]
    pub image_data_uri: Option<String>,
}

impl QuestionDraft {
    pub fn new(question_text: impl Into<String>) -> Self {
        Self { question_text: question_text.into(), image_data_uri: None }
    }

    pub fn with_image(mut self, image_data_uri: Option<String>) -> Self {
        self.image_data_uri = image_data_uri;
        self
    }
}

/// Previous-year-question request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyqRequest {
    pub exam: String,
    pub subject: String,
    #[serde(default)]
    pub year: Option<u16>,
    pub limit: usize,
}

impl PyqRequest {
    pub fn new(exam: impl Into<String>, subject: impl Into<String>, year: Option<u16>, limit: usize) -> Self {
        Self { exam: exam.into(), subject: subject.into(), year, limit }
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.exam.trim().is_empty() || self.subject.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("exam and subject are required".into()));
        }
        if !PYQ_LIMIT_RANGE.contains(&self.limit) {
            return Err(GenerationError::InvalidRequest(format!(
                "limit must be within {}..={}, got {}",
                PYQ_LIMIT_RANGE.start(),
                PYQ_LIMIT_RANGE.end(),
                self.limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(text: &str) -> Question {
        Question {
            question_text: text.to_string(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            answer: "B".into(),
            explanation: String::new(),
            subject: "Maths".into(),
            topic: None,
            difficulty: Difficulty::Easy,
        }
    }

    #[test]
    fn question_reads_wire_names() {
        let q: Question = serde_json::from_value(json!({
            "question": "2 + 2? / 2 + 2?",
            "options": ["3", "4", "5", "6"],
            "answer": "4",
            "explanation": "Addition / जोड़",
            "difficulty": "Easy"
        }))
        .unwrap();
        assert_eq!(q.question_text, "2 + 2? / 2 + 2?");
        assert_eq!(q.topic, None);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn answer_must_be_an_option() {
        let mut q = question("x");
        q.answer = "E".into();
        assert!(q.validate().unwrap_err().contains("not one of the options"));
    }

    #[test]
    fn options_must_be_four_and_distinct() {
        let mut q = question("x");
        q.options.pop();
        assert!(q.validate().is_err());

        let mut q = question("x");
        q.options = vec!["A".into(), "B".into(), "B".into(), "D".into()];
        assert_eq!(q.validate().unwrap_err(), "options are not distinct");
    }

    #[test]
    fn placeholder_is_not_a_valid_question() {
        let q = Question::placeholder();
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert!(q.validate().is_err());
    }

    #[test]
    fn first_language_segment_is_trimmed() {
        assert_eq!(question(" What is 2+2? / 2+2 क्या है?").first_language_segment(), "What is 2+2?");
        assert_eq!(question("No separator").first_language_segment(), "No separator");
    }

    #[test]
    fn state_exam_detection() {
        let req = GenerationRequest::new("JSSC CGL", vec!["GK".into()], 10);
        assert!(!req.is_state_exam());
        assert!(req.clone().with_category("JSSC").is_state_exam());
        assert!(req.clone().with_category("State Police").is_state_exam());
        assert!(!req.with_category("ssc").is_state_exam());
    }

    #[test]
    fn partition_request_drops_weak_topic_mode_and_reseeds() {
        let parent = GenerationRequest::new("SSC CGL", vec!["A".into(), "B".into()], 100)
            .with_weak_topics(vec!["Percentage".into()])
            .with_practice_weak_topics(true)
            .with_seed(1);
        let part = parent.for_partition("A", 25);
        assert_eq!(part.subjects, vec!["A".to_string()]);
        assert_eq!(part.question_count, 25);
        assert!(!part.practice_weak_topics);
        assert_eq!(part.weak_topics, parent.weak_topics);
        assert_ne!(part.seed, 1);
    }

    #[test]
    fn request_limits() {
        assert!(CustomTestRequest::new("Maths", "Percentage", 4).validate().is_err());
        assert!(CustomTestRequest::new("Maths", "Percentage", 50).validate().is_ok());
        assert!(PyqRequest::new("SSC CGL", "Maths", None, 51).validate().is_err());
        assert!(GenerationRequest::new("SSC CGL", vec![], 10).validate().is_err());
        assert!(GenerationRequest::new("SSC CGL", vec!["Maths".into()], 10)
            .with_accuracy(Some(120.0))
            .validate()
            .is_err());
    }

    #[test]
    fn current_affairs_date_parsing() {
        let req = CurrentAffairsRequest::for_date(Some("2024-05-01")).unwrap();
        assert_eq!(req.date_string(), "2024-05-01");
        assert!(CurrentAffairsRequest::for_date(Some("01/05/2024")).is_err());
        assert!(CurrentAffairsRequest::for_date(None).is_ok());
    }
}
