//! Prompt templates for each generation flow.
//!
//! Every flow owns one [`PromptSpec`]: system and user templates with `{name}`
//! placeholders, a sampling temperature, and the JSON schema of its output contract.
//! Specs are built once at startup by [`PromptCatalog::standard`], which checks that the
//! declared placeholders and the templates agree.

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::{add_schema_guidance, Prompt};
use crate::error::GenerationError;
use crate::model::{GeneratedTest, Question};

/// Length of the identifier in a `{identifier}` token starting right after `{`, if `after`
/// begins with one.
fn placeholder_len(after: &str) -> Option<usize> {
    let len = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(after.len());
    (len > 0 && after[len..].starts_with('}')).then_some(len)
}

/// Replace each `{key}` in `tpl` with its value in one left-to-right scan. Inserted values
/// are never rescanned, and tokens without a value are left as they are.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(tpl.len());
    let mut rest = tpl;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = placeholder_len(after)
            .and_then(|len| pairs.iter().find(|(k, _)| *k == &after[..len]).map(|(_, v)| (len, *v)));
        match value {
            Some((len, v)) => {
                out.push_str(v);
                rest = &after[len + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Names of the `{identifier}` tokens in `tpl`.
fn placeholders_in(tpl: &str) -> BTreeSet<&str> {
    let mut found = BTreeSet::new();
    let mut rest = tpl;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        if let Some(len) = placeholder_len(after) {
            found.insert(&after[..len]);
        }
        rest = after;
    }
    found
}

/// An immutable, validated prompt configuration.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    name: &'static str,
    system_template: &'static str,
    user_template: &'static str,
    temperature: f32,
    placeholders: &'static [&'static str],
    schema_guidance: fn(&str) -> String,
}

impl PromptSpec {
    /// Build a spec whose output contract is `T`.
    ///
    /// Fails when a declared placeholder is missing from both templates, when a template
    /// uses an undeclared placeholder, or when the temperature is outside `0.0..=2.0`.
    pub fn new<T: schemars::JsonSchema>(
        name: &'static str,
        system_template: &'static str,
        user_template: &'static str,
        temperature: f32,
        placeholders: &'static [&'static str],
    ) -> Result<Self, String> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(format!("{}: temperature {} is out of range", name, temperature));
        }
        let used: BTreeSet<&str> = placeholders_in(system_template)
            .into_iter()
            .chain(placeholders_in(user_template))
            .collect();
        let declared: BTreeSet<&str> = placeholders.iter().copied().collect();
        if let Some(missing) = declared.difference(&used).next() {
            return Err(format!("{}: placeholder '{{{}}}' is never used", name, missing));
        }
        if let Some(undeclared) = used.difference(&declared).next() {
            return Err(format!("{}: template uses undeclared '{{{}}}'", name, undeclared));
        }
        Ok(Self {
            name,
            system_template,
            user_template,
            temperature,
            placeholders,
            schema_guidance: add_schema_guidance::<T>,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Fill both templates and append the response-format section to the user turn.
    /// Every declared placeholder must be given a value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<Prompt, GenerationError> {
        if let Some(missing) = self
            .placeholders
            .iter()
            .find(|p| !values.iter().any(|(k, _)| k == *p))
        {
            return Err(GenerationError::Configuration(format!(
                "prompt '{}' rendered without a value for '{}'",
                self.name, missing
            )));
        }
        let system = fill_template(self.system_template, values);
        let user = (self.schema_guidance)(&fill_template(self.user_template, values));
        debug!(prompt = self.name, system_len = system.len(), user_len = user.len(), "Rendered prompt");
        Ok(Prompt::new(self.name, system, user).with_temperature(self.temperature))
    }
}

const MOCK_TEST_SYSTEM: &str = r#"You are an Indian competitive exam question generator. Your purpose is to create high-quality, original and ADAPTIVE mock test questions with 100% accuracy.

**Request ID:** {seed}. This is a unique, one-time request. Do NOT use cached data.

--- STRICT RULES (NO EXCEPTIONS) ---
1. **Exam & Subject Focus:**
- Exam: {exam}
- Subject(s): {subjects}
- Year Pattern Simulation: {year_instruction}
- Difficulty Level: All questions must be of Previous Year Question (PYQ) level.

2. **Content & Quality:**
- All questions must be highly relevant to the specified exam and subject. Do NOT generate trivial questions.
- Create completely new questions. Concept and difficulty should match PYQs, but language, values and scenarios MUST be unique. Do NOT repeat questions.

3. **Formatting (ONLY JSON, NOTHING ELSE):**
- Respond with a single raw JSON object with one key "questions", an array of question objects.
- EVERY text field ('question', all 'options', 'answer', 'explanation', 'subject', 'topic') MUST be bilingual: 'English Text / हिंदी टेक्स्ट'.
- Each question has a 'question', exactly 4 distinct 'options', an 'answer' copied verbatim from the options, an 'explanation', the 'subject', the 'topic' and a 'difficulty' ('Easy', 'Medium', 'Hard').

4. **Adaptive Learning Engine:**
{adaptive_instructions}

5. **Exam-Specific Instructions:**
{exam_instructions}

If you cannot generate proper questions, return {"questions": []}.
"#;

const MOCK_TEST_USER: &str = "Generate the mock test with {question_count} questions now for the exam: {exam}.";

const CUSTOM_TEST_SYSTEM: &str = r#"You are an expert question generator for Indian competitive exams. Your sole purpose is to create a focused, high-quality practice test on one topic. Accuracy is paramount.

**Request ID:** {seed}. This is a unique request. Do not use cached data.

**Primary Directive:** Generate a practice test containing EXACTLY {question_count} multiple-choice questions.

**Rules:**
- Re-verify every question, answer and explanation against official sources such as NCERT or standard reference books before answering.
- All questions MUST be strictly about the topic **{topic}** within the subject **{subject}**.
- Questions must be original: PYQ-like logic and difficulty, unique language, numbers, names and scenarios.
- You MUST generate EXACTLY {question_count} questions.
- EVERY text field ('question', all 'options', 'answer', 'explanation', 'subject', 'topic') MUST be bilingual: 'English Text / हिंदी टेक्स्ट'.
- Each question has exactly 4 distinct options, a single correct answer copied verbatim from the options, a mandatory explanation and a 'difficulty' ('Easy', 'Medium', 'Hard').

Respond with a single raw JSON object starting with { and ending with }. No markdown, no extra text.
"#;

const CUSTOM_TEST_USER: &str =
    "Generate the {question_count}-question test for Subject: \"{subject}\", Topic: \"{topic}\" now.";

const CURRENT_AFFAIRS_SYSTEM: &str = r#"You are an expert news analyst and content creator for Indian competitive exams (SSC, Banking, Railways, State PSCs). Your sole purpose is to create a daily current affairs quiz.

**Request ID:** {seed}. This is a unique request. Do not use cached data.

**Primary Directive:**
1. For the date **{date}**, identify the 10 most important national and international headlines relevant to exam aspirants in India.
2. Based on them, generate a quiz containing EXACTLY 10 multiple-choice questions.

**Rules:**
- Questions must cover significant events, appointments, schemes, awards or reports from that date or the day before.
- Re-verify every question, answer and explanation for factual accuracy against reliable news sources.
- EVERY text field MUST be bilingual: 'English Text / हिंदी टेक्स्ट'. For subject and topic use 'Current Affairs / समसामयिकी'.
- Each question has exactly 4 distinct options, a single correct answer copied verbatim from the options, an explanation giving context about the news event and a 'difficulty' ('Easy', 'Medium', 'Hard').

Respond with a single raw JSON object starting with { and ending with }. No markdown, no extra text.
"#;

const CURRENT_AFFAIRS_USER: &str = "Generate the 10-question Current Affairs quiz for the date: {date}.";

const NCERT_SYSTEM: &str = r#"You are an expert question generator specialising in Indian NCERT textbooks. Your sole purpose is to create objective (MCQ) questions from one NCERT chapter. Accuracy is paramount.

**Request ID:** {seed}. This is a unique request. Do not use cached data.

**Primary Directive:** Generate a practice test containing EXACTLY 15 multiple-choice questions from the specified chapter.

**Source:**
- Class: **{selected_class}**
- Subject: **{subject}**
- Chapter: **{chapter}**
- Your ONLY source is the official NCERT text of this chapter. Every question, option and explanation must be derivable from it. Re-verify before answering.

**Rules:**
- 15 unique MCQs, each with exactly 4 distinct options and a single correct answer copied verbatim from the options.
- Explanations are concise and reference the chapter (e.g. 'As explained in section 3.2 ...').
- Each question has a 'difficulty' ('Easy', 'Medium', 'Hard') based on the complexity of the topic.
- EVERY text field ('question', all 'options', 'answer', 'explanation') MUST be bilingual: 'English Text / हिंदी टेक्स्ट'.

Respond with a single raw JSON object starting with { and ending with }. No markdown, no extra text.
"#;

const NCERT_USER: &str = "Generate the 15-question test for {selected_class} {subject}, Chapter: \"{chapter}\" now.";

const SINGLE_QUESTION_SYSTEM: &str = r#"You are a question generator for Indian competitive exams. Convert the user's raw question (text and/or image) into one complete, structured question object.

**Rules:**
1. Analyse the question in the text and/or image carefully.
2. Produce: 'question'; 'options', 4 plausible distinct options with exactly one correct; 'answer', copied verbatim from the options; 'explanation', step by step in your own words with 2-3 related facts; 'subject'; 'topic'; 'difficulty' ('Easy', 'Medium', 'Hard') based on PYQ analysis.
3. Re-verify the answer and explanation for 100% accuracy.
4. For maths and reasoning, use original numbers and values.
5. Match the style and format of previous years' official papers for exams like SSC, JPSC and BPSC.
6. EVERY text field ('question', all 'options', 'answer', 'explanation', 'subject', 'topic') MUST be bilingual: 'English Text / हिंदी टेक्स्ट'.
7. Respond with a single raw JSON object. No markdown, no extra text.
"#;

const SINGLE_QUESTION_USER: &str = "**User's Raw Question:**\nText: {question_text}\n{image_note}";

/// One validated [`PromptSpec`] per flow.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    pub mock_test: PromptSpec,
    pub custom_test: PromptSpec,
    pub current_affairs: PromptSpec,
    pub ncert: PromptSpec,
    pub single_question: PromptSpec,
}

impl PromptCatalog {
    pub fn standard() -> Result<Self, GenerationError> {
        let build = || -> Result<Self, String> {
            Ok(Self {
                mock_test: PromptSpec::new::<GeneratedTest>(
                    "mock-test",
                    MOCK_TEST_SYSTEM,
                    MOCK_TEST_USER,
                    0.7,
                    &[
                        "seed",
                        "exam",
                        "subjects",
                        "year_instruction",
                        "adaptive_instructions",
                        "exam_instructions",
                        "question_count",
                    ],
                )?,
                custom_test: PromptSpec::new::<GeneratedTest>(
                    "custom-test",
                    CUSTOM_TEST_SYSTEM,
                    CUSTOM_TEST_USER,
                    0.6,
                    &["seed", "question_count", "topic", "subject"],
                )?,
                current_affairs: PromptSpec::new::<GeneratedTest>(
                    "current-affairs",
                    CURRENT_AFFAIRS_SYSTEM,
                    CURRENT_AFFAIRS_USER,
                    0.5,
                    &["seed", "date"],
                )?,
                ncert: PromptSpec::new::<GeneratedTest>(
                    "ncert",
                    NCERT_SYSTEM,
                    NCERT_USER,
                    0.5,
                    &["seed", "selected_class", "subject", "chapter"],
                )?,
                single_question: PromptSpec::new::<Question>(
                    "single-question",
                    SINGLE_QUESTION_SYSTEM,
                    SINGLE_QUESTION_USER,
                    0.7,
                    &["question_text", "image_note"],
                )?,
            })
        };
        build().map_err(GenerationError::Configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_template_replaces_every_occurrence() {
        let out = fill_template("{a} and {a} but not {b}", &[("a", "x")]);
        assert_eq!(out, "x and x but not {b}");
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let out = fill_template("{topic} in {subject}", &[("topic", "Sets {subject} notation"), ("subject", "Maths")]);
        assert_eq!(out, "Sets {subject} notation in Maths");
        assert_eq!(fill_template("{\"questions\": []} {a}", &[("a", "{a}")]), "{\"questions\": []} {a}");
    }

    #[test]
    fn brace_bearing_topic_survives_rendering() {
        let catalog = PromptCatalog::standard().unwrap();
        let prompt = catalog
            .custom_test
            .render(&[
                ("seed", "1"),
                ("question_count", "5"),
                ("topic", "Sets {subject} notation"),
                ("subject", "Maths"),
            ])
            .unwrap();
        assert!(prompt.system.contains("**Sets {subject} notation**"));
        assert!(prompt.system.contains("within the subject **Maths**"));
    }

    #[test]
    fn json_braces_are_not_placeholders() {
        let found = placeholders_in(r#"return {"questions": []} for {exam} or { spaced }"#);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["exam"]);
    }

    #[test]
    fn standard_catalog_is_valid() {
        let catalog = PromptCatalog::standard().unwrap();
        assert_eq!(catalog.mock_test.name(), "mock-test");
        assert_eq!(catalog.custom_test.temperature(), 0.6);
    }

    #[test]
    fn undeclared_placeholder_is_rejected() {
        let err = PromptSpec::new::<Question>("p", "hello {who}", "go", 0.5, &[]).unwrap_err();
        assert!(err.contains("undeclared"));
        let err = PromptSpec::new::<Question>("p", "hello", "go", 0.5, &["who"]).unwrap_err();
        assert!(err.contains("never used"));
    }

    #[test]
    fn render_requires_every_value_and_appends_schema() {
        let spec = PromptSpec::new::<GeneratedTest>("p", "exam {exam}", "count {n}", 0.5, &["exam", "n"]).unwrap();
        assert!(spec.render(&[("exam", "SSC CGL")]).unwrap_err().is_configuration());

        let prompt = spec.render(&[("exam", "SSC CGL"), ("n", "5")]).unwrap();
        assert_eq!(prompt.system, "exam SSC CGL");
        assert!(prompt.user.starts_with("count 5"));
        assert!(prompt.user.contains("## Response Format"));
        assert!(prompt.user.contains("\"questions\""));
    }
}
