//! Output-contract checks applied by every flow after the invoker returns.

use serde_json::Value;
use tracing::warn;

use crate::error::ContractViolation;
use crate::model::{GeneratedTest, Question};

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "free text",
        Value::Array(_) => "a bare array",
        Value::Object(_) => "an object",
    }
}

fn question_at(flow: &'static str, index: usize, raw: Value) -> Result<Question, ContractViolation> {
    let question: Question = serde_json::from_value(raw)
        .map_err(|e| ContractViolation::new(flow, format!("question {} is malformed: {}", index + 1, e)))?;
    question
        .validate()
        .map_err(|e| ContractViolation::new(flow, format!("question {}: {}", index + 1, e)))?;
    Ok(question)
}

/// `{"questions": [...]}` where every element is a valid [`Question`].
/// Any malformed element rejects the whole set.
pub fn question_set(flow: &'static str, candidate: Value) -> Result<GeneratedTest, ContractViolation> {
    let kind = describe(&candidate);
    let Value::Object(mut object) = candidate else {
        warn!(flow, kind, "Output is not an object");
        return Err(ContractViolation::new(flow, format!("expected an object, got {}", kind)));
    };
    let Some(Value::Array(items)) = object.remove("questions") else {
        warn!(flow, "Output has no questions array");
        return Err(ContractViolation::new(flow, "missing 'questions' array"));
    };

    let questions = items
        .into_iter()
        .enumerate()
        .map(|(i, raw)| question_at(flow, i, raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GeneratedTest::new(questions))
}

/// Reject any set whose size differs from `expected`; sets are never truncated or padded.
pub fn exact_count(flow: &'static str, test: &GeneratedTest, expected: usize) -> Result<(), ContractViolation> {
    if test.len() != expected {
        warn!(flow, got = test.len(), expected, "Wrong number of questions");
        return Err(ContractViolation::new(
            flow,
            format!("returned {} questions, {} were requested", test.len(), expected),
        ));
    }
    Ok(())
}

/// [`question_set`] plus [`exact_count`].
pub fn question_set_of(
    flow: &'static str,
    candidate: Value,
    expected: usize,
) -> Result<GeneratedTest, ContractViolation> {
    let test = question_set(flow, candidate)?;
    exact_count(flow, &test, expected)?;
    Ok(test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn q(text: &str) -> Value {
        json!({
            "question": text,
            "options": ["a", "b", "c", "d"],
            "answer": "c",
            "explanation": "because",
            "subject": "Maths",
            "topic": "Algebra",
            "difficulty": "Hard"
        })
    }

    #[test]
    fn accepts_a_well_formed_set() {
        let test = question_set_of("t", json!({"questions": [q("1"), q("2")]}), 2).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(test.questions[1].question_text, "2");
    }

    #[test]
    fn wrong_count_is_rejected_in_both_directions() {
        let three = json!({"questions": [q("1"), q("2"), q("3")]});
        assert!(question_set_of("t", three.clone(), 2).is_err());
        assert!(question_set_of("t", three, 4).is_err());
    }

    #[test]
    fn free_text_and_bare_arrays_are_rejected() {
        let err = question_set("t", Value::String("sorry".into())).unwrap_err();
        assert!(err.detail.contains("free text"));
        assert!(question_set("t", json!([q("1")])).is_err());
        assert!(question_set("t", json!({"items": []})).is_err());
    }

    #[test]
    fn one_bad_question_rejects_the_set() {
        let mut bad = q("2");
        bad["answer"] = json!("z");
        let err = question_set("t", json!({"questions": [q("1"), bad]})).unwrap_err();
        assert!(err.detail.starts_with("question 2"));
    }
}
