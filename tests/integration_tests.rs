
use exam_forge::blueprint::BlueprintRegistry;
use exam_forge::clients::mock::{MockClient, MockResponse};
use exam_forge::config::ForgeConfig;
use exam_forge::store::{DocumentStore, FileStore, GENERATED_TESTS, PYQ_QUESTIONS};
use exam_forge::{
    CurrentAffairsRequest, CustomTestRequest, ExamService, GenerationError, GenerationRequest, PyqRequest, Question,
    QuestionDraft,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::test_utils::{four_way_registry, harness, harness_with, question_set, subject_marker};

fn exam_a_request() -> GenerationRequest {
    GenerationRequest::new("Exam-A", ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect(), 100)
}

#[tokio::test]
async fn cacheable_request_generates_once() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push(question_set("History", 10));
    let request = GenerationRequest::new("SSC CGL", vec!["History".into()], 10).with_year(Some(2023));

    let first = h.service.generate_mock_test(&request).await.unwrap();
    let second = h.service.generate_mock_test(&request.clone().with_seed(7)).await.unwrap();

    assert_eq!(h.handle.call_count(), 1);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(h.store.len(GENERATED_TESTS).await, 1);
}

#[tokio::test]
async fn personalized_request_bypasses_the_cache() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push_many([question_set("Maths", 5), question_set("Maths", 5)]);
    let request = GenerationRequest::new("SSC CGL", vec!["Maths".into()], 5).with_weak_topics(vec!["Ratio".into()]);

    h.service.generate_mock_test(&request).await.unwrap();
    h.service.generate_mock_test(&request).await.unwrap();

    assert_eq!(h.handle.call_count(), 2);
    assert_eq!(h.store.len(GENERATED_TESTS).await, 0);
}

#[tokio::test]
async fn blueprint_exam_is_composed_from_every_partition() {
    let h = harness(four_way_registry());
    for subject in ["A", "B", "C", "D"] {
        h.handle.route(subject_marker(subject), [question_set(subject, 25)]);
    }

    let test = h.service.generate_mock_test(&exam_a_request()).await.unwrap();

    assert_eq!(test.len(), 100);
    assert_eq!(h.handle.call_count(), 4);
    let mut per_subject: HashMap<&str, usize> = HashMap::new();
    for q in &test.questions {
        *per_subject.entry(q.subject.as_str()).or_default() += 1;
    }
    assert!(per_subject.values().all(|&n| n == 25));
    assert!(test.questions.iter().all(|q| q.options.len() == 4 && q.options.contains(&q.answer)));
}

#[tokio::test]
async fn one_short_partition_fails_the_whole_blueprint_test() {
    let h = harness(four_way_registry());
    h.handle.route(subject_marker("A"), [question_set("A", 25)]);
    h.handle.route(subject_marker("B"), [question_set("B", 25)]);
    h.handle.route(subject_marker("C"), [question_set("C", 24)]);
    h.handle.route(subject_marker("D"), [question_set("D", 25)]);

    let err = h.service.generate_mock_test(&exam_a_request()).await.unwrap_err();

    assert!(matches!(err, GenerationError::IncompleteComposition { .. }), "got {err}");
    assert_eq!(err.user_message(), "AI failed to generate a complete test. Please try again.");
    assert_eq!(h.store.len(GENERATED_TESTS).await, 0);
}

#[tokio::test]
async fn single_subject_request_for_a_blueprint_exam_uses_batches() {
    let h = harness(four_way_registry());
    h.handle.push_many([question_set("A", 20), question_set("A", 10)]);
    let request = GenerationRequest::new("Exam-A", vec!["A".into()], 30);

    let test = h.service.generate_mock_test(&request).await.unwrap();

    assert_eq!(test.len(), 30);
    let prompts = h.handle.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].user.contains("with 20 questions"));
    assert!(prompts[1].user.contains("with 10 questions"));
}

#[tokio::test]
async fn custom_test_with_one_missing_question_is_empty() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push(question_set("Polity", 9));

    let test = h
        .service
        .generate_custom_test(&CustomTestRequest::new("Polity", "Fundamental Rights", 10))
        .await
        .unwrap();

    assert!(test.is_empty());
    assert_eq!(h.handle.call_count(), 1);
}

#[tokio::test]
async fn failed_call_is_retried_once() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push_many([MockResponse::Error("upstream 500".into()), question_set("Polity", 5)]);

    let test = h
        .service
        .generate_custom_test(&CustomTestRequest::new("Polity", "Parliament", 5))
        .await
        .unwrap();

    assert_eq!(test.len(), 5);
    assert_eq!(h.handle.call_count(), 2);
}

#[tokio::test]
async fn two_failed_attempts_surface_as_an_error() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push_many([MockResponse::Text("   ".into()), MockResponse::Error("timeout".into())]);

    let err = h
        .service
        .generate_custom_test(&CustomTestRequest::new("Polity", "Parliament", 5))
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Invoke(_)), "got {err}");
    assert_eq!(h.handle.call_count(), 2);
}

#[tokio::test]
async fn current_affairs_for_a_date_is_generated_once() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push(question_set("Current Affairs", 10));
    let request = CurrentAffairsRequest::for_date(Some("2024-05-01")).unwrap();

    let first = h.service.generate_current_affairs(&request).await.unwrap();
    let calls_after_first = h.handle.call_count();
    let again = CurrentAffairsRequest::for_date(Some("2024-05-01")).unwrap();
    let second = h.service.generate_current_affairs(&again).await.unwrap();

    assert_eq!(calls_after_first, 1);
    assert_eq!(h.handle.call_count(), 1);
    assert_eq!(first.questions, second.questions);
    assert!(h.store.get(GENERATED_TESTS, "current-affairs-2024-05-01").await.unwrap().is_some());
}

#[tokio::test]
async fn failed_current_affairs_quiz_is_not_cached() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push_many([question_set("Current Affairs", 8), question_set("Current Affairs", 10)]);
    let request = CurrentAffairsRequest::for_date(Some("2024-05-02")).unwrap();

    assert!(h.service.generate_current_affairs(&request).await.unwrap().is_empty());
    assert_eq!(h.service.generate_current_affairs(&request).await.unwrap().len(), 10);
    assert_eq!(h.handle.call_count(), 2);
}

#[tokio::test]
async fn too_few_stored_pyqs_trigger_a_full_generation() {
    let h = harness(BlueprintRegistry::new());
    for i in 0..12 {
        h.store
            .insert(
                PYQ_QUESTIONS,
                json!({
                    "exam": "Exam-B",
                    "subject": "Maths",
                    "year": 2021,
                    "question_en": format!("Stored question {}", i),
                    "options": ["1", "2", "3", "4"],
                    "answer": "1",
                    "solution": "Given."
                }),
            )
            .await
            .unwrap();
    }
    h.handle.push(question_set("Maths", 20));

    let test = h
        .service
        .resolve_pyq_test(&PyqRequest::new("Exam-B", "Maths", None, 20))
        .await
        .unwrap();

    assert_eq!(test.len(), 20);
    assert_eq!(h.handle.call_count(), 1);
    assert!(test.questions.iter().all(|q| !q.question_text.starts_with("Stored question")));
}

#[tokio::test]
async fn stored_pyqs_with_broken_options_are_never_served() {
    let h = harness(BlueprintRegistry::new());
    for i in 0..5 {
        h.store
            .insert(
                PYQ_QUESTIONS,
                json!({
                    "exam": "Exam-B",
                    "subject": "Maths",
                    "question_en": format!("Stored question {}", i),
                    "options": ["1", "2", "3"],
                    "answer": "7",
                    "solution": "Given."
                }),
            )
            .await
            .unwrap();
    }
    h.handle.push(question_set("Maths", 5));

    let test = h
        .service
        .resolve_pyq_test(&PyqRequest::new("Exam-B", "Maths", None, 5))
        .await
        .unwrap();

    assert_eq!(h.handle.call_count(), 1);
    assert_eq!(test.len(), 5);
    assert!(test.questions.iter().all(|q| q.options.len() == 4 && q.options.contains(&q.answer)));
}

#[tokio::test]
async fn failed_single_question_falls_back_to_the_placeholder() {
    let h = harness(BlueprintRegistry::new());
    h.handle.push_many([MockResponse::Error("a".into()), MockResponse::Error("b".into())]);

    let question = h.service.create_question(&QuestionDraft::new("What is 2 + 2?")).await.unwrap();

    assert_eq!(question, Question::placeholder());
    assert_eq!(h.handle.call_count(), 2);
}

#[tokio::test]
async fn missing_credential_fails_before_any_call() {
    let h = harness_with(BlueprintRegistry::new(), MockClient::unconfigured());
    h.handle.push(question_set("History", 5));

    let err = h
        .service
        .generate_mock_test(&GenerationRequest::new("SSC CGL", vec!["History".into()], 5))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_ne!(err.user_message(), "AI failed to generate a complete test. Please try again.");
    assert_eq!(h.handle.call_count(), 0);
}

#[tokio::test]
async fn missing_credential_in_a_blueprint_test_is_a_configuration_error() {
    let h = harness_with(four_way_registry(), MockClient::unconfigured());
    let err = h.service.generate_mock_test(&exam_a_request()).await.unwrap_err();
    assert!(err.is_configuration(), "got {err}");
}

#[tokio::test]
async fn file_store_cache_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let request = GenerationRequest::new("RRB NTPC", vec!["Reasoning".into()], 5);

    let (client, handle) = MockClient::with_responses(vec![question_set("Reasoning", 5)]);
    let first_service = ExamService::new(
        client,
        Arc::new(FileStore::new(dir.path())),
        BlueprintRegistry::new(),
        &ForgeConfig::default(),
    )
    .unwrap();
    let first = first_service.generate_mock_test(&request).await.unwrap();
    assert_eq!(handle.call_count(), 1);

    let (client, handle) = MockClient::new();
    let second_service = ExamService::new(
        client,
        Arc::new(FileStore::new(dir.path())),
        BlueprintRegistry::new(),
        &ForgeConfig::default(),
    )
    .unwrap();
    let second = second_service.generate_mock_test(&request).await.unwrap();

    assert_eq!(handle.call_count(), 0);
    assert_eq!(first, second);
}
