//! Assembling one test from several generation calls.
//!
//! [`compose_blueprint_test`] fans out one call per blueprint partition and awaits them
//! all together; [`generate_in_batches`] issues fixed-size batches one after another.
//! Both accept a result only if every call returned exactly what was asked for.

use chrono::Utc;
use futures_util::future::join_all;
use rand::seq::SliceRandom;
use tracing::{error, info, instrument, warn};

use crate::blueprint::Blueprint;
use crate::error::GenerationError;
use crate::flows::QuestionSetFlow;
use crate::model::{GeneratedTest, GenerationRequest};

/// Generate every partition of `blueprint` concurrently, concatenate and shuffle.
///
/// One partition with the wrong count, or failing outright, discards the whole test.
/// A missing credential in any partition surfaces as a configuration error.
#[instrument(skip(flow, request, blueprint), fields(exam = %exam, partitions = blueprint.partitions().len(), total = blueprint.total_questions()))]
pub async fn compose_blueprint_test<F>(
    flow: &F,
    exam: &str,
    request: &GenerationRequest,
    blueprint: &Blueprint,
) -> Result<GeneratedTest, GenerationError>
where
    F: QuestionSetFlow + ?Sized,
{
    let sub_requests: Vec<GenerationRequest> = blueprint
        .partitions()
        .iter()
        .map(|part| {
            info!(subject = %part.subject, count = part.count, "Requesting partition");
            request.for_partition(&part.subject, part.count)
        })
        .collect();

    let results = join_all(sub_requests.iter().map(|sub| flow.generate(sub))).await;

    let mut questions = Vec::with_capacity(blueprint.total_questions());
    let mut failures = Vec::new();
    let mut configuration = None;

    for (part, result) in blueprint.partitions().iter().zip(results) {
        match result {
            Ok(test) if test.len() == part.count => questions.extend(test.questions),
            Ok(test) => {
                error!(subject = %part.subject, expected = part.count, got = test.len(), "Partition returned the wrong count");
                failures.push(format!("'{}' returned {} of {}", part.subject, test.len(), part.count));
            }
            Err(GenerationError::Configuration(detail)) => {
                error!(subject = %part.subject, "Partition hit a configuration error");
                configuration = Some(detail);
            }
            Err(e) => {
                error!(subject = %part.subject, error = %e, "Partition failed");
                failures.push(format!("'{}' failed: {}", part.subject, e));
            }
        }
    }

    if let Some(detail) = configuration {
        return Err(GenerationError::Configuration(detail));
    }
    if !failures.is_empty() {
        return Err(GenerationError::IncompleteComposition {
            exam: exam.to_string(),
            detail: failures.join("; "),
        });
    }
    if questions.len() != blueprint.total_questions() {
        error!(got = questions.len(), "Assembled count does not match blueprint total");
        return Err(GenerationError::IncompleteComposition {
            exam: exam.to_string(),
            detail: format!("assembled {} of {} questions", questions.len(), blueprint.total_questions()),
        });
    }

    questions.shuffle(&mut rand::thread_rng());
    info!(questions = questions.len(), "Assembled blueprint test");
    Ok(GeneratedTest::new(questions))
}

/// Generate `request.question_count` questions in sequential batches of at most
/// `batch_size`, each with its own time-derived seed.
#[instrument(skip(flow, request), fields(exam = %request.exam, count = request.question_count))]
pub async fn generate_in_batches<F>(
    flow: &F,
    request: &GenerationRequest,
    batch_size: usize,
) -> Result<GeneratedTest, GenerationError>
where
    F: QuestionSetFlow + ?Sized,
{
    if batch_size == 0 {
        return Err(GenerationError::Configuration("batch size must be at least 1".into()));
    }
    let total = request.question_count;
    let batches = total.div_ceil(batch_size);
    info!(batches, batch_size, "Planning batched generation");

    let mut questions = Vec::with_capacity(total);
    for batch in 0..batches {
        let expected = batch_size.min(total - questions.len());
        let seed = Utc::now().timestamp_millis().unsigned_abs() + batch as u64;
        info!(batch = batch + 1, batches, expected, "Generating batch");

        let result = flow.generate(&request.for_batch(expected, seed)).await?;
        if result.len() != expected {
            warn!(batch = batch + 1, got = result.len(), expected, "Batch returned the wrong count, aborting");
            return Err(GenerationError::IncompleteBatch {
                batch: batch + 1,
                batches,
                got: result.len(),
                expected,
            });
        }
        questions.extend(result.questions);
    }

    info!(questions = questions.len(), "Batched generation complete");
    Ok(GeneratedTest::new(questions))
}
