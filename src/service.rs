//! The public face of the crate: one method per externally exposed operation.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::blueprint::BlueprintRegistry;
use crate::cache::{mock_test_key, CacheGate, CacheKey};
use crate::clients::flexible::FlexibleClient;
use crate::composer::{compose_blueprint_test, generate_in_batches};
use crate::config::ForgeConfig;
use crate::core::{LowLevelClient, PromptInvoker, RetryConfig};
use crate::error::GenerationError;
use crate::flows::{CurrentAffairsFlow, CustomTestFlow, MockTestFlow, NcertFlow, SingleQuestionFlow};
use crate::model::{
    CurrentAffairsRequest, CustomTestRequest, GeneratedTest, GenerationRequest, NcertTestRequest, PyqRequest,
    Question, QuestionDraft,
};
use crate::prompts::PromptCatalog;
use crate::pyq::PyqResolver;
use crate::store::{DocumentStore, FileStore, MemoryStore};

/// Every generation flow wired to one completion client and one document store.
#[derive(Debug)]
pub struct ExamService<C: LowLevelClient> {
    mock_test: MockTestFlow<C>,
    custom_test: CustomTestFlow<C>,
    current_affairs: CurrentAffairsFlow<C>,
    ncert: NcertFlow<C>,
    single_question: SingleQuestionFlow<C>,
    blueprints: BlueprintRegistry,
    cache: CacheGate,
    pyq: PyqResolver,
    store: Arc<dyn DocumentStore>,
    batch_size: usize,
}

impl<C: LowLevelClient> ExamService<C> {
    pub fn new(
        client: C,
        store: Arc<dyn DocumentStore>,
        blueprints: BlueprintRegistry,
        config: &ForgeConfig,
    ) -> Result<Self, GenerationError> {
        config.validate()?;
        let invoker = Arc::new(PromptInvoker::new(client, RetryConfig { max_attempts: config.max_attempts }));
        let catalog = PromptCatalog::standard()?;

        Ok(Self {
            mock_test: MockTestFlow::new(invoker.clone(), catalog.mock_test),
            custom_test: CustomTestFlow::new(invoker.clone(), catalog.custom_test),
            current_affairs: CurrentAffairsFlow::new(invoker.clone(), catalog.current_affairs),
            ncert: NcertFlow::new(invoker.clone(), catalog.ncert),
            single_question: SingleQuestionFlow::new(invoker, catalog.single_question),
            blueprints,
            cache: CacheGate::new(store.clone()),
            pyq: PyqResolver::new(store.clone()),
            store,
            batch_size: config.batch_size,
        })
    }

    pub fn blueprints(&self) -> &BlueprintRegistry {
        &self.blueprints
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Full mock test. Non-personalized requests are served from and written to the cache.
    ///
    /// Multi-subject requests for an exam with a registered blueprint are composed
    /// partition by partition; everything else is generated in sequential batches.
    /// Either path fails outright rather than returning a short test.
    #[instrument(skip(self, request), fields(exam = %request.exam, subjects = request.subjects.len(), count = request.question_count))]
    pub async fn generate_mock_test(&self, request: &GenerationRequest) -> Result<GeneratedTest, GenerationError> {
        request.validate()?;
        self.cache
            .resolve(mock_test_key(request), || self.generate_mock_test_uncached(request))
            .await
    }

    async fn generate_mock_test_uncached(&self, request: &GenerationRequest) -> Result<GeneratedTest, GenerationError> {
        match self.blueprints.get(&request.exam) {
            Some(blueprint) if request.subjects.len() > 1 => {
                if blueprint.total_questions() != request.question_count {
                    debug!(
                        requested = request.question_count,
                        blueprint_total = blueprint.total_questions(),
                        "Blueprint total overrides the requested count"
                    );
                }
                info!(partitions = blueprint.partitions().len(), "Using exam blueprint");
                compose_blueprint_test(&self.mock_test, &request.exam, request, blueprint).await
            }
            _ => {
                info!("No blueprint applies, generating in batches");
                generate_in_batches(&self.mock_test, request, self.batch_size).await
            }
        }
    }

    /// Single-topic test; empty when the model misses the requested count.
    pub async fn generate_custom_test(&self, request: &CustomTestRequest) -> Result<GeneratedTest, GenerationError> {
        self.custom_test.generate(request).await
    }

    /// Ten questions on one day's news, cached by date.
    #[instrument(skip(self, request), fields(date = %request.date))]
    pub async fn generate_current_affairs(
        &self,
        request: &CurrentAffairsRequest,
    ) -> Result<GeneratedTest, GenerationError> {
        self.cache
            .resolve(Some(CacheKey::for_current_affairs(request)), || {
                self.current_affairs.generate(request)
            })
            .await
    }

    /// Fifteen chapter questions; empty on a count mismatch.
    pub async fn generate_ncert_test(&self, request: &NcertTestRequest) -> Result<GeneratedTest, GenerationError> {
        self.ncert.generate(request).await
    }

    /// Complete a user's raw question; the empty-field placeholder when the model's
    /// answer is unusable.
    pub async fn create_question(&self, draft: &QuestionDraft) -> Result<Question, GenerationError> {
        self.single_question.create(draft).await
    }

    /// Stored previous-year questions if there are enough, else a generated mock test of
    /// the same size.
    pub async fn resolve_pyq_test(&self, request: &PyqRequest) -> Result<GeneratedTest, GenerationError> {
        self.pyq
            .resolve(request, |fallback| async move { self.generate_mock_test(&fallback).await })
            .await
    }
}

impl ExamService<FlexibleClient> {
    /// Wire the service from process configuration: the configured provider, a file
    /// store when a store directory is set (in-memory otherwise), and the blueprints file
    /// when given (the built-in registry otherwise).
    pub fn from_config(config: &ForgeConfig) -> Result<Self, GenerationError> {
        let client =
            FlexibleClient::from_type(config.provider, config.model.clone()).map_err(GenerationError::Configuration)?;

        let store: Arc<dyn DocumentStore> = match &config.store_dir {
            Some(dir) => Arc::new(FileStore::new(dir.clone())),
            None => Arc::new(MemoryStore::new()),
        };

        let blueprints = match &config.blueprints_path {
            Some(path) => BlueprintRegistry::from_file(path)?,
            None => BlueprintRegistry::standard(),
        };

        Self::new(client, store, blueprints, config)
    }
}

/// Keep the first question for each distinct first-language text, preserving order.
pub fn filter_duplicates(questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    let before = questions.len();
    let unique: Vec<Question> = questions
        .into_iter()
        .filter(|q| seen.insert(q.first_language_segment().to_string()))
        .collect();
    if unique.len() != before {
        debug!(removed = before - unique.len(), "Filtered duplicate questions");
    }
    unique
}
