use thiserror::Error;

/// Failure reported by a completion-service provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Authentication failed")]
    Authentication,
}

#[derive(Error, Debug)]
pub enum AIError {
    #[error("Gemini API error: {0}")]
    Gemini(ProviderError),
    #[error("Claude API error: {0}")]
    Claude(ProviderError),
    #[error("DeepSeek API error: {0}")]
    DeepSeek(ProviderError),
    #[error("Mock error: {0}")]
    Mock(String),
    #[error("{0} is not set in the environment")]
    MissingCredential(&'static str),
}

/// Errors raised by [`crate::core::PromptInvoker`].
#[derive(Error, Debug)]
pub enum InvokeError {
    /// No credential for the completion service. Never retried.
    #[error("AI configuration error: {0}")]
    Configuration(#[source] AIError),
    #[error("AI returned an empty string")]
    EmptyOutput,
    #[error("AI returned an empty or invalid output")]
    InvalidOutput,
    #[error("AI error: {0}")]
    Ai(#[from] AIError),
    #[error("prompt '{prompt}' failed after {attempts} attempt(s): {last}")]
    AttemptsExhausted {
        prompt: String,
        attempts: usize,
        #[source]
        last: Box<InvokeError>,
    },
}

impl InvokeError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, InvokeError::Configuration(_))
    }
}

/// A structurally valid response that breaks the count/shape rule a flow demands.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{flow}: {detail}")]
pub struct ContractViolation {
    pub flow: &'static str,
    pub detail: String,
}

impl ContractViolation {
    pub fn new(flow: &'static str, detail: impl Into<String>) -> Self {
        Self { flow, detail: detail.into() }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Invoke(InvokeError),
    #[error("contract violation in {0}")]
    Contract(#[from] ContractViolation),
    #[error("incomplete generation for blueprint '{exam}': {detail}")]
    IncompleteComposition { exam: String, detail: String },
    #[error("batch {batch}/{batches} returned {got} of {expected} questions")]
    IncompleteBatch {
        batch: usize,
        batches: usize,
        got: usize,
        expected: usize,
    },
    #[error("no blueprint registered for exam '{0}'")]
    UnknownBlueprint(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<InvokeError> for GenerationError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Configuration(source) => GenerationError::Configuration(source.to_string()),
            other => GenerationError::Invoke(other),
        }
    }
}

impl GenerationError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, GenerationError::Configuration(_))
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, GenerationError::Contract(_))
    }

    /// Message safe to show an end user. Raw upstream detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::Configuration(_) => {
                "AI configuration error: the completion service credential is missing."
            }
            GenerationError::InvalidRequest(_) | GenerationError::UnknownBlueprint(_) => {
                "Invalid input. Please check the request and try again."
            }
            GenerationError::IncompleteComposition { .. } | GenerationError::IncompleteBatch { .. } => {
                "AI failed to generate a complete test. Please try again."
            }
            _ => "An unexpected error occurred while generating questions. Please try again.",
        }
    }
}
