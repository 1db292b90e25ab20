pub mod blueprint;
pub mod cache;
pub mod clients;
pub mod composer;
pub mod config;
pub mod core;
pub mod error;
pub mod flows;
pub mod json_utils;
pub mod model;
pub mod prompts;
pub mod pyq;
pub mod service;
pub mod store;
pub mod telemetry;

// Convenient re-exports
pub use blueprint::{Blueprint, BlueprintRegistry, Partition};
pub use cache::{CacheGate, CacheKey};
pub use config::ForgeConfig;
pub use error::{GenerationError, InvokeError};
pub use json_utils::extract_json;
pub use model::{
    CurrentAffairsRequest, CustomTestRequest, Difficulty, GeneratedTest, GenerationRequest, NcertTestRequest,
    PyqRequest, Question, QuestionDraft,
};
pub use service::{filter_duplicates, ExamService};
