use std::sync::Arc;

use crate::appraisal::AppraisalStore;
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::db;
use crate::history::HistoryStore;
use crate::llm::ollama::OllamaProvider;
use crate::llm::provider::LlmProvider;
use crate::pipeline::{ChatPipeline, PipelineConfig};
use crate::rag::{RuleIndex, SqliteRuleIndex};

pub mod error;

use error::InitializationError;

/// Shared application state: every service handle the request path needs,
/// constructed once at startup and passed in explicitly. Nothing here is a
/// hidden global.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub history: HistoryStore,
    pub rules: Arc<dyn RuleIndex>,
    pub llm: Arc<dyn LlmProvider>,
    pub pipeline: ChatPipeline,
}

impl AppState {
    /// Paths and config first, then the shared pool, then the stores and
    /// services that hang off it, then the pipeline wiring them together.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone())
            .load()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let db_path = paths.data_dir.join(&config.database.file);
        let pool = db::connect(&db_path)
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;

        let history = HistoryStore::new(pool.clone())
            .await
            .map_err(|e| InitializationError::History(e.into()))?;

        let appraisal = AppraisalStore::new(pool.clone())
            .await
            .map_err(|e| InitializationError::Appraisal(e.into()))?;

        let llm: Arc<dyn LlmProvider> =
            Arc::new(OllamaProvider::new(config.ollama.base_url.clone()));

        let rules: Arc<dyn RuleIndex> = Arc::new(
            SqliteRuleIndex::new(pool, llm.clone(), config.ollama.embedding_model.clone())
                .await
                .map_err(|e| InitializationError::RuleIndex(e.into()))?,
        );

        let pipeline = ChatPipeline::new(
            history.clone(),
            appraisal,
            rules.clone(),
            llm.clone(),
            PipelineConfig {
                chat_model: config.ollama.chat_model.clone(),
                top_k: config.retrieval.top_k,
                memory_window: config.memory.window,
            },
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            history,
            rules,
            llm,
            pipeline,
        }))
    }
}
