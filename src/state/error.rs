use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to open database: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Failed to initialize history store: {0}")]
    History(#[source] anyhow::Error),

    #[error("Failed to initialize appraisal store: {0}")]
    Appraisal(#[source] anyhow::Error),

    #[error("Failed to initialize rule index: {0}")]
    RuleIndex(#[source] anyhow::Error),
}
