use thiserror::Error;

/// Reasons an interceptor can fail. Any failure is treated as a rejection.
#[derive(Debug, Error)]
pub enum InterceptorError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl InterceptorError {
    pub fn msg(message: impl Into<String>) -> Self {
        InterceptorError::Message(message.into())
    }
}

impl From<serde_json::Error> for InterceptorError {
    fn from(err: serde_json::Error) -> Self {
        InterceptorError::Other(Box::new(err))
    }
}
