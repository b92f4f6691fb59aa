use thiserror::Error;

/// Errors from repository operations (used by trait definitions in orbi-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the chat transport (update source and reply sink).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(String),

    #[error("transport rejected call: {description}")]
    Rejected {
        description: String,
        error_code: Option<i64>,
    },

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");

        let err = RepositoryError::Connection("pool timed out".to_string());
        assert_eq!(err.to_string(), "database connection error: pool timed out");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Rejected {
            description: "Bad Request: chat not found".to_string(),
            error_code: Some(400),
        };
        assert_eq!(
            err.to_string(),
            "transport rejected call: Bad Request: chat not found"
        );
    }
}
