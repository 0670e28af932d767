use thiserror::Error;

/// Shared lightweight error type for core primitive operations.
#[derive(Debug, Error)]
pub enum FerryError {
    /// Endpoint text did not parse as `ipn:node.service`.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(&'static str),
    /// Route fails basic usability checks.
    #[error("invalid route: {0}")]
    InvalidRoute(&'static str),
}

#[cfg(test)]
mod tests {
    use super::FerryError;

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(
            FerryError::InvalidEndpoint("missing ipn scheme").to_string(),
            "invalid endpoint: missing ipn scheme"
        );
        assert_eq!(
            FerryError::InvalidRoute("null local endpoint").to_string(),
            "invalid route: null local endpoint"
        );
    }
}
