use thiserror::Error;

/// Error reported by a [`FrameProvider`](crate::chain::FrameProvider)
///
/// The conversion chain never inspects or retries it; it is handed back to
/// the caller unchanged inside [`ConversionError::Provider`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Description of the failure
    pub message: String,
    /// The underlying source of the error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Create a provider error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a provider error wrapping an underlying error
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors that can occur while configuring or running a conversion
#[derive(Debug, Error)]
pub enum ConversionError {
    // ===== Configuration Errors =====
    /// The spec pair does not match the responsibility of the component
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        message: String,
    },

    /// Scratch or accumulation buffer allocation failed
    #[error("out of memory: could not allocate {requested} bytes")]
    OutOfMemory {
        /// Size of the failed allocation in bytes
        requested: usize,
    },

    /// Operation requires a configured, non-trivial conversion chain
    #[error("not initialized: {message}")]
    NotInitialized {
        /// Description of what is missing
        message: String,
    },

    /// Invalid stream parameter requested by a client
    #[error("invalid parameter: {name} - {message}")]
    InvalidParameter {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },

    // ===== Runtime Errors =====
    /// Error propagated from the frame provider
    #[error("frame provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The rate-conversion primitive failed while processing
    #[error("resampling failed: {message}")]
    ResampleFailed {
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ConversionError {
    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub(crate) fn not_initialized(message: impl Into<String>) -> Self {
        Self::NotInitialized {
            message: message.into(),
        }
    }

    pub(crate) fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Check if this error comes from a rejected configuration
    ///
    /// The stream layer refuses to start audio I/O on these rather than retry.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation { .. } | Self::OutOfMemory { .. } | Self::InvalidParameter { .. }
        )
    }

    /// Check if this error was raised by the frame provider
    #[must_use]
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConversionError>;
