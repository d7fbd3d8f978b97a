//! Error types for the registry handle.

use tally_kernel::KernelError;
use tally_types::CallerId;
use thiserror::Error;

/// Errors returned by [`crate::Registry`] operations.
#[derive(Error, Debug)]
pub enum TallyError {
    /// The kernel rejected the command. Nothing was committed.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// The caller is not allowed to mutate the registry.
    #[error("caller {0} is not authorized to mutate the registry")]
    Unauthorized(CallerId),

    /// Internal error (lock poisoning and the like).
    #[error("internal error: {0}")]
    Internal(String),
}

impl TallyError {
    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        TallyError::Internal(msg.into())
    }

    /// Returns the kernel error, if the kernel rejected the command.
    pub fn as_kernel(&self) -> Option<&KernelError> {
        match self {
            TallyError::Kernel(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, TallyError>;
