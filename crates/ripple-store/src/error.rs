//! Error types for ripple-store operations.

use thiserror::Error;

/// Result type alias for ripple-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while configuring or flushing a store.
///
/// Missing intermediate paths and writes to read-only properties are
/// deliberately *not* errors: mutators silently no-op on them instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A method expression such as `fn(a, b.c)` could not be parsed.
    ///
    /// Raised at registration time, never during a flush.
    #[error("malformed method expression: {expression}")]
    MalformedExpression {
        /// The expression that failed to parse.
        expression: String,
    },

    /// The computed-property fixpoint did not converge.
    ///
    /// Raised either at build time (a statically detectable dependency
    /// cycle) or during a flush when the iteration bound is exhausted.
    #[error("computed properties did not converge: {detail}")]
    ComputedCycle {
        /// What was detected and where.
        detail: String,
    },
}

impl StoreError {
    /// Create a malformed expression error.
    #[inline]
    pub fn malformed_expression(expression: impl Into<String>) -> Self {
        StoreError::MalformedExpression {
            expression: expression.into(),
        }
    }

    /// Create a computed cycle error.
    #[inline]
    pub fn computed_cycle(detail: impl Into<String>) -> Self {
        StoreError::ComputedCycle {
            detail: detail.into(),
        }
    }
}
