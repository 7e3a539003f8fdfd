//! Error types for the animancer core.
//!
//! Nothing here is fatal: a failed play call leaves the layer as it was.

/// Why a layer refused a request even though everything was wired correctly.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("gating condition is false")]
    ConditionFalse,
    #[error("current motion outranks the request")]
    Outranked,
    #[error("request is already the current motion")]
    SameMotion,
    #[error("layer is mid-transition")]
    InTransition,
}

/// Failure of a play or enqueue call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlayError {
    /// Expected, frequent outcome of priority/transition/hash policy.
    #[error("rejected by policy: {reason}")]
    Rejected { reason: RejectReason },

    /// The layer or machine is not wired up (or already torn down).
    #[error("invalid state: {reason}")]
    InvalidState { reason: &'static str },

    /// Caller contract violation, e.g. a queued request without a gating predicate.
    #[error("malformed request: {reason}")]
    MalformedRequest { reason: &'static str },
}

impl PlayError {
    #[inline]
    pub(crate) fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    /// True for policy rejections, which callers should treat as normal flow.
    #[inline]
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    #[inline]
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Get error category for logging/metrics
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "policy",
            Self::InvalidState { .. } => "state",
            Self::MalformedRequest { .. } => "request",
        }
    }
}

/// Failure to load authored descriptors or masks.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LoadError {
    #[error("parse error: {reason}")]
    Parse { reason: String },

    #[error("invalid data: {reason}")]
    Invalid { reason: String },
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}
