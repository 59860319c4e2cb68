//! Types describing how a request was handled.

/// Result of processing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Served from the cache.
    CacheHit { published: bool },
    /// Generated fresh; `cached` is whether the cache write succeeded.
    Generated { published: bool, cached: bool },
    /// The generation service produced an error document. Never cached.
    Rejected { published: bool },
    /// The generation call failed or timed out. Nothing was published.
    GenerationFailed { reason: String },
    /// The generation reply held no usable JSON object. Nothing was published.
    InvalidResponse { reason: String },
}

impl ProcessOutcome {
    /// Whether a document reached the outbound destination.
    pub fn published(&self) -> bool {
        match self {
            Self::CacheHit { published }
            | Self::Generated { published, .. }
            | Self::Rejected { published } => *published,
            Self::GenerationFailed { .. } | Self::InvalidResponse { .. } => false,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CacheHit { .. } => "cache_hit",
            Self::Generated { .. } => "generated",
            Self::Rejected { .. } => "rejected",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}
