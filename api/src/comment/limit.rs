use std::num::NonZeroU32;

use axum::http::StatusCode;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::ApiRequestError;

#[derive(thiserror::Error, Debug)]
pub enum RateLimitError {
    #[error("You're doing that too often, please wait a moment and try again.")]
    TooManyRequests,
}

impl ApiRequestError for RateLimitError {
    fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }
}

/// Per-identity limit on posting, editing, voting and reporting.
pub struct MutationLimiter {
    limiter: DefaultKeyedRateLimiter<i32>,
}

impl MutationLimiter {
    pub fn per_minute(burst: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(burst)),
        }
    }

    pub fn check(&self, identity_id: i32) -> Result<(), RateLimitError> {
        self.limiter.check_key(&identity_id).map_err(|_| {
            tracing::info!(identity_id, "Comment mutation rate limited");
            RateLimitError::TooManyRequests
        })
    }

    /// Drops the state of identities whose quota has fully replenished.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_limit_is_per_identity() {
        let limiter = MutationLimiter::per_minute(NonZeroU32::new(2).unwrap());

        assert!(limiter.check(1).is_ok());
        assert!(limiter.check(1).is_ok());
        assert!(limiter.check(1).is_err());

        assert!(limiter.check(2).is_ok());

        limiter.prune();
        assert!(limiter.check(1).is_err());
    }
}
