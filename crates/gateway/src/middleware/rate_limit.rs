//! Global token bucket rate limiting

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use potd_common::{config::RateLimitConfig, errors::AppError};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<GlobalRateLimiter>,
    limit: u32,
}

impl RateLimitState {
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, AppError> {
        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            AppError::Configuration {
                message: "rate_limit.requests_per_second must be positive".into(),
            }
        })?;
        let burst = NonZeroU32::new(config.burst).unwrap_or(per_second);

        Ok(Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst))),
            limit: config.requests_per_second,
        })
    }
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    match state.limiter.check() {
        Ok(()) => next.run(request).await,
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            AppError::RateLimited { limit: state.limit }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let state = RateLimitState::from_config(&RateLimitConfig {
            requests_per_second: 1,
            burst: 2,
            enabled: true,
        })
        .unwrap();

        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_is_config_error() {
        let result = RateLimitState::from_config(&RateLimitConfig {
            requests_per_second: 0,
            burst: 10,
            enabled: true,
        });
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }
}
