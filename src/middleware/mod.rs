pub mod auth;
pub mod rate_limit;

pub use auth::{
    ApiError, AuthenticatedUser, ErrorResponse, api_error, require_user_from_headers,
};
pub use rate_limit::{RateLimitConfig, RateLimiter, RateLimiters, enforce_rate_limit};
