use axum::{Json, extract::State};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceStatus,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub database: bool,
    pub llm_configured: bool,
    /// Rate-limit counters are held in Redis (not just configured)
    pub redis_connected: bool,
    pub linkedin_oauth_configured: bool,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
}

/// Liveness probe; touches nothing.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { status: "ok" })
}

/// Reports database reachability and which optional integrations are configured.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();

    Json(HealthResponse {
        status: if db_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: ServiceStatus {
            database: db_healthy,
            llm_configured: state.llm.is_some(),
            redis_connected: state.limiters.api.is_shared(),
            linkedin_oauth_configured: state.linkedin.oauth_configured(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{lazy_state, test_config};
    use crate::config::Config;

    #[tokio::test]
    async fn ping_is_ok() {
        assert_eq!(ping().await.0.status, "ok");
    }

    #[tokio::test]
    async fn unreachable_database_is_degraded() {
        let Json(health) = health_check(State(lazy_state(test_config()))).await;
        assert_eq!(health.status, "degraded");
        assert!(!health.services.database);
        assert!(!health.services.llm_configured);
        assert!(!health.services.redis_connected);
    }

    #[tokio::test]
    async fn configured_but_unused_redis_is_not_reported() {
        let config = Config {
            redis_url: Some("redis://127.0.0.1:1".into()),
            ..test_config()
        };
        // lazy_state always runs on in-memory limiters, as main does when Redis is down
        let Json(health) = health_check(State(lazy_state(config))).await;
        assert!(!health.services.redis_connected);
    }
}
