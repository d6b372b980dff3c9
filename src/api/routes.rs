use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use super::AppState;
use super::{generate, linkedin, posts, recommendations, user};
use crate::middleware::{RateLimiter, enforce_rate_limit};

/// V1 API routes, grouped by rate-limit preset
///
/// ## Generation (20 / hour)
/// - POST /posts/recommendations - Topic recommendations for a role
/// - POST /posts/generate - Draft a post for a topic and tone
///
/// ## LinkedIn (50 / hour)
/// - GET  /linkedin/profile - Profile for a LinkedIn access token
/// - POST /linkedin/post - Publish a stored post (Session Required)
/// - POST /posts/scheduled-publisher - Publish one or all due scheduled posts (Session Required)
///
/// ## Auth (5 / 15 min)
/// - POST /linkedin/exchange-token - OAuth code exchange
/// - POST /linkedin/connect - Store LinkedIn credentials (Session Required)
///
/// ## General API (100 / 15 min, Session Required)
/// - POST /posts - Create post
/// - GET  /posts - List posts
/// - POST /posts/schedule - Schedule post
/// - POST /posts/publish - Mark post published locally
/// - POST /user/survey - Save onboarding survey
/// - GET  /user/survey - Get onboarding survey
/// - GET  /user/streak - Get posting streak
pub fn v1_routes(state: &AppState) -> Router<AppState> {
    let generation = Router::new()
        .route(
            "/posts/recommendations",
            post(recommendations::get_recommendations),
        )
        .route("/posts/generate", post(generate::generate_post));

    let linkedin_api = Router::new()
        .route("/linkedin/profile", get(linkedin::profile))
        .route("/linkedin/post", post(linkedin::post_to_linkedin))
        .route(
            "/posts/scheduled-publisher",
            post(posts::run_scheduled_publisher),
        );

    let auth = Router::new()
        .route("/linkedin/exchange-token", post(linkedin::exchange_token))
        .route("/linkedin/connect", post(linkedin::connect));

    let api = Router::new()
        .route("/posts", post(posts::create_post).get(posts::list_posts))
        .route("/posts/schedule", post(posts::schedule_post))
        .route("/posts/publish", post(posts::publish_post))
        .route("/user/survey", post(user::save_survey).get(user::get_survey))
        .route("/user/streak", get(user::get_streak));

    Router::new()
        .merge(limited(generation, &state.limiters.generation))
        .merge(limited(linkedin_api, &state.limiters.linkedin))
        .merge(limited(auth, &state.limiters.auth))
        .merge(limited(api, &state.limiters.api))
}

fn limited(router: Router<AppState>, limiter: &Arc<RateLimiter>) -> Router<AppState> {
    router.route_layer(from_fn_with_state(Arc::clone(limiter), enforce_rate_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{lazy_state, test_config};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn generate_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/posts/generate")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(r#"{"topic": "testing"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn generation_group_is_throttled_independently() {
        let state = lazy_state(test_config());
        let app = Router::new()
            .nest("/v1", v1_routes(&state))
            .with_state(state);

        for _ in 0..20 {
            let response = app.clone().oneshot(generate_request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key("x-ratelimit-remaining"));
        }

        let response = app.clone().oneshot(generate_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        // Same caller, different preset: still allowed
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/posts")
                    .header("x-forwarded-for", "203.0.113.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
