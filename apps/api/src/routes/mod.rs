pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::matching::handlers as matching;
use crate::normalizer::handlers as skills;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Skill taxonomy
        .route("/api/v1/skills", post(skills::handle_register_skill))
        .route("/api/v1/skills/normalize", post(skills::handle_normalize))
        .route("/api/v1/skills/suggest", get(skills::handle_suggest))
        // Ad-hoc matching
        .route("/api/v1/matches/pair", post(matching::handle_match_pair))
        .route("/api/v1/matches/skills", post(matching::handle_match_skills))
        .route("/api/v1/matches/batch", post(matching::handle_match_batch))
        // Cached listings
        .route("/api/v1/jobs/:id/matches", get(matching::handle_job_matches))
        .route(
            "/api/v1/candidates/:id/matches",
            get(matching::handle_candidate_matches),
        )
        .route("/api/v1/jobs/:id/refresh", post(matching::handle_refresh_job))
        .route(
            "/api/v1/candidates/:id/refresh",
            post(matching::handle_refresh_candidate),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, candidate, job};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_serves_batch_matches() {
        let fixture = test_support::fixture().await;
        let c = fixture.add_candidate(candidate(&["React", "Python"])).await;
        let j = fixture.add_job(job(&["React"])).await;
        let app = build_router(fixture.state());

        let body = serde_json::json!({ "candidate_ids": [c], "job_ids": [j] });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/matches/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(report["results"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_router_serves_health() {
        let fixture = test_support::fixture().await;
        let response = build_router(fixture.state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
