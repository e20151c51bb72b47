//! Keyword planning route.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use keyplan_core::{Error, PipelineOptions};
use keyplan_ingest::RawListing;
use keyplan_runtime::RunReport;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/keywords", post(plan_keywords))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordsRequest {
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Overrides the server defaults wholesale; missing fields take defaults.
    #[serde(default)]
    pub options: Option<PipelineOptions>,
    /// Already-scraped listing (meta keywords, competitors). Skips the
    /// store lookup when present.
    #[serde(default)]
    pub listing: Option<RawListing>,
}

impl KeywordsRequest {
    fn identifier(&self) -> Option<&str> {
        self.app_url
            .as_deref()
            .or(self.app_id.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Run report plus generation timestamp, as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordsResponse {
    #[serde(flatten)]
    pub report: RunReport,
    pub generated_at: String,
}

impl From<RunReport> for KeywordsResponse {
    fn from(report: RunReport) -> Self {
        Self {
            report,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Pipeline error rendered as `{error, kind}` with the mapped status.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "kind": kind,
        }));

        let mut response = (status, body).into_response();
        if let Error::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } = &self.0
        {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

enum RunTarget<'a> {
    Listing(&'a RawListing),
    Store(&'a str),
}

/// POST /api/keywords: run the pipeline for one app.
async fn plan_keywords(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KeywordsRequest>,
) -> Result<Json<KeywordsResponse>, ApiError> {
    let target = match (&req.listing, req.identifier()) {
        (Some(listing), _) => RunTarget::Listing(listing),
        (None, Some(identifier)) => RunTarget::Store(identifier),
        (None, None) => {
            return Err(Error::MalformedInput("appUrl, appId or listing is required".into()).into())
        }
    };

    let mut options = req
        .options
        .clone()
        .unwrap_or_else(|| state.config.default_options.clone());
    if let Some(country) = req.country.as_deref() {
        options.country = country.trim().to_lowercase();
    }

    let pipeline = state.pipeline.as_ref().ok_or_else(|| {
        Error::Config(
            state
                .setup_error
                .clone()
                .unwrap_or_else(|| "keyword pipeline is not configured".into()),
        )
    })?;

    let (label, result) = match target {
        RunTarget::Listing(listing) => {
            let label = listing
                .app_id
                .clone()
                .or_else(|| listing.title.clone())
                .unwrap_or_else(|| "inline listing".into());
            (label, pipeline.run_document(listing, &options).await)
        }
        RunTarget::Store(identifier) => (
            identifier.to_string(),
            pipeline.run_with_report(identifier, &options).await,
        ),
    };

    match result {
        Ok(report) => {
            info!("Run {} returned {} keywords", report.run_id, report.keywords.len());
            Ok(Json(report.into()))
        }
        Err(e) => {
            warn!("Keyword run for {} failed: {}", label, e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::build_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use keyplan_core::KeyplanConfig;
    use keyplan_infer::LexicalEmbedder;
    use keyplan_ingest::{RawListing, StaticListingSource};
    use keyplan_llm::{LanguageModel, Prompt};
    use keyplan_resolve::EmptyIndex;
    use keyplan_runtime::Pipeline;
    use tower::ServiceExt;

    struct FixedModel(std::result::Result<&'static str, u64>);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn complete(&self, _prompt: &Prompt) -> keyplan_core::Result<String> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(secs) => Err(Error::RateLimited {
                    message: "API error 429".into(),
                    retry_after_secs: Some(secs),
                }),
            }
        }
        fn model_name(&self) -> String {
            "fixed".into()
        }
    }

    #[derive(Default)]
    struct RecordingModel(std::sync::Mutex<Option<String>>);

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &Prompt) -> keyplan_core::Result<String> {
            *self.0.lock().unwrap() = Some(prompt.user.clone());
            Ok("tower builder | 0.8 | genre\nidle tycoon | 0.6 | genre".into())
        }
        fn model_name(&self) -> String {
            "recording".into()
        }
    }

    fn state(model: FixedModel) -> Arc<AppState> {
        state_with_model(Arc::new(model))
    }

    fn state_with_model(model: Arc<dyn LanguageModel>) -> Arc<AppState> {
        let listing = RawListing {
            app_id: Some("42".into()),
            title: Some("Pixel Runner".into()),
            description: Some("endless runner arcade game".into()),
            ..Default::default()
        };
        let pipeline = Pipeline::new(
            Arc::new(StaticListingSource::new(listing)),
            model,
            Arc::new(LexicalEmbedder::default()),
            Arc::new(EmptyIndex),
        );
        let config = KeyplanConfig {
            port: 0,
            default_options: PipelineOptions::default(),
        };
        Arc::new(AppState::with_pipeline(config, pipeline))
    }

    async fn post_json(state: Arc<AppState>, body: serde_json::Value) -> (StatusCode, Response) {
        let request = Request::post("/api/keywords")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = build_router(state).oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_keywords_success_shape() {
        let model = FixedModel(Ok("pixel game | 0.7 | genre\nretro platformer | 0.6 | genre"));
        let (status, response) = post_json(state(model), serde_json::json!({"appId": "42"})).await;
        assert_eq!(status, StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["appId"], "42");
        assert!(json["runId"].is_string());
        assert!(json["generatedAt"].is_string());
        assert_eq!(json["stats"]["candidates"], 2);
        let first = &json["keywords"][0];
        assert_eq!(first["phrase"], "pixel game");
        assert!(first["mergedScore"].is_number());
        assert!(first["componentScores"]["llm"].is_number());
    }

    #[tokio::test]
    async fn test_inline_listing_feeds_competitors_to_prompt() {
        let model = Arc::new(RecordingModel::default());
        let body = serde_json::json!({
            "listing": {
                "app_id": "77",
                "title": "Tiny Tower",
                "description": "Build a tower floor by floor.",
                "meta_keywords": "tower builder, iphone, pixel sim",
                "competitors": [
                    {"name": "Pocket Frogs", "keywords": ["frog pond", "idle"]}
                ]
            }
        });
        let (status, response) = post_json(state_with_model(model.clone()), body).await;
        assert_eq!(status, StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["appId"], "77");
        assert_eq!(json["stats"]["candidates"], 2);

        let prompt = model.0.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("App Name: Tiny Tower"));
        assert!(prompt.contains("Existing Keywords: tower builder, pixel sim"));
        assert!(prompt.contains("- Pocket Frogs: frog pond, idle"));
    }

    #[tokio::test]
    async fn test_missing_identifier_is_422() {
        let model = FixedModel(Ok("pixel game | 0.7"));
        let (status, response) = post_json(state(model), serde_json::json!({"country": "gb"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(json["kind"], "malformed_input");
    }

    #[tokio::test]
    async fn test_bad_weights_is_400() {
        let model = FixedModel(Ok("pixel game | 0.7"));
        let body = serde_json::json!({
            "appId": "42",
            "options": {"scoreWeights": {"llm": 0.9, "similarity": 0.3, "frequency": 0.2}}
        });
        let (status, response) = post_json(state(model), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["kind"], "configuration");
    }

    #[tokio::test]
    async fn test_rate_limit_is_429_with_retry_after() {
        let (status, response) = post_json(state(FixedModel(Err(30))), serde_json::json!({"appId": "42"})).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
        assert_eq!(json_body(response).await["kind"], "rate_limited");
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let response = build_router(state(FixedModel(Ok(""))))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["pipelineReady"], true);
        assert_eq!(json["defaultOptions"]["candidateCount"], 30);
    }
}
