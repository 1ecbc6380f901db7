use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use notify_core::{HttpStatus, Relay, RelayResponse, SendPayload};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<dyn Relay>,
}

/// Axum-specific response converter
pub struct AxumResponseConverter;

impl AxumResponseConverter {
    pub fn from_relay_response(response: RelayResponse) -> Response {
        let status = StatusCode::from_u16(response.status.as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (
            status,
            [(header::CONTENT_TYPE, response.content_type)],
            response.body,
        )
            .into_response()
    }
}

/// Handler: POST /send
pub async fn send_notification(
    State(state): State<AppState>,
    payload: Result<Json<SendPayload>, JsonRejection>,
) -> Response {
    let response = match payload {
        Ok(Json(payload)) => state.relay.relay(payload).await,
        Err(rejection) => RelayResponse::error(
            HttpStatus::BadRequest,
            &format!("invalid JSON body: {}", rejection.body_text()),
        ),
    };
    AxumResponseConverter::from_relay_response(response)
}

/// Router exposing the relay endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/send", post(send_notification))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    /// Echoes the action back as the response status.
    struct EchoRelay;

    #[async_trait]
    impl Relay for EchoRelay {
        async fn relay(&self, payload: SendPayload) -> RelayResponse {
            match payload.action.as_deref() {
                Some("limited") => {
                    RelayResponse::error(HttpStatus::TooManyRequests, "rate limit exceeded")
                }
                Some(action) => RelayResponse::json(
                    HttpStatus::Ok,
                    &serde_json::json!({ "status": "success", "action": action }),
                ),
                None => RelayResponse::error(HttpStatus::BadRequest, "missing fields"),
            }
        }
    }

    fn app() -> Router {
        router(AppState {
            relay: Arc::new(EchoRelay),
        })
    }

    async fn post_json(body: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(
                Request::post("/send")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn forwards_payload_to_relay() {
        let (status, body) = post_json(r#"{"action":"sms","to":"+46701234567"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "sms");
    }

    #[tokio::test]
    async fn maps_relay_status_codes() {
        let (status, body) = post_json(r#"{"action":"limited"}"#).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "rate limit exceeded");

        let (status, _) = post_json("{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, body) = post_json("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }
}
