//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{ErrorResponse, StateResponse, StatusRecord};

/// Returns plant parameters, dispatch policy, and the latest tick.
///
/// `GET /state` → 200 + `StateResponse` JSON
/// `GET /state` before the first tick → 503 + `ErrorResponse`
pub async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let latest = *state.status.read();
    match latest {
        Some(report) => Ok(Json(StateResponse {
            plant: state.plant.clone(),
            policy: state.policy,
            latest: StatusRecord::from(&report),
        })),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "no tick completed yet".to_string(),
            }),
        )),
    }
}

/// `GET /health` → 200 `ok`
pub async fn get_health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::runner::SharedStatus;
    use crate::sim::types::{Measurements, PlantConfig};
    use crate::sim::{DispatchPolicy, Simulation};

    fn make_test_state(ticked: bool) -> Arc<AppState> {
        let status: SharedStatus = Arc::default();
        if ticked {
            let mut sim = Simulation::new(
                PlantConfig::default(),
                DispatchPolicy::InverterCeiling,
                8300.0,
            );
            sim.step(Measurements::new(2000.0, 0.0), 1.0);
            let report = sim.step(Measurements::new(2000.0, 0.0), 1.0);
            *status.write() = Some(report);
        }
        Arc::new(AppState {
            plant: PlantConfig::default(),
            policy: DispatchPolicy::InverterCeiling,
            status,
        })
    }

    #[tokio::test]
    async fn state_returns_200() {
        let app = router(make_test_state(true));

        let req = Request::builder()
            .uri("/state")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("plant").is_some());
        assert_eq!(json["policy"], "inverter_ceiling");
        assert_eq!(json["latest"]["tick"], 1);
        assert_eq!(json["latest"]["battery_state"], "DISCHARGING");
    }

    #[tokio::test]
    async fn state_before_first_tick_returns_503() {
        let app = router(make_test_state(false));

        let req = Request::builder()
            .uri("/state")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(make_test_state(false));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
