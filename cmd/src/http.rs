use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use color_eyre::eyre::Result;
use promstore::Aggregator;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

use super::api;

pub fn router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/api/v1/samples", get(api::samples))
        .route("/api/v1/observe", post(api::observe))
        .route("/api/v1/query", get(api::query).post(api::query))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(aggregator)
}

pub async fn server(addr: SocketAddr, aggregator: Arc<Aggregator>) -> Result<()> {
    let app = router(aggregator);
    tracing::info!("start http server: {:?}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn observe(body: serde_json::Value) -> Request<Body> {
        Request::post("/api/v1/observe")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_observe_then_samples() {
        let agg = Arc::new(Aggregator::default());
        let app = router(agg.clone());

        let (status, _) = send(
            app.clone(),
            observe(serde_json::json!({
                "kind": "counter",
                "name": "jobs_total",
                "help": "processed jobs",
                "labels": {"queue": "b", "status": "ok"},
                "value": 2,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, json) = send(
            app,
            Request::get("/api/v1/samples").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let timestamp = json[0]["timestamp"].clone();
        assert!(timestamp.as_i64().unwrap() > 0);
        assert_eq!(
            json,
            serde_json::json!([{
                "kind": "counter",
                "name": "jobs_total",
                "help": "processed jobs",
                "value": 2.0,
                "timestamp": timestamp,
                "labels": {"queue": "b", "status": "ok"},
            }])
        );
    }

    #[tokio::test]
    async fn test_observe_summary_is_rejected() {
        let app = router(Arc::new(Aggregator::default()));
        let (status, json) = send(
            app,
            observe(serde_json::json!({"kind": "summary", "name": "s", "value": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "metric kind summary has no update semantics");
    }

    #[tokio::test]
    async fn test_observe_histogram_buckets() {
        let agg = Arc::new(Aggregator::default());
        let app = router(agg.clone());

        let (status, json) = send(
            app.clone(),
            observe(serde_json::json!({
                "kind": "histogram",
                "name": "latency",
                "value": 0.2,
                "buckets": [1, 0.5],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "invalid buckets for \"latency\": upper bounds are not strictly increasing"
        );
        assert!(agg.snapshot().is_empty());

        let (status, _) = send(
            app,
            observe(serde_json::json!({
                "kind": "histogram",
                "name": "latency",
                "value": 0.2,
                "buckets": [0.5, 1],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let buckets = agg
            .snapshot()
            .into_iter()
            .filter(|m| m.name == "latency_bucket")
            .map(|m| (m.labels["le"].to_owned(), m.value))
            .collect::<Vec<_>>();
        assert_eq!(buckets, [("0.5".to_owned(), 1.0), ("1".to_owned(), 0.0)]);
    }

    #[tokio::test]
    async fn test_observe_late_help() {
        let agg = Arc::new(Aggregator::default());
        let app = router(agg.clone());
        for help in [None, Some("processed jobs")] {
            let (status, _) = send(
                app.clone(),
                observe(serde_json::json!({
                    "kind": "counter",
                    "name": "jobs_total",
                    "help": help,
                    "value": 1,
                })),
            )
            .await;
            assert_eq!(status, StatusCode::NO_CONTENT);
        }
        let snapshot = agg.snapshot();
        assert_eq!(snapshot[0].help, "processed jobs");
        assert_eq!(snapshot[0].value, 2.0);
    }

    #[tokio::test]
    async fn test_query() {
        let agg = Arc::new(Aggregator::default());
        agg.set("temperature", &promstore::Labels::new([("room", "a")]), 21.5)
            .unwrap();
        let app = router(agg);

        let (status, json) = send(
            app.clone(),
            Request::get("/api/v1/query?sql=SELECT%20%22value%22%20FROM%20metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!([{"value": 21.5}]));

        let (status, _) = send(
            app,
            Request::get("/api/v1/query?sql=SELECT%20*%20FROM%20nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
