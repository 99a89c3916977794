// Copyright 2022 Zinc Labs Inc. and Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use promstore::{Aggregator, Labels, Metric, MetricKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Deserialize, Serialize)]
pub struct ObserveRequest {
    pub kind: MetricKind,
    pub name: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    pub value: f64,
    /// Upper bounds for histogram `name`, kept for later observations.
    #[serde(default)]
    pub buckets: Option<Vec<f64>>,
}

#[derive(Deserialize, Serialize)]
pub struct QueryRequest {
    pub sql: String,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<promstore::Error> for ApiError {
    fn from(err: promstore::Error) -> Self {
        Self(StatusCode::BAD_REQUEST, err.to_string())
    }
}

/// Returns every series, sorted by name and labels.
pub async fn samples(State(aggregator): State<Arc<Aggregator>>) -> Json<Vec<Metric>> {
    Json(aggregator.snapshot())
}

pub async fn observe(
    State(aggregator): State<Arc<Aggregator>>,
    Json(req): Json<ObserveRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(buckets) = req.buckets {
        aggregator.set_buckets(&req.name, buckets)?;
    }
    if let Some(help) = req.help {
        aggregator.describe(&req.name, help);
    }
    aggregator.record(req.kind, &req.name, &req.labels, req.value)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Runs a SQL query over the current snapshot.
pub async fn query(
    State(aggregator): State<Arc<Aggregator>>,
    req: Query<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let start_time = std::time::Instant::now();
    let batches = promstore::export::query(&aggregator.snapshot(), &req.sql).await?;
    let rows = crate::batches_to_json(&batches)
        .map_err(|err| ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    tracing::info!("execute time: {:?}", start_time.elapsed());
    Ok(Json(Value::Array(rows)))
}
