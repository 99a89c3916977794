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

//! Columnar view of a snapshot, queryable with SQL.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use datafusion::{datasource::MemTable, prelude::SessionContext};
use rustc_hash::FxHashSet;

use crate::{error::Result, value::*};

/// Name of the table registered by [`create_context`].
pub const TABLE_NAME: &str = "metrics";

const RESERVED_FIELDS: [&str; 5] = [FIELD_NAME, FIELD_HASH, FIELD_TYPE, FIELD_TIME, FIELD_VALUE];

/// Builds one row per sample.
///
/// Every label name seen in `metrics` becomes a nullable string column, in
/// first-seen order, followed by the name, label signature, kind, timestamp
/// and value columns. Labels clashing with those last columns are dropped.
pub fn create_record_batch(metrics: &[Metric]) -> Result<RecordBatch, ArrowError> {
    let mut seen = FxHashSet::default();
    let label_names = metrics
        .iter()
        .flat_map(|m| m.labels.iter())
        .map(|label| label.name.as_str())
        .filter(|name| !RESERVED_FIELDS.contains(name) && seen.insert(*name))
        .collect::<Vec<_>>();

    let mut fields = label_names
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, true))
        .collect::<Vec<_>>();
    fields.push(Field::new(FIELD_NAME, DataType::Utf8, false));
    fields.push(Field::new(FIELD_HASH, DataType::Utf8, false));
    fields.push(Field::new(FIELD_TYPE, DataType::Utf8, false));
    fields.push(Field::new(FIELD_TIME, DataType::Int64, false));
    fields.push(Field::new(FIELD_VALUE, DataType::Float64, false));
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for name in &label_names {
        let values = metrics
            .iter()
            .map(|m| m.labels.get(name))
            .collect::<Vec<_>>();
        columns.push(Arc::new(StringArray::from(values)));
    }
    let names = metrics.iter().map(|m| m.name.as_str()).collect::<Vec<_>>();
    let hashes = metrics
        .iter()
        .map(|m| String::from(m.labels.signature()))
        .collect::<Vec<_>>();
    let kinds = metrics.iter().map(|m| m.kind.as_ref()).collect::<Vec<_>>();
    let times = metrics.iter().map(|m| m.timestamp).collect::<Vec<_>>();
    let values = metrics.iter().map(|m| m.value).collect::<Vec<_>>();
    columns.push(Arc::new(StringArray::from(names)));
    columns.push(Arc::new(StringArray::from(hashes)));
    columns.push(Arc::new(StringArray::from(kinds)));
    columns.push(Arc::new(Int64Array::from(times)));
    columns.push(Arc::new(Float64Array::from(values)));

    RecordBatch::try_new(schema, columns)
}

/// Creates a session context with `metrics` registered as [`TABLE_NAME`].
pub fn create_context(metrics: &[Metric]) -> datafusion::error::Result<SessionContext> {
    let batch = create_record_batch(metrics)?;
    let ctx = SessionContext::new();
    let provider = MemTable::try_new(batch.schema(), vec![vec![batch]])?;
    ctx.register_table(TABLE_NAME, Arc::new(provider))?;
    Ok(ctx)
}

/// Runs `sql` against a snapshot.
pub async fn query(metrics: &[Metric], sql: &str) -> Result<Vec<RecordBatch>> {
    let ctx = create_context(metrics)?;
    let start_time = std::time::Instant::now();
    let batches = ctx.sql(sql).await?.collect().await?;
    tracing::debug!(rows = metrics.len(), "query time: {:?}", start_time.elapsed());
    Ok(batches)
}
