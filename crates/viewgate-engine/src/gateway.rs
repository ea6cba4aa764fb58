//! Query execution gateway.
//!
//! Orchestrates one execution end to end: store lookup, parameter
//! substitution, query building, admission, circuit breaking, pooled RPC
//! call, authentication, batch streaming and JSON conversion. Resource
//! acquisition order is fixed (validate -> admit -> breaker -> pool -> auth
//! -> RPC) and release happens in reverse on every exit path: the admission
//! token and the pooled handle are guard types that release on drop, so
//! cancellation mid-stream leaks nothing.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewgate_commons::{GatewayError, QueryOptions, Result, ViewStore};
use viewgate_configs::LimitsSettings;
use viewgate_sql::{ParameterEngine, QueryBuilder, SqlValidator};

use crate::admission::AdmissionController;
use crate::auth::TokenProvider;
use crate::breaker::{BreakerRegistry, ENGINE_DEPENDENCY};
use crate::encoder::{self, JsonArrayEmitter};
use crate::pool::{EnginePool, PooledHandle};
use crate::transport::BatchStream;

/// Receives JSON fragments in streaming mode. Implemented over channel-backed
/// HTTP bodies by the routing layer and over `Vec<u8>` in tests.
#[async_trait]
pub trait JsonSink: Send {
    async fn write_fragment(&mut self, fragment: &str) -> Result<()>;
    async fn flush(&mut self) -> Result<()>;
}

#[async_trait]
impl JsonSink for Vec<u8> {
    async fn write_fragment(&mut self, fragment: &str) -> Result<()> {
        self.extend_from_slice(fragment.as_bytes());
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct QueryGateway {
    store: Arc<dyn ViewStore>,
    validator: Arc<SqlValidator>,
    builder: QueryBuilder,
    params: ParameterEngine,
    admission: Arc<AdmissionController>,
    breakers: Arc<BreakerRegistry>,
    pool: Arc<EnginePool>,
    tokens: Arc<dyn TokenProvider>,
    max_rows: u64,
    flush_rows: usize,
}

impl QueryGateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ViewStore>,
        validator: Arc<SqlValidator>,
        builder: QueryBuilder,
        params: ParameterEngine,
        admission: Arc<AdmissionController>,
        breakers: Arc<BreakerRegistry>,
        pool: Arc<EnginePool>,
        tokens: Arc<dyn TokenProvider>,
        limits: &LimitsSettings,
    ) -> Self {
        Self {
            store,
            validator,
            builder,
            params,
            admission,
            breakers,
            pool,
            tokens,
            max_rows: limits.max_rows,
            flush_rows: limits.flush_rows.max(1),
        }
    }

    /// Execute a stored view and return the whole result as one JSON array.
    pub async fn execute_buffered(
        &self,
        query_id: &str,
        options: &QueryOptions,
        deadline: Instant,
    ) -> Result<String> {
        let sql = self.prepare_sql(query_id, options).await?;

        let slot = self.admission.acquire_slot(query_id, deadline).await?;
        let breaker = self.breakers.breaker(ENGINE_DEPENDENCY)?;
        let result = breaker
            .execute(|| self.collect_buffered(&sql, deadline))
            .await;
        slot.release();
        result
    }

    /// Execute a stored view and write the result incrementally into `sink`.
    /// The emitted JSON array is always closed, even when the row cap
    /// terminates the stream early or the upstream fails mid-flight.
    pub async fn execute_streamed(
        &self,
        query_id: &str,
        options: &QueryOptions,
        deadline: Instant,
        sink: &mut dyn JsonSink,
    ) -> Result<()> {
        let sql = self.prepare_sql(query_id, options).await?;

        let slot = self.admission.acquire_slot(query_id, deadline).await?;
        let breaker = self.breakers.breaker(ENGINE_DEPENDENCY)?;
        let result = breaker
            .execute(|| self.stream_rows(&sql, deadline, sink))
            .await;
        slot.release();
        result
    }

    /// Steps 1-2: resolve the stored query and produce the final SQL text.
    /// Runs before any network resource is acquired, so validation and
    /// parameter failures need no cleanup.
    async fn prepare_sql(&self, query_id: &str, options: &QueryOptions) -> Result<String> {
        let stored = self
            .store
            .get_stored_query(query_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("stored query '{}'", query_id)))?;
        if !stored.active {
            return Err(GatewayError::not_found(format!(
                "stored query '{}' is inactive",
                query_id
            )));
        }

        let base = stored.sql;
        let prepared: Result<String> = (|| {
            let mut sql = base.clone();
            if !stored.parameters.is_empty() {
                sql = self
                    .params
                    .substitute(&sql, &stored.parameters, &options.parameters)?;
            }

            if options.requests_rewrite() {
                sql = self
                    .builder
                    .build(&sql, &options.fields, options.limit, &options.filters)?;
            } else if stored.parameters.is_empty() {
                // neither substitution nor the builder ran, so nothing has
                // validated the stored text yet
                self.validator.validate_rewrite(&sql)?;
            }
            Ok(sql)
        })();

        match prepared {
            Ok(sql) => {
                log::debug!("prepared query for view '{}' ({} chars)", query_id, sql.len());
                Ok(sql)
            }
            Err(err) => {
                // the rejected text is logged here and never echoed to callers
                if matches!(err, GatewayError::SqlRejected(_)) {
                    log::warn!("rejected SQL for view '{}': {}", query_id, base);
                }
                Err(err)
            }
        }
    }

    async fn collect_buffered(&self, sql: &str, deadline: Instant) -> Result<String> {
        let mut handle = self.pool.acquire().await?;
        let outcome = self.read_buffered(&mut handle, sql, deadline).await;
        handle.connection().stop_query().await;
        outcome
        // handle drops here and returns to the pool on every path
    }

    async fn read_buffered(
        &self,
        handle: &mut PooledHandle,
        sql: &str,
        deadline: Instant,
    ) -> Result<String> {
        let token = self.fetch_token(deadline).await?;
        let mut stream = handle
            .connection()
            .run_query(sql, &token, remaining(deadline)?)
            .await?;

        let mut rows: Vec<JsonValue> = Vec::new();
        'batches: while let Some(batch) = next_batch(&mut stream, deadline).await? {
            for row in encoder::batch_to_rows(&batch) {
                rows.push(row);
                if rows.len() as u64 >= self.max_rows {
                    log::warn!("row cap {} reached, truncating result", self.max_rows);
                    break 'batches;
                }
            }
        }

        serde_json::to_string(&rows)
            .map_err(|e| GatewayError::internal(format!("result serialization failed: {}", e)))
    }

    async fn stream_rows(
        &self,
        sql: &str,
        deadline: Instant,
        sink: &mut dyn JsonSink,
    ) -> Result<()> {
        let mut handle = self.pool.acquire().await?;
        let outcome = self.write_streamed(&mut handle, sql, deadline, sink).await;
        handle.connection().stop_query().await;
        outcome
    }

    async fn write_streamed(
        &self,
        handle: &mut PooledHandle,
        sql: &str,
        deadline: Instant,
        sink: &mut dyn JsonSink,
    ) -> Result<()> {
        let token = self.fetch_token(deadline).await?;
        let mut stream = handle
            .connection()
            .run_query(sql, &token, remaining(deadline)?)
            .await?;

        let mut emitter = JsonArrayEmitter::new();
        sink.write_fragment(emitter.open()).await?;

        let mut since_flush = 0usize;
        let mut failure: Option<GatewayError> = None;
        'batches: loop {
            let batch = match next_batch(&mut stream, deadline).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(err) => {
                    // close the array before surfacing the failure so the
                    // body written so far stays parseable
                    failure = Some(err);
                    break;
                }
            };
            for row in encoder::batch_to_rows(&batch) {
                sink.write_fragment(&emitter.row(&row)).await?;
                since_flush += 1;
                if since_flush >= self.flush_rows {
                    sink.flush().await?;
                    since_flush = 0;
                }
                if emitter.emitted() >= self.max_rows {
                    log::warn!("row cap {} reached, terminating stream early", self.max_rows);
                    break 'batches;
                }
            }
        }

        sink.write_fragment(emitter.close()).await?;
        sink.flush().await?;

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_token(&self, deadline: Instant) -> Result<String> {
        let wait = remaining(deadline)?;
        tokio::time::timeout(wait, self.tokens.bearer_token())
            .await
            .map_err(|_| GatewayError::cancelled("deadline exceeded during engine authentication"))?
    }
}

async fn next_batch(
    stream: &mut BatchStream,
    deadline: Instant,
) -> Result<Option<arrow::record_batch::RecordBatch>> {
    let wait = remaining(deadline)?;
    match tokio::time::timeout(wait, stream.next()).await {
        Err(_) => Err(GatewayError::cancelled(
            "deadline exceeded while reading the engine stream",
        )),
        Ok(None) => Ok(None),
        Ok(Some(Ok(batch))) => Ok(Some(batch)),
        Ok(Some(Err(err))) => Err(err),
    }
}

fn remaining(deadline: Instant) -> Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(GatewayError::cancelled("deadline exceeded"))
    } else {
        Ok(left)
    }
}
