//! Engine transport seam.
//!
//! The analytical engine speaks Arrow Flight; this module wraps the existing
//! client library behind two narrow traits so the pool and the gateway never
//! depend on the wire protocol directly and tests can substitute an
//! in-process engine.

use arrow::record_batch::RecordBatch;
use arrow_flight::decode::FlightRecordBatchStream;
use arrow_flight::error::FlightError;
use arrow_flight::flight_service_client::FlightServiceClient;
use arrow_flight::{Action, Ticket};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use futures::TryStreamExt;
use std::pin::Pin;
use std::time::Duration;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use viewgate_commons::{GatewayError, Result};
use viewgate_configs::EngineSettings;

/// A stream of decoded columnar batches from one query execution.
pub type BatchStream = Pin<Box<dyn Stream<Item = Result<RecordBatch>> + Send>>;

/// One live RPC handle to the analytical engine.
#[async_trait]
pub trait EngineConnection: Send {
    /// Issue the query and return the batch stream. The bearer token is
    /// attached to the call; `timeout` bounds the whole RPC.
    async fn run_query(&mut self, sql: &str, bearer: &str, timeout: Duration)
        -> Result<BatchStream>;

    /// Best-effort stop side-channel after stream consumption, releasing
    /// server-side resources. Failures are logged, never propagated.
    async fn stop_query(&mut self);
}

/// Creates engine connections. Creation is synchronous (the underlying
/// channel connects lazily) so the pool can create handles under its narrow
/// lock without suspending.
pub trait EngineConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn EngineConnection>>;
}

/// Arrow Flight connector against a configured engine endpoint.
pub struct FlightConnector {
    endpoint: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl FlightConnector {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_seconds),
            request_timeout: Duration::from_secs(settings.request_timeout_seconds),
        }
    }
}

impl EngineConnector for FlightConnector {
    fn connect(&self) -> Result<Box<dyn EngineConnection>> {
        let endpoint = Channel::from_shared(self.endpoint.clone())
            .map_err(|e| GatewayError::config(format!("invalid engine endpoint: {}", e)))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);
        let channel = endpoint.connect_lazy();
        Ok(Box::new(FlightConnection {
            client: FlightServiceClient::new(channel),
        }))
    }
}

struct FlightConnection {
    client: FlightServiceClient<Channel>,
}

#[async_trait]
impl EngineConnection for FlightConnection {
    async fn run_query(
        &mut self,
        sql: &str,
        bearer: &str,
        timeout: Duration,
    ) -> Result<BatchStream> {
        let mut request = tonic::Request::new(Ticket {
            ticket: Bytes::from(sql.to_owned()),
        });
        let header = MetadataValue::try_from(format!("Bearer {}", bearer)).map_err(|e| {
            GatewayError::internal(format!("bearer token is not valid header metadata: {}", e))
        })?;
        request.metadata_mut().insert("authorization", header);
        request.set_timeout(timeout);

        let response = self.client.do_get(request).await.map_err(|status| {
            GatewayError::upstream(format!("engine query call failed: {}", status.message()))
        })?;

        let flight_data = response.into_inner().map_err(FlightError::from);
        let batches = FlightRecordBatchStream::new_from_flight_data(flight_data)
            .map_err(|e| GatewayError::upstream(format!("engine stream error: {}", e)));

        Ok(Box::pin(batches))
    }

    async fn stop_query(&mut self) {
        let action = Action {
            r#type: "stop-query".to_string(),
            body: Bytes::new(),
        };
        if let Err(status) = self.client.do_action(tonic::Request::new(action)).await {
            log::debug!("engine stop action failed (ignored): {}", status.message());
        }
    }
}
