//! viewgate-engine
//!
//! The query-execution core of the viewgate gateway: pooling of Flight RPC
//! handles to the analytical engine, admission control over concurrent
//! executions, per-dependency circuit breaking, engine authentication,
//! incremental conversion of columnar batches into JSON, and the gateway
//! orchestrating all of it.

pub mod admission;
pub mod auth;
pub mod breaker;
pub mod encoder;
pub mod gateway;
pub mod pool;
pub mod transport;

pub use admission::{AdmissionController, AdmissionSlot, AdmissionStats};
pub use auth::{EngineAuthenticator, TokenProvider};
pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitState, ENGINE_DEPENDENCY};
pub use gateway::{JsonSink, QueryGateway};
pub use pool::{EnginePool, PoolStats, PooledHandle};
pub use transport::{BatchStream, EngineConnection, EngineConnector, FlightConnector};
