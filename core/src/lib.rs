//! Client core for the unified API snippets.
//!
//! # Overview
//! A catalog of sample calls (`Operation`) and a gateway that runs them
//! (`HttpGateway`). The gateway reports every call through a success/failure
//! callback pair, exactly one of which fires.
//!
//! # Design
//! - `ApiClient` is stateless: it builds `HttpRequest` values and classifies
//!   `HttpResponse` values without touching the network.
//! - `Transport` is the only I/O seam; `UreqTransport` is the default.
//! - `HttpGateway` runs build, execute and classify on a worker thread and
//!   delivers the outcome through the callbacks.
//! - Types use owned `String` / `Vec` fields so the FFI crate can map them
//!   without lifetime concerns.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod multipart;
pub mod operation;
pub mod transport;

pub use catalog::{Catalog, CatalogSection};
pub use client::{ApiClient, ApiResponse};
pub use config::GatewayConfig;
pub use error::{ApiError, ConfigError, OperationError, TransportError};
pub use gateway::{Dispatch, HttpGateway};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseHeaders};
pub use multipart::MultipartPart;
pub use operation::{
    Headers, Operation, OperationKind, ParamValues, Params, ParamsSource, ParamsSources,
    PayloadShape, PARAMS_EVENT_ID_KEY, PARAMS_GROUP_ID_KEY, PARAMS_POST_DATA_KEY,
};
pub use transport::{Transport, UreqTransport};
