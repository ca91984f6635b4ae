//! Cookie Dispenser SDK
//!
//! This crate provides everything needed to consume the cookie-dispenser service:
//! - API trait (`CookieDispenserClientV1`)
//! - Error type (`CookieDispenserError`)
//! - gRPC client (`CookieDispenserGrpcClient`)
//! - Proto stubs for the server implementation
//!
//! ## Usage
//!
//! ```ignore
//! use cookie_dispenser_sdk::{CookieDispenserClientV1, CookieDispenserGrpcClient};
//!
//! let client = CookieDispenserGrpcClient::connect("http://127.0.0.1:50051").await?;
//! let msg = client.get_cookie("Bob").await?;
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

// === API TRAIT AND TYPES ===
mod api;
pub use api::{CookieDispenserClientV1, CookieDispenserError, ResetSummary};

// === CLIENT ===
mod client;
pub use client::CookieDispenserGrpcClient;

// === GRPC PROTO STUBS ===
/// Generated protobuf types for `CookieService`
#[allow(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::restriction,
    missing_docs
)]
pub mod proto {
    tonic::include_proto!("cookies.v1");
}

pub use proto::cookie_service_server::{CookieService, CookieServiceServer};
pub use proto::{
    GetCookieRequest, GetCookieResponse, ResetCookiesRequest, ResetCookiesResponse,
    SetConfigRequest, SetConfigResponse,
};

/// Service name constant for `CookieService` (used for service discovery)
pub const SERVICE_NAME: &str = "cookies.v1.CookieService";
