//! HTTP facade — the single owner of the axum/http names used by this crate.
//!
//! Downstream code imports HTTP types from here rather than depending on
//! axum directly, so the underlying framework version can move in one place.

pub use axum::body::{to_bytes, Body};
pub use axum::extract::{RawPathParams, Request};
pub use axum::response::{IntoResponse, Response};
pub use axum::routing;
pub use axum::{serve, Json, Router};

pub use bytes::Bytes;

pub use http::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION,
};
pub use http::{Method, StatusCode, Uri};
