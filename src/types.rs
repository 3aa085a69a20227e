//! Shared aliases and the handler return type.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{Json, Response};

/// Keyword arguments extracted from a request per the handler's signature.
pub type Kwargs = BTreeMap<String, Value>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler hands back to the pipeline.
///
/// `Json` payloads go through the API's configured renderer and pick up the
/// temporal response's status and headers; a `Response` bypasses conversion
/// entirely (the [`create_response`](crate::controller::ControllerBase::create_response)
/// path).
pub enum Reply {
    Json(Value),
    Response(Response),
}

impl Reply {
    /// Serialize any payload into a JSON reply.
    pub fn json<T: serde::Serialize>(payload: &T) -> Result<Reply, ApiError> {
        serde_json::to_value(payload)
            .map(Reply::Json)
            .map_err(|e| ApiError::internal(format!("response serialization failed: {e}")))
    }
}

/// Conversion of handler return values into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, ApiError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Ok(self)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Ok(Reply::Json(self))
    }
}

impl<T: serde::Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Reply::json(&self.0)
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Ok(Reply::Response(self))
    }
}
