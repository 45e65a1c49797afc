//! Resource services for the Advertising API.
//!
//! Resource calls are table driven: [`ResourceService::invoke`] looks up an
//! [`Operation`] by name, renders its path and sends the payload in the shape
//! the operation expects.

pub mod operations;

pub use operations::{Operation, Payload, OPERATIONS};

use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::client::RetryingRequester;
use crate::codec;
use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::types::ids::normalize_id_fields;

/// Executes table-driven resource operations.
#[derive(Debug, Clone)]
pub struct ResourceService {
    requester: Arc<RetryingRequester>,
}

impl ResourceService {
    /// Creates a new resource service.
    pub fn new(requester: Arc<RetryingRequester>) -> Self {
        Self { requester }
    }

    /// Invokes an operation by name.
    ///
    /// `query` is only accepted by [`Payload::Query`] operations and `body`
    /// only by body-carrying ones; anything else is a validation error.
    #[instrument(skip(self, path_params, query, body))]
    pub async fn invoke(
        &self,
        name: &str,
        path_params: &[(&str, &str)],
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> AdvertisingResult<Value> {
        let operation = operations::find(name)
            .ok_or_else(|| AdvertisingError::validation(format!("Unknown operation {name}")))?;
        self.execute(operation, path_params, query, body).await
    }

    /// Executes a specific operation.
    pub async fn execute(
        &self,
        operation: &Operation,
        path_params: &[(&str, &str)],
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> AdvertisingResult<Value> {
        let path = operation.render_path(path_params)?;

        if query.is_some() && operation.payload != Payload::Query {
            return Err(AdvertisingError::validation(format!(
                "Operation {} does not take query parameters",
                operation.name
            )));
        }

        let query = query.map(codec::query_string).transpose()?;

        let body = match (operation.payload, body) {
            (Payload::Body, Some(body)) => Some(body.clone()),
            (Payload::BodyWithIds, Some(body)) => {
                let mut body = body.clone();
                normalize_id_fields(&mut body)?;
                Some(body)
            }
            (Payload::Body | Payload::BodyWithIds, None) => {
                return Err(AdvertisingError::validation(format!(
                    "Operation {} requires a request body",
                    operation.name
                )))
            }
            (Payload::None | Payload::Query, Some(_)) => {
                return Err(AdvertisingError::validation(format!(
                    "Operation {} does not take a request body",
                    operation.name
                )))
            }
            (Payload::None | Payload::Query, None) => None,
        };

        self.requester
            .call(operation.method, &path, query.as_deref(), body.as_ref())
            .await
    }
}
