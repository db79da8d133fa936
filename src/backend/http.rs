//! JSON-over-HTTP backend client

use super::{Backend, ConversionRequest, TransitionRequest};
use crate::config::BackendConfig;
use crate::domain::{ConversionReceipt, Holder, Order, OrderFilter, OrderStatus};
use crate::error::{CoreError, CoreResult};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error body returned by the backend on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TransitionResponse {
    status: OrderStatus,
}

/// Backend reached over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> CoreResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CoreError::Config(format!("Invalid backend URL {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CoreError::Config(format!(
                "Backend URL {} cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CoreError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let auth_token = match &config.auth_token_env {
            Some(var) => match std::env::var(var) {
                Ok(token) if !token.is_empty() => Some(token),
                _ => {
                    warn!("Auth token variable {} is not set - sending unauthenticated requests", var);
                    None
                }
            },
            None => None,
        };

        info!("HTTP backend configured for {}", config.base_url);

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    /// Append path segments to the base URL. Each segment is percent-encoded,
    /// so ids holding `/`, `#` or `?` stay inside their own segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, operation: &str, builder: RequestBuilder) -> CoreResult<Response> {
        self.authorize(builder)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::Timeout {
            operation: operation.to_string(),
        }
    } else {
        CoreError::BackendUnavailable(format!("{}: {}", operation, err))
    }
}

/// Decode a success body, or surface the backend's rejection verbatim
async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> CoreResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status.as_u16(), body));
        debug!("Backend rejected {}: {}", operation, message);
        return Err(if status.is_server_error() {
            CoreError::BackendUnavailable(message)
        } else {
            CoreError::BackendRejected(message)
        });
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            transport_error(operation, e)
        } else {
            CoreError::BackendRejected(format!("Malformed {} response: {}", operation, e))
        }
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_holders(&self) -> CoreResult<Vec<Holder>> {
        let response = self
            .send("fetch_holders", self.client.get(self.url(&["holders"])))
            .await?;
        decode("fetch_holders", response).await
    }

    async fn fetch_order(&self, id: &str) -> CoreResult<Order> {
        let response = self
            .send("fetch_order", self.client.get(self.url(&["orders", id])))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CoreError::OrderNotFound {
                order_id: id.to_string(),
            });
        }
        decode("fetch_order", response).await
    }

    async fn fetch_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(customer) = &filter.customer_reference {
            query.push(("customer", customer.clone()));
        }

        let response = self
            .send(
                "fetch_orders",
                self.client.get(self.url(&["orders"])).query(&query),
            )
            .await?;
        decode("fetch_orders", response).await
    }

    async fn execute_conversion(
        &self,
        request: ConversionRequest,
    ) -> CoreResult<ConversionReceipt> {
        let response = self
            .send(
                "execute_conversion",
                self.client.post(self.url(&["conversions"])).json(&request),
            )
            .await?;
        decode("execute_conversion", response).await
    }

    async fn transition_order(&self, request: TransitionRequest) -> CoreResult<OrderStatus> {
        let url = self.url(&["orders", request.order_id.as_str(), "transitions"]);
        let response = self
            .send(
                "transition_order",
                self.client.post(url).json(&request),
            )
            .await?;
        let body: TransitionResponse = decode("transition_order", response).await?;
        Ok(body.status)
    }
}
