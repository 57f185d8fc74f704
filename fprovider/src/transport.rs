//! HTTP transport trait and reqwest-based implementation shared by all adapters.

use std::pin::Pin;

use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::{ProviderError, ProviderFuture};

pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ProviderError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Wire seam between adapters and the network. Non-success statuses are returned as errors.
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    fn send_stream<'a>(
        &'a self,
        request: HttpRequest,
    ) -> ProviderFuture<'a, Result<ByteStream<'a>, ProviderError>>;

    fn send_json<'a>(&'a self, request: HttpRequest) -> ProviderFuture<'a, Result<Value, ProviderError>>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn build(&self, request: HttpRequest) -> RequestBuilder {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
    }

    async fn send(&self, request: HttpRequest) -> Result<Response, ProviderError> {
        let response = self.build(request).send().await?;

        if !response.status().is_success() {
            return Err(parse_error(response).await);
        }

        Ok(response)
    }
}

impl HttpTransport for ReqwestTransport {
    fn send_stream<'a>(
        &'a self,
        request: HttpRequest,
    ) -> ProviderFuture<'a, Result<ByteStream<'a>, ProviderError>> {
        Box::pin(async move {
            let response = self.send(request).await?;
            let chunks = response
                .bytes_stream()
                .map(|item| item.map(|bytes| bytes.to_vec()).map_err(ProviderError::from));

            Ok(Box::pin(chunks) as ByteStream<'a>)
        })
    }

    fn send_json<'a>(&'a self, request: HttpRequest) -> ProviderFuture<'a, Result<Value, ProviderError>> {
        Box::pin(async move {
            let response = self.send(request).await?;
            response.json::<Value>().await.map_err(ProviderError::from)
        })
    }
}

async fn parse_error(response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_for_status(status, &body)
}

pub(crate) fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
    let message = extract_error_message(body).unwrap_or_else(|| {
        let snippet = fcommon::truncate_chars(body.trim(), 512);
        if snippet.is_empty() {
            format!("request failed with status {status}")
        } else {
            format!("request failed with status {status}: {snippet}")
        }
    });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::timeout(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::invalid_request(message)
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            ProviderError::unavailable(message)
        }
        _ => ProviderError::transport(message),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorEnvelope {
    Nested { error: NestedError },
    Flat { error: String },
    Message { message: String },
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: String,
}

/// Vendor error message from `{error:{message}}`, `{error:"..."}`, or `{message}` bodies.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let message = match serde_json::from_str::<ErrorEnvelope>(body).ok()? {
        ErrorEnvelope::Nested { error } => error.message,
        ErrorEnvelope::Flat { error } => error,
        ErrorEnvelope::Message { message } => message,
    };

    (!message.trim().is_empty()).then_some(message)
}
