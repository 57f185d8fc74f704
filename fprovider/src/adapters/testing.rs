//! In-crate fake transport for adapter unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures_util::stream;
use serde_json::Value;

use crate::transport::{ByteStream, HttpRequest, HttpTransport};
use crate::{ProviderError, ProviderFuture};

/// Replays canned bodies and records every request it receives.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    pub requests: Mutex<Vec<HttpRequest>>,
    stream_bodies: Mutex<VecDeque<Result<Vec<Vec<u8>>, ProviderError>>>,
    json_bodies: Mutex<VecDeque<Result<Value, ProviderError>>>,
}

impl FakeTransport {
    pub(crate) fn with_stream(self, chunks: &[&str]) -> Self {
        self.stream_bodies
            .lock()
            .expect("stream bodies lock")
            .push_back(Ok(chunks.iter().map(|chunk| chunk.as_bytes().to_vec()).collect()));
        self
    }

    pub(crate) fn with_stream_error(self, error: ProviderError) -> Self {
        self.stream_bodies
            .lock()
            .expect("stream bodies lock")
            .push_back(Err(error));
        self
    }

    pub(crate) fn with_json(self, body: Result<Value, ProviderError>) -> Self {
        self.json_bodies
            .lock()
            .expect("json bodies lock")
            .push_back(body);
        self
    }

    pub(crate) fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .expect("requests lock")
            .last()
            .cloned()
            .expect("a request was sent")
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub(crate) fn last_body(&self) -> Value {
        self.last_request().body.expect("request body")
    }
}

impl HttpTransport for FakeTransport {
    fn send_stream<'a>(
        &'a self,
        request: HttpRequest,
    ) -> ProviderFuture<'a, Result<ByteStream<'a>, ProviderError>> {
        self.requests.lock().expect("requests lock").push(request);
        let next = self
            .stream_bodies
            .lock()
            .expect("stream bodies lock")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::other("no canned stream")));

        Box::pin(async move {
            let chunks = next?;
            Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))) as ByteStream<'a>)
        })
    }

    fn send_json<'a>(&'a self, request: HttpRequest) -> ProviderFuture<'a, Result<Value, ProviderError>> {
        self.requests.lock().expect("requests lock").push(request);
        let next = self
            .json_bodies
            .lock()
            .expect("json bodies lock")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::other("no canned json")));

        Box::pin(async move { next })
    }
}
