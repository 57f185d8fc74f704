//! Protocol adapter contract implemented once per vendor protocol family.

use std::future::Future;
use std::pin::Pin;

use crate::{CallRequest, CheckResult, EventStream, ModelInfo, ProtocolType, ProviderConfig, ProviderError};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Translator between canonical call arguments and one vendor wire format.
///
/// `call` never fails across its boundary: transport and vendor-protocol failures surface as a
/// terminal `Error` event so downstream consumers always reach a clean finalization path.
pub trait ProtocolAdapter: Send + Sync {
    fn protocol(&self) -> ProtocolType;

    fn call<'a>(&'a self, request: CallRequest, config: ProviderConfig) -> EventStream<'a>;

    fn check<'a>(&'a self, config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult>;

    fn list_models<'a>(
        &'a self,
        config: &'a ProviderConfig,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>>;
}
