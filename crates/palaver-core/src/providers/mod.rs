//! Completion provider backends.

pub mod gemini;
mod shared;

use std::future::Future;

pub use shared::{
    ProviderError, ProviderErrorKind, ProviderResult, USER_AGENT, resolve_api_key,
    resolve_base_url,
};

/// A remote text-generation service.
///
/// One prompt in, one completion out; the call blocks the submission from
/// the caller's perspective. Errors carry the [`ProviderError`] taxonomy so
/// the engine can absorb them into the conversation log.
pub trait CompletionProvider {
    fn complete(&self, prompt: &str) -> impl Future<Output = ProviderResult<String>> + Send;
}
