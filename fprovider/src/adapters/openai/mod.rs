mod adapter;
pub(crate) mod serde_api;
mod tests;

pub use adapter::{BAILIAN_BASE_URL, OPENAI_BASE_URL, OpenAiCompatibleAdapter, ZAI_BASE_URL};
