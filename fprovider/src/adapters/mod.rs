#[cfg(feature = "provider-openai")]
pub mod openai;

#[cfg(feature = "provider-anthropic")]
pub mod anthropic;

#[cfg(feature = "provider-gemini")]
pub mod gemini;

#[cfg(feature = "provider-perplexity")]
pub mod perplexity;

#[cfg(feature = "provider-ollama")]
pub mod ollama;

#[cfg(test)]
pub(crate) mod testing;
