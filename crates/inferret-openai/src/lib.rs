//! OpenAI-compatible chat-completions oracle for Inferret.
//!
//! [`OpenAiOracle`] implements [`inferret_core::Oracle`] by POSTing the
//! standard three-message prompt to `{base_url}/chat/completions` with JSON
//! response mode enabled, then decoding the `{"assertion": <bool>}` envelope
//! from the first choice.
//!
//! Any server speaking the same protocol (Azure OpenAI, vLLM, Ollama's
//! OpenAI endpoint, ...) can be targeted through [`OpenAiConfig::base_url`].

mod client;
mod config;
mod wire;

pub use client::OpenAiOracle;
pub use config::{OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
