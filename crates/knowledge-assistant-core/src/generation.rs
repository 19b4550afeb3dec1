//! Generation gateway trait.

use async_trait::async_trait;

use crate::error::Result;

/// Produces a completion from a system prompt and a user prompt.
///
/// Implemented by the hosted-model clients in the app crate and by test
/// doubles.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-5"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}
