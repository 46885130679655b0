use serde_json::json;
use tracing::*;

use crate::models::ChatCompletion;
use crate::{OpenAIHandler, ProviderError};

/// Single-turn completion with no thread context: one user message in, the
/// first choice's content out.
pub async fn chat_completion(
    handler: &OpenAIHandler,
    message: &str,
) -> Result<String, ProviderError> {
    trace!("chat_completion message={}", message);

    let completion: ChatCompletion = handler
        .post_json(
            "/chat/completions",
            &json!({
                "model": handler.model,
                "messages": [
                    { "role": "user", "content": message }
                ],
            }),
        )
        .await?;

    let text = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(ProviderError::Malformed("completion had no choices"))?;

    debug!("chat_completion message={} result={}", message, text);
    Ok(text)
}
