use serde_json::json;
use tracing::*;

use crate::models::{MessageList, Run, RunStatus, Thread};
use crate::{OpenAIHandler, ProviderError};

/// Everything that can end a run cycle without an assistant answer. Each
/// variant folds into a fixed response string so the caller can always hand
/// back a well-formed `{"response": ...}` body.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("failed to start the assistant run: {0}")]
    CreateFailed(#[source] ProviderError),
    #[error("timed out waiting for the run to reach a terminal status")]
    PollTimeout,
    #[error("run ended with status failed")]
    RunFailed,
    #[error("thread contained no messages")]
    NoMessagesFound,
    #[error("no assistant message with text content in the thread")]
    NoAssistantMessage,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl RunError {
    /// The string that goes into the response envelope. These are the exact
    /// sentinels existing callers already parse.
    pub fn response_text(&self) -> String {
        match self {
            RunError::CreateFailed(_) => "Failed to initiate the processing.".to_string(),
            RunError::PollTimeout => "Timeout waiting for OpenAI to respond.".to_string(),
            RunError::RunFailed => "Failed to complete the processing.".to_string(),
            RunError::NoMessagesFound => {
                "No messages found in the response from OpenAI.".to_string()
            }
            RunError::NoAssistantMessage => {
                "No valid response received from the assistant.".to_string()
            }
            RunError::Provider(e) => format!("An error occurred: {}", e),
        }
    }
}

/// One complete cycle: create a thread and run for `prompt`, poll the run
/// until it settles, then pull the newest assistant message out of the
/// thread. Exactly one run is created per call; it is never retried.
pub async fn run_completion(handler: &OpenAIHandler, prompt: &str) -> Result<String, RunError> {
    trace!("run_completion prompt={}", prompt);

    // Step 1: a fresh thread with the prompt as its only message, then a run
    // against the pre-provisioned assistant.
    let (thread_id, run_id) = create_thread_and_run(handler, prompt)
        .await
        .map_err(RunError::CreateFailed)?;

    // Step 2: poll until the run settles or the deadline passes.
    let status = handler
        .poll
        .run(|| {
            let path = format!("/threads/{}/runs/{}", thread_id, run_id);
            async move {
                let run: Run = handler.get_json(&path).await?;
                trace!("run id={} status={:?}", run.id, run.status);
                Ok::<_, ProviderError>(run.status.is_terminal().then_some(run.status))
            }
        })
        .await?
        .ok_or(RunError::PollTimeout)?;

    if status == RunStatus::Failed {
        return Err(RunError::RunFailed);
    }

    // Step 3: newest assistant message with text content wins.
    let messages: MessageList = handler
        .get_json(&format!("/threads/{}/messages", thread_id))
        .await?;
    if messages.data.is_empty() {
        return Err(RunError::NoMessagesFound);
    }

    let mut data = messages.data;
    data.sort_by_key(|m| std::cmp::Reverse(m.created_at));
    let answer = data
        .iter()
        .filter(|m| m.role == "assistant")
        .find_map(|m| m.text())
        .ok_or(RunError::NoAssistantMessage)?;

    debug!("run_completion prompt={} result={}", prompt, answer);
    Ok(answer.to_string())
}

async fn create_thread_and_run(
    handler: &OpenAIHandler,
    prompt: &str,
) -> Result<(String, String), ProviderError> {
    let thread: Thread = handler.post_json("/threads", &json!({})).await?;
    debug!("created thread id={}", thread.id);

    let _: serde_json::Value = handler
        .post_json(
            &format!("/threads/{}/messages", thread.id),
            &json!({
                "role": "user",
                "content": prompt,
            }),
        )
        .await?;

    let run: Run = handler
        .post_json(
            &format!("/threads/{}/runs", thread.id),
            &json!({ "assistant_id": handler.assistant_id }),
        )
        .await?;
    debug!("created run id={} status={:?}", run.id, run.status);

    Ok((thread.id, run.id))
}
