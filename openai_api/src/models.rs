use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Thread {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
}

/// Status reported by the provider for a run. The provider defines more
/// values than we care about (`cancelled`, `expired`, ...); everything we do
/// not model decodes as `Other` and keeps the poll loop going until the
/// deadline.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Deserialize, Debug)]
pub struct MessageList {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,
}

#[derive(Deserialize, Debug)]
pub struct ThreadMessage {
    pub role: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Text of the first content entry, if there is one and it carries text.
    /// The content array may be empty, or an entry may be an image or other
    /// non-text part.
    pub fn text(&self) -> Option<&str> {
        self.content
            .first()?
            .text
            .as_ref()
            .map(|t| t.value.as_str())
    }
}

#[derive(Deserialize, Debug)]
pub struct MessageContent {
    #[serde(default)]
    pub text: Option<MessageText>,
}

#[derive(Deserialize, Debug)]
pub struct MessageText {
    pub value: String,
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Deserialize, Debug)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}
