//! Append-only conversation for one loop

use crate::llm::LlmMessage;

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub id: String,
    pub message: LlmMessage,
}

/// Messages in conversation order, each with an opaque id
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(history: Vec<(Option<String>, LlmMessage)>) -> Self {
        let mut transcript = Self::default();
        for (id, message) in history {
            transcript.push_with_id(id.unwrap_or_else(new_id), message);
        }
        transcript
    }

    /// Append a message under a fresh id
    pub fn push(&mut self, message: LlmMessage) -> &str {
        self.push_with_id(new_id(), message)
    }

    fn push_with_id(&mut self, id: String, message: LlmMessage) -> &str {
        self.entries.push(TranscriptEntry { id, message });
        &self.entries[self.entries.len() - 1].id
    }

    pub fn messages(&self) -> Vec<LlmMessage> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn message_count(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
