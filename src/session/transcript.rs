use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::channel::Speaker;

/// One line of the conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    /// Learner-language translation, if the server sent one
    pub translation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// In-memory conversation history. Lost on exit.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<ConversationMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        speaker: Speaker,
        text: impl Into<String>,
        translation: Option<String>,
    ) -> &ConversationMessage {
        self.messages.push(ConversationMessage {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            translation,
            timestamp: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Returns false when no message has that id
    pub fn update_translation(&mut self, id: Uuid, translation: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.translation = Some(translation.into());
                true
            }
            None => false,
        }
    }

    /// Id of the newest message, optionally only from `speaker`
    pub fn latest(&self, speaker: Option<Speaker>) -> Option<Uuid> {
        self.messages
            .iter()
            .rev()
            .find(|m| speaker.map_or(true, |s| m.speaker == s))
            .map(|m| m.id)
    }

    pub fn get(&self, id: Uuid) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_translate() {
        let mut log = ConversationLog::new();
        let id = log
            .add(Speaker::User, "Hello, I would like to make a reservation.", None)
            .id;
        log.add(Speaker::Ai, "Good evening! For how many people?", None);

        assert!(log.update_translation(id, "こんにちは、予約をしたいのですが。"));
        assert_eq!(
            log.messages()[0].translation.as_deref(),
            Some("こんにちは、予約をしたいのですが。")
        );
        assert_eq!(log.messages()[1].speaker, Speaker::Ai);
    }

    #[test]
    fn unknown_id_is_not_translated() {
        let mut log = ConversationLog::new();
        log.add(Speaker::User, "For two people, please.", None);
        assert!(!log.update_translation(Uuid::new_v4(), "2名でお願いします。"));
    }

    #[test]
    fn latest_by_speaker() {
        let mut log = ConversationLog::new();
        assert_eq!(log.latest(None), None);

        let user = log.add(Speaker::User, "A table for two.", None).id;
        let ai = log.add(Speaker::Ai, "Right this way.", None).id;

        assert_eq!(log.latest(None), Some(ai));
        assert_eq!(log.latest(Some(Speaker::User)), Some(user));
        assert_eq!(log.get(user).map(|m| m.text.as_str()), Some("A table for two."));
    }

    #[test]
    fn clear_empties_history() {
        let mut log = ConversationLog::new();
        log.add(Speaker::User, "Hi", None);
        log.clear();
        assert!(log.is_empty());
    }
}
