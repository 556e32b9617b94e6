use log::{debug, warn};

use crate::error::Result;
use crate::quiz::ai_helper::CompletionService;

pub const SYSTEM_PROMPT: &str = "You are a certified South Carolina DMV permit test tutor who helps teenagers prepare for the written learner's permit exam.

Explain driving laws, road signs, traffic rules and safety principles using only what is found in:
- The South Carolina Driver's Manual (2024 edition), and
- The official SC DMV practice tests.

Rules:
- Only use facts from the manual or the practice tests. Never invent laws, facts or explanations.
- Use language suited to 15 to 17 year olds.
- When asked for a quiz, follow this format exactly, numbering every question:
Question 1: [question text]
A. [option A]
B. [option B]
C. [option C]
D. [option D]
Answer: [A/B/C/D]
- Return exactly the number of questions requested, all unique, with no explanations, hints or extra text.
- When asked for flashcards, follow this format exactly and return nothing else (no numbering, no multiple choice, no commentary):
Q: [question]
A: [answer]

Output that breaks these formats cannot be used.

After answering a learner's question in chat, suggest ONE study strategy (for example spaced repetition or timed practice), then recommend one feature of this bot (Practice Quiz, Flashcards, Study Plan or Progress Tracker) and say in one sentence how it helps. Keep the tip and the recommendation to two sentences in total.";

/// Telegram rejects text messages longer than this many UTF-16 code units.
pub const MAX_MESSAGE_UNITS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Linear conversation with the tutor. The first turn is always the system prompt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self {
            turns: vec![ChatTurn::new(Role::System, SYSTEM_PROMPT)],
        }
    }
}

impl Transcript {
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Turns shown to the learner (everything after the system prompt).
    pub fn visible(&self) -> &[ChatTurn] {
        self.turns.get(1..).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Sends `text` as the next user turn and appends the reply.
    ///
    /// If the completion call fails the user turn is taken back out, so
    /// retrying the same message does not leave a duplicate behind.
    pub async fn send<C>(&mut self, service: &C, text: &str) -> Result<String>
    where
        C: CompletionService,
    {
        self.turns.push(ChatTurn::new(Role::User, text));
        debug!("Sending transcript with {} turns", self.turns.len());

        match service.complete(&self.turns).await {
            Ok(reply) => {
                self.turns.push(ChatTurn::new(Role::Assistant, reply.clone()));
                Ok(reply)
            }
            Err(err) => {
                warn!("Tutor reply failed: {}", err);
                self.turns.pop();
                Err(err)
            }
        }
    }
}

/// Byte offset of the first char that would take `text` past `max_units`
/// UTF-16 code units, which is how Telegram measures message length.
fn overflow_at(text: &str, max_units: usize) -> Option<usize> {
    let mut units = 0;
    text.char_indices().find_map(|(i, c)| {
        units += c.len_utf16();
        (units > max_units).then_some(i)
    })
}

/// Splits a reply into pieces Telegram will accept, breaking after the last
/// newline that fits when there is one. Blank pieces are skipped since they
/// cannot be sent.
pub fn split_reply(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(2);
    let mut pieces = Vec::new();
    let mut rest = text;

    while let Some(limit) = overflow_at(rest, max_units) {
        let cut = rest[..limit].rfind('\n').map_or(limit, |i| i + 1);
        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        rest = &rest[cut..];
    }

    let rest = rest.trim_end();
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}
