use crate::quiz::Topic;

pub const DECK_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    pub fn new(question: String, answer: String) -> Self {
        Self { question, answer }
    }
}

/// A generated deck being reviewed one card at a time.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FlashcardDeck {
    pub topic: Topic,
    pub cards: Vec<Flashcard>,
    revealed: Vec<bool>,
    position: usize,
}

impl FlashcardDeck {
    pub fn new(topic: Topic, cards: Vec<Flashcard>) -> Self {
        let revealed = vec![false; cards.len()];
        Self {
            topic,
            cards,
            revealed,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.position)
    }

    /// Marks the current card as revealed and returns it.
    pub fn reveal(&mut self) -> Option<&Flashcard> {
        let flag = self.revealed.get_mut(self.position)?;
        *flag = true;
        self.cards.get(self.position)
    }

    pub fn is_revealed(&self, idx: usize) -> bool {
        self.revealed.get(idx).copied().unwrap_or(false)
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|r| **r).count()
    }

    /// Moves to the next card. Returns `None` once the deck is finished.
    pub fn advance(&mut self) -> Option<&Flashcard> {
        if self.position < self.cards.len() {
            self.position += 1;
        }
        self.current()
    }
}
