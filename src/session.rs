use chrono::NaiveDate;

use crate::flashcards::FlashcardDeck;
use crate::progress::{ProgressLog, QuizAttempt};
use crate::quiz::{QuizScore, QuizState};
use crate::tutor::Transcript;

/// Everything a logged-in chat has accumulated. Carried inside the dialogue
/// state, so each chat gets its own and nothing is shared between users.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub email: String,
    pub transcript: Transcript,
    pub quiz: Option<QuizState>,
    pub deck: Option<FlashcardDeck>,
    pub progress: ProgressLog,
}

impl Session {
    pub fn new(email: String) -> Self {
        Self {
            email,
            ..Self::default()
        }
    }

    /// Scores the active quiz, records the attempt and clears the quiz.
    /// Does nothing until every question has an answer.
    pub fn submit_quiz(&mut self, date: NaiveDate) -> Option<(QuizState, QuizScore)> {
        if !self.quiz.as_ref()?.all_answered() {
            return None;
        }
        let quiz = self.quiz.take()?;
        let score = quiz.score();
        self.progress.record(QuizAttempt {
            date,
            topic: quiz.topic,
            correct: score.correct,
            attempted: score.attempted,
        });
        Some((quiz, score))
    }
}
