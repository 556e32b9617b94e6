pub mod ai_helper;
pub mod extract;

use std::collections::BTreeMap;
use std::fmt;

pub const MIN_QUESTIONS: usize = 5;
pub const MAX_QUESTIONS: usize = 10;
pub const DEFAULT_QUESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [Self::A, Self::B, Self::C, Self::D];

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    /// Reads a keyboard selection such as `"B"` or `"B. Yield"`.
    pub fn from_selection(text: &str) -> Option<Self> {
        let mut chars = text.trim().chars();
        let letter = match chars.next()?.to_ascii_uppercase() {
            'A' => Self::A,
            'B' => Self::B,
            'C' => Self::C,
            'D' => Self::D,
            _ => return None,
        };
        // "Brake" must not be read as option B
        match chars.next() {
            None | Some('.') | Some(')') => Some(letter),
            Some(c) if c.is_whitespace() => Some(letter),
            _ => None,
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Topic {
    #[default]
    General,
    RoadSigns,
    RightOfWay,
    AlcoholLaws,
    SpeedLimits,
    TrafficSignals,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Self::General,
        Self::RoadSigns,
        Self::RightOfWay,
        Self::AlcoholLaws,
        Self::SpeedLimits,
        Self::TrafficSignals,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::RoadSigns => "Road Signs",
            Self::RightOfWay => "Right of Way",
            Self::AlcoholLaws => "Alcohol Laws",
            Self::SpeedLimits => "Speed Limits",
            Self::TrafficSignals => "Traffic Signals",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// Option texts in A, B, C, D order.
    pub options: [String; 4],
    pub correct_answer: OptionLetter,
}

impl QuizQuestion {
    pub fn new(question: String, options: [String; 4], correct_answer: OptionLetter) -> Self {
        Self {
            question,
            options,
            correct_answer,
        }
    }

    pub fn option(&self, letter: OptionLetter) -> &str {
        &self.options[letter.index()]
    }

    pub fn labelled_options(&self) -> impl Iterator<Item = String> + '_ {
        OptionLetter::ALL
            .into_iter()
            .map(|l| format!("{}. {}", l, self.option(l)))
    }
}

/// Number of questions answered with their correct letter.
/// Questions without a selection count as wrong.
pub fn score(questions: &[QuizQuestion], selections: &BTreeMap<usize, OptionLetter>) -> usize {
    questions
        .iter()
        .enumerate()
        .filter(|(idx, q)| selections.get(idx) == Some(&q.correct_answer))
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizScore {
    pub correct: usize,
    pub attempted: usize,
}

/// Answer state of the quiz a session is currently taking.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QuizState {
    pub topic: Topic,
    pub questions: Vec<QuizQuestion>,
    pub selections: BTreeMap<usize, OptionLetter>,
}

impl QuizState {
    pub fn new(topic: Topic, questions: Vec<QuizQuestion>) -> Self {
        Self {
            topic,
            questions,
            selections: BTreeMap::new(),
        }
    }

    pub fn next_unanswered(&self) -> Option<usize> {
        (0..self.questions.len()).find(|idx| !self.selections.contains_key(idx))
    }

    pub fn select(&mut self, idx: usize, letter: OptionLetter) -> bool {
        if idx >= self.questions.len() {
            return false;
        }
        self.selections.insert(idx, letter);
        true
    }

    pub fn all_answered(&self) -> bool {
        self.next_unanswered().is_none()
    }

    pub fn score(&self) -> QuizScore {
        QuizScore {
            correct: score(&self.questions, &self.selections),
            attempted: self.questions.len(),
        }
    }
}
