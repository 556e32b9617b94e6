//! Pulls quiz questions and flashcards out of model-generated text.
//!
//! The model only loosely follows the layout it is asked for, so a block that
//! does not have the expected shape is skipped instead of failing the batch.
//! Nothing here returns an error: no match means an empty result.

use std::sync::OnceLock;

use regex::Regex;

use super::{OptionLetter, QuizQuestion};
use crate::flashcards::Flashcard;

/// Records recovered from one piece of text, plus how many blocks were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

impl<T> Default for Extraction<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dropped: 0,
        }
    }
}

fn question_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Question\s+\d+:").expect("question header pattern"))
}

// Everything after a "Question N:" header, up to the next header.
fn quiz_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A\s*(.*?)\nA\.\s*(.*?)\nB\.\s*(.*?)\nC\.\s*(.*?)\nD\.\s*(.*?)\nAnswer:\s*([A-D])")
            .expect("quiz block pattern")
    })
}

fn card_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\nQ:").expect("flashcard boundary pattern"))
}

fn card_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\A(.*?)\nA:(.*)\z").expect("flashcard block pattern"))
}

/// Parses blocks of the form
///
/// ```text
/// Question 1: ...
/// A. ...
/// B. ...
/// C. ...
/// D. ...
/// Answer: B
/// ```
///
/// The question number is ignored. Fields may span several lines and are
/// trimmed. A block missing an option, with options out of order, or without
/// a valid answer letter is dropped; it never swallows the block after it.
pub fn extract_quiz(text: &str) -> Extraction<QuizQuestion> {
    let headers: Vec<_> = question_header().find_iter(text).collect();
    let mut extraction = Extraction::default();

    for (i, header) in headers.iter().enumerate() {
        let end = headers.get(i + 1).map_or(text.len(), |next| next.start());
        let block = &text[header.end()..end];

        match quiz_block().captures(block).and_then(|caps| {
            let correct = OptionLetter::from_selection(&caps[6])?;
            Some(QuizQuestion::new(
                caps[1].trim().to_string(),
                [
                    caps[2].trim().to_string(),
                    caps[3].trim().to_string(),
                    caps[4].trim().to_string(),
                    caps[5].trim().to_string(),
                ],
                correct,
            ))
        }) {
            Some(question) => extraction.records.push(question),
            None => extraction.dropped += 1,
        }
    }

    extraction
}

pub fn parse_quiz(text: &str) -> Vec<QuizQuestion> {
    extract_quiz(text).records
}

/// Parses `Q: ...` / `A: ...` pairs. An answer runs until the next line that
/// starts with `Q:` or the end of the text. Cards without an `A:` line, or
/// with an empty side, are dropped.
pub fn extract_flashcards(text: &str) -> Extraction<Flashcard> {
    let mut extraction = Extraction::default();
    let Some(start) = text.find("Q:") else {
        return extraction;
    };

    for block in card_boundary().split(&text[start + 2..]) {
        let card = card_block().captures(block).and_then(|caps| {
            let question = caps[1].trim();
            let answer = caps[2].trim();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            Some(Flashcard::new(question.to_string(), answer.to_string()))
        });

        match card {
            Some(card) => extraction.records.push(card),
            None => extraction.dropped += 1,
        }
    }

    extraction
}

pub fn parse_flashcards(text: &str) -> Vec<Flashcard> {
    extract_flashcards(text).records
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_QUESTIONS: &str = "Question 1: What does a solid yellow line on your side mean?
A. You may pass
B. Do not pass
C. Lane ends
D. Road work ahead
Answer: B

Question 2: What is the speed limit in a school zone unless posted?
A. 15 mph
B. 25 mph
C. 35 mph
D. 45 mph
Answer: B";

    #[test]
    fn well_formed_quiz_blocks_are_parsed_in_order() {
        let questions = parse_quiz(TWO_QUESTIONS);

        assert_eq!(questions.len(), 2);
        assert_eq!(
            questions[0].question,
            "What does a solid yellow line on your side mean?"
        );
        assert_eq!(questions[0].option(OptionLetter::A), "You may pass");
        assert_eq!(questions[0].option(OptionLetter::D), "Road work ahead");
        assert_eq!(questions[0].correct_answer, OptionLetter::B);
        assert_eq!(questions[1].option(OptionLetter::C), "35 mph");
    }

    #[test]
    fn trailing_malformed_fragments_are_dropped() {
        let text = format!(
            "{}\n\nQuestion 3: Who has the right of way at a four-way stop?\nA. The larger vehicle\nB. The first to arrive\nAnswer: B\n\nQuestion 4: Unfinished",
            TWO_QUESTIONS
        );
        let extraction = extract_quiz(&text);

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.dropped, 2);
        assert!(extraction
            .records
            .iter()
            .all(|q| q.options.iter().all(|o| !o.is_empty())));
    }

    #[test]
    fn malformed_block_does_not_swallow_the_next_one() {
        let text = "Question 1: Missing option C
A. one
B. two
D. four
Answer: A
Question 2: Complete
A. w
B. x
C. y
D. z
Answer: D";
        let extraction = extract_quiz(text);

        assert_eq!(extraction.dropped, 1);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].question, "Complete");
        assert_eq!(extraction.records[0].option(OptionLetter::B), "x");
        assert_eq!(extraction.records[0].correct_answer, OptionLetter::D);
    }

    #[test]
    fn out_of_order_options_and_bad_answer_letters_are_dropped() {
        let text = "Question 1: Swapped
A. a
B. b
D. d
C. c
Answer: A
Question 2: Bad letter
A. a
B. b
C. c
D. d
Answer: E";
        assert!(parse_quiz(text).is_empty());
    }

    #[test]
    fn multi_line_fields_are_kept_verbatim_then_trimmed() {
        let text = "Question 7:   When may you drive\n  in the left lane?  \nA. Never\nB. When passing\n   or turning left\nC. Always\nD. At night\nAnswer:   B";
        let questions = parse_quiz(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(
            questions[0].question,
            "When may you drive\n  in the left lane?"
        );
        assert_eq!(
            questions[0].option(OptionLetter::B),
            "When passing\n   or turning left"
        );
    }

    #[test]
    fn text_without_quiz_blocks_yields_nothing() {
        assert!(parse_quiz("").is_empty());
        assert!(parse_quiz("Sorry, I can only help with the permit test.").is_empty());
        assert_eq!(extract_quiz("A. one\nB. two\nAnswer: A").dropped, 0);
    }

    #[test]
    fn flashcards_do_not_leak_between_blocks() {
        let cards = parse_flashcards("Q: foo\nA: bar\nQ: baz\nA: qux");

        assert_eq!(
            cards,
            vec![
                Flashcard::new("foo".to_string(), "bar".to_string()),
                Flashcard::new("baz".to_string(), "qux".to_string()),
            ]
        );
    }

    #[test]
    fn flashcard_answers_run_to_the_next_question() {
        let text = "Here are your cards:\n\nQ: What does a flashing red light mean?\nA: Stop completely,\nthen proceed when safe.\n\nQ: What is the BAC limit for drivers under 21?\nA: 0.02%\n";
        let cards = parse_flashcards(text);

        assert_eq!(cards.len(), 2);
        assert_eq!(
            cards[0].answer,
            "Stop completely,\nthen proceed when safe."
        );
        assert_eq!(cards[1].question, "What is the BAC limit for drivers under 21?");
        assert_eq!(cards[1].answer, "0.02%");
    }

    #[test]
    fn flashcards_without_answers_are_dropped() {
        let extraction = extract_flashcards("Q: orphan question\nQ: real\nA: answer\nQ: \nA: no question");

        assert_eq!(
            extraction.records,
            vec![Flashcard::new("real".to_string(), "answer".to_string())]
        );
        assert_eq!(extraction.dropped, 2);
    }

    #[test]
    fn flashcard_count_is_not_enforced() {
        let text: String = (1..=13)
            .map(|i| format!("Q: question {}\nA: answer {}\n", i, i))
            .collect();
        let cards = parse_flashcards(&text);

        assert_eq!(cards.len(), 13);
        assert_eq!(cards[12].answer, "answer 13");
        assert!(parse_flashcards("no cards here").is_empty());
    }

    #[test]
    fn parsing_is_repeatable() {
        assert_eq!(parse_quiz(TWO_QUESTIONS), parse_quiz(TWO_QUESTIONS));
        let cards = "Q: a\nA: b\nQ: c\nA: d";
        assert_eq!(parse_flashcards(cards), parse_flashcards(cards));
    }
}
