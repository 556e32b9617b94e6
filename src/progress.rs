use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::quiz::Topic;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizAttempt {
    pub date: NaiveDate,
    pub topic: Topic,
    pub correct: usize,
    pub attempted: usize,
}

/// Totals for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub quizzes: usize,
    pub correct: usize,
    pub attempted: usize,
}

impl DailySummary {
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct, self.attempted)
    }
}

fn percentage(correct: usize, attempted: usize) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    correct as f64 * 100.0 / attempted as f64
}

/// Append-only record of the quizzes submitted in a session.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProgressLog {
    attempts: Vec<QuizAttempt>,
}

impl ProgressLog {
    pub fn record(&mut self, attempt: QuizAttempt) {
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[QuizAttempt] {
        &self.attempts
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// One entry per date, oldest first.
    pub fn summarize(&self) -> Vec<DailySummary> {
        let mut by_date: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();
        for attempt in &self.attempts {
            let day = by_date.entry(attempt.date).or_insert(DailySummary {
                date: attempt.date,
                quizzes: 0,
                correct: 0,
                attempted: 0,
            });
            day.quizzes += 1;
            day.correct += attempt.correct;
            day.attempted += attempt.attempted;
        }
        by_date.into_values().collect()
    }

    /// Correct and attempted questions summed over every quiz.
    fn totals(&self) -> (usize, usize) {
        self.attempts
            .iter()
            .fold((0, 0), |(c, a), attempt| (c + attempt.correct, a + attempt.attempted))
    }

    pub fn overall_accuracy(&self) -> f64 {
        let (correct, attempted) = self.totals();
        percentage(correct, attempted)
    }

    pub fn report(&self) -> String {
        if self.is_empty() {
            return "No quizzes submitted yet. Take a Practice Quiz to start tracking your progress."
                .to_string();
        }
        let mut lines: Vec<String> = self
            .summarize()
            .iter()
            .map(|day| {
                format!(
                    "{}: {}/{} correct ({:.1}%)",
                    day.date.format("%Y-%m-%d"),
                    day.correct,
                    day.attempted,
                    day.accuracy()
                )
            })
            .collect();
        let (correct, attempted) = self.totals();
        lines.push(format!(
            "Overall: {}/{} correct ({:.1}%)",
            correct,
            attempted,
            self.overall_accuracy()
        ));
        lines.join("\n")
    }
}
