use std::future::Future;

use chatgpt::client::ChatGPT;
use chatgpt::config::{ChatGPTEngine, ModelConfiguration, ModelConfigurationBuilder};
use chatgpt::types::{ChatMessage, CompletionResponse, Role as ChatRole};
use log::{debug, info, warn};

use super::extract::{extract_flashcards, extract_quiz};
use super::{QuizState, Topic, MAX_QUESTIONS, MIN_QUESTIONS};
use crate::config::Config;
use crate::error::{Result, TutorError};
use crate::flashcards::{FlashcardDeck, DECK_SIZE};
use crate::tutor::{ChatTurn, Role, SYSTEM_PROMPT};

/// Turns a transcript into the next assistant reply.
pub trait CompletionService: Send + Sync {
    fn complete(&self, turns: &[ChatTurn]) -> impl Future<Output = Result<String>> + Send;
}

pub struct ChatGptService {
    chat_gpt: ChatGPT,
}

impl ChatGptService {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_model_config(config.openai_api_key.clone(), model_config(config)?)
    }

    /// The HTTP client is built from `model` here, so its timeout has to be
    /// set before this call rather than on `chat_gpt.config` afterwards.
    pub fn with_model_config(api_key: String, model: ModelConfiguration) -> Result<Self> {
        let chat_gpt = ChatGPT::new_with_config(api_key, model)?;
        Ok(Self { chat_gpt })
    }
}

pub fn model_config(config: &Config) -> Result<ModelConfiguration> {
    ModelConfigurationBuilder::default()
        .engine(engine_for(&config.model))
        .timeout(config.completion_timeout)
        .build()
        .map_err(|e| TutorError::Config(e.to_string()))
}

fn engine_for(model: &str) -> ChatGPTEngine {
    match model {
        "gpt-3.5-turbo" => ChatGPTEngine::Gpt35Turbo,
        "gpt-4" => ChatGPTEngine::Gpt4,
        "gpt-4-32k" => ChatGPTEngine::Gpt4_32k,
        // the client only accepts 'static model names; this runs once at startup
        other => ChatGPTEngine::Custom(Box::leak(other.to_string().into_boxed_str())),
    }
}

impl CompletionService for ChatGptService {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let history: Vec<ChatMessage> = turns
            .iter()
            .map(|turn| ChatMessage {
                role: match turn.role {
                    Role::System => ChatRole::System,
                    Role::User => ChatRole::User,
                    Role::Assistant => ChatRole::Assistant,
                },
                content: turn.content.clone(),
            })
            .collect();

        let response: CompletionResponse = self.chat_gpt.send_history(&history).await?;
        let content = response.message().content.trim().to_string();
        debug!("Completion: {:?}", content);

        if content.is_empty() {
            return Err(TutorError::EmptyCompletion);
        }
        Ok(content)
    }
}

fn quiz_prompt(topic: Topic, count: usize) -> String {
    format!(
        "Generate exactly {} multiple-choice questions for the topic '{}' from the South Carolina DMV permit test. \
        Each must follow this format:\n\
        Question 1: [question]\n\
        A. [option A]\n\
        B. [option B]\n\
        C. [option C]\n\
        D. [option D]\n\
        Answer: [correct option letter]\n\n\
        Return ONLY the questions, with no explanations, commentary or extra text. \
        Number all questions correctly and give the correct answer for each.",
        count,
        topic.label()
    )
}

fn flashcard_prompt(topic: Topic) -> String {
    format!(
        "Generate {} flashcards for the topic '{}' using only facts from the South Carolina permit test material. \
        Use exactly this format for every card and nothing else:\n\
        Q: [question]\n\
        A: [answer]",
        DECK_SIZE,
        topic.label()
    )
}

/// Builds quizzes and flashcard decks from completions.
pub struct QuizHelper<C> {
    completion: C,
}

impl<C: CompletionService> QuizHelper<C> {
    pub fn new(completion: C) -> Self {
        Self { completion }
    }

    pub fn completion(&self) -> &C {
        &self.completion
    }

    async fn one_shot(&self, prompt: String) -> Result<String> {
        let turns = [
            ChatTurn::new(Role::System, SYSTEM_PROMPT),
            ChatTurn::new(Role::User, prompt),
        ];
        self.completion.complete(&turns).await
    }

    /// Raw model output for a quiz of `count` questions (clamped to 5..=10).
    pub async fn generate_quiz_text(&self, topic: Topic, count: usize) -> Result<String> {
        let count = count.clamp(MIN_QUESTIONS, MAX_QUESTIONS);
        info!("Generating a {}-question quiz on '{}'", count, topic);
        self.one_shot(quiz_prompt(topic, count)).await
    }

    pub async fn generate_quiz(&self, topic: Topic, count: usize) -> Result<QuizState> {
        let raw = self.generate_quiz_text(topic, count).await?;
        let extraction = extract_quiz(&raw);
        if extraction.dropped > 0 {
            warn!(
                "Dropped {} malformed quiz block(s) for '{}'",
                extraction.dropped, topic
            );
        }
        info!("Parsed {} quiz question(s)", extraction.records.len());
        Ok(QuizState::new(topic, extraction.records))
    }

    pub async fn generate_flashcards_text(&self, topic: Topic) -> Result<String> {
        info!("Generating flashcards on '{}'", topic);
        self.one_shot(flashcard_prompt(topic)).await
    }

    pub async fn generate_flashcards(&self, topic: Topic) -> Result<FlashcardDeck> {
        let raw = self.generate_flashcards_text(topic).await?;
        let extraction = extract_flashcards(&raw);
        if extraction.dropped > 0 {
            warn!(
                "Dropped {} malformed flashcard block(s) for '{}'",
                extraction.dropped, topic
            );
        }
        info!("Parsed {} flashcard(s)", extraction.records.len());
        Ok(FlashcardDeck::new(topic, extraction.records))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Replays canned replies in order and records every transcript it was sent.
    /// Runs out into `EmptyCompletion` errors.
    pub(crate) struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<Vec<ChatTurn>>>,
    }

    impl ScriptedCompletion {
        pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requests(&self) -> Vec<Vec<ChatTurn>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl CompletionService for ScriptedCompletion {
        async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
            self.requests.lock().unwrap().push(turns.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TutorError::EmptyCompletion))
        }
    }

    const QUIZ_REPLY: &str = "Question 1: What should you do at a flashing red light?
A. Slow down
B. Stop, then go when safe
C. Speed up
D. Honk
Answer: B
Question 2: Broken
A. only one option
Answer: A";

    fn config_with_timeout(secs: &str) -> Config {
        let secs = secs.to_string();
        Config::from_lookup(move |key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "COMPLETION_TIMEOUT_SECS" => Some(secs.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn model_config_carries_engine_and_timeout() {
        let model = model_config(&config_with_timeout("7")).unwrap();
        assert_eq!(model.timeout, Duration::from_secs(7));
        assert_eq!(model.engine.to_string(), "gpt-4-turbo");
    }

    #[tokio::test]
    async fn silent_endpoint_times_out_with_the_configured_timeout() {
        // accepts connections into the backlog and never answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut model = model_config(&config_with_timeout("1")).unwrap();
        model.api_url = format!("http://{}/v1/chat/completions", addr).parse().unwrap();
        let service = ChatGptService::with_model_config("sk-test".to_string(), model).unwrap();

        let started = Instant::now();
        let result = service
            .complete(&[ChatTurn::new(Role::User, "What does a yield sign mean?")])
            .await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[tokio::test]
    async fn quiz_is_built_from_the_parsed_reply() {
        let helper = QuizHelper::new(ScriptedCompletion::new(vec![Ok(QUIZ_REPLY.to_string())]));

        let quiz = helper.generate_quiz(Topic::TrafficSignals, 5).await.unwrap();

        assert_eq!(quiz.topic, Topic::TrafficSignals);
        assert_eq!(quiz.questions.len(), 1);
        assert!(quiz.selections.is_empty());

        let sent = helper.completion().requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0].role, Role::System);
        assert_eq!(sent[0][1].role, Role::User);
        assert!(sent[0][1].content.contains("exactly 5"));
        assert!(sent[0][1].content.contains("'Traffic Signals'"));
    }

    #[tokio::test]
    async fn question_count_is_clamped() {
        let helper = QuizHelper::new(ScriptedCompletion::new(vec![
            Ok(String::new()),
            Ok(String::new()),
        ]));

        helper.generate_quiz_text(Topic::General, 50).await.unwrap();
        helper.generate_quiz_text(Topic::General, 1).await.unwrap();

        let sent = helper.completion().requests();
        assert!(sent[0][1].content.contains("exactly 10"));
        assert!(sent[1][1].content.contains("exactly 5"));
    }

    #[tokio::test]
    async fn unusable_reply_gives_an_empty_quiz() {
        let helper = QuizHelper::new(ScriptedCompletion::new(vec![Ok(
            "I can't help with that.".to_string()
        )]));

        let quiz = helper.generate_quiz(Topic::AlcoholLaws, 5).await.unwrap();
        assert!(quiz.questions.is_empty());
    }

    #[tokio::test]
    async fn flashcard_deck_is_built_from_the_parsed_reply() {
        let helper = QuizHelper::new(ScriptedCompletion::new(vec![Ok(
            "Q: Minimum following distance?\nA: Three seconds\nQ: Legal BAC at 21+?\nA: Under 0.08%".to_string(),
        )]));

        let deck = helper.generate_flashcards(Topic::General).await.unwrap();

        assert_eq!(deck.cards.len(), 2);
        assert_eq!(deck.cards[1].answer, "Under 0.08%");
        assert_eq!(deck.revealed_count(), 0);
        assert!(helper.completion().requests()[0][1].content.contains("Generate 10 flashcards"));
    }

    #[tokio::test]
    async fn completion_failure_is_propagated() {
        let helper = QuizHelper::new(ScriptedCompletion::new(vec![]));

        let err = helper.generate_flashcards(Topic::RoadSigns).await.unwrap_err();
        assert!(matches!(err, TutorError::EmptyCompletion));
    }

    #[test]
    fn known_models_map_to_engines() {
        assert!(matches!(engine_for("gpt-4"), ChatGPTEngine::Gpt4));
        assert!(matches!(engine_for("gpt-3.5-turbo"), ChatGPTEngine::Gpt35Turbo));
        assert!(matches!(engine_for("gpt-4-turbo"), ChatGPTEngine::Custom("gpt-4-turbo")));
    }
}
