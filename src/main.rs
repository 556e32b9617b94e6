use std::sync::Arc;

use dotenv::dotenv;
use log::{debug, error, info, warn};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, InMemStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, InputFile, KeyboardButton, KeyboardMarkup},
};

use dmv_tutor_bot::{
    auth::{self, login, LoginOutcome, UserStore},
    config::Config,
    flashcards::{Flashcard, FlashcardDeck},
    quiz::{
        self,
        ai_helper::{ChatGptService, QuizHelper},
        OptionLetter, QuizState, Topic, MAX_QUESTIONS, MIN_QUESTIONS,
    },
    session::Session,
    study_plan,
    tutor::{split_reply, MAX_MESSAGE_UNITS},
};

type TutorDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type DialogueStorage = Arc<ErasedStorage<State>>;
type Tutor = QuizHelper<ChatGptService>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveEmail,
    ReceivePassword {
        email: String,
    },
    Menu {
        session: Session,
    },
    TutorChat {
        session: Session,
    },
    QuizReceiveTopic {
        session: Session,
    },
    QuizReceiveCount {
        session: Session,
        topic: Topic,
    },
    TakingQuiz {
        session: Session,
    },
    FlashcardsReceiveTopic {
        session: Session,
    },
    ReviewingFlashcards {
        session: Session,
    },
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();

    pretty_env_logger::init();
    info!("Starting DMV tutor bot...");

    let config = Config::from_env()?;
    let bot = Bot::from_env();

    let storage: DialogueStorage = match &config.dialogue_db {
        Some(path) => {
            info!("Keeping dialogues in {}", path);
            SqliteStorage::open(path, Json).await?.erase()
        }
        None => {
            info!("Keeping dialogues in memory");
            InMemStorage::<State>::new().erase()
        }
    };

    let users = Arc::new(UserStore::load(&config.users_file)?);
    let tutor: Arc<Tutor> = Arc::new(QuizHelper::new(ChatGptService::new(&config)?));

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveEmail].endpoint(receive_email))
            .branch(dptree::case![State::ReceivePassword { email }].endpoint(receive_password))
            .branch(dptree::case![State::Menu { session }].endpoint(menu))
            .branch(dptree::case![State::TutorChat { session }].endpoint(tutor_chat))
            .branch(dptree::case![State::QuizReceiveTopic { session }].endpoint(quiz_receive_topic))
            .branch(
                dptree::case![State::QuizReceiveCount { session, topic }]
                    .endpoint(quiz_receive_count),
            )
            .branch(dptree::case![State::TakingQuiz { session }].endpoint(taking_quiz))
            .branch(
                dptree::case![State::FlashcardsReceiveTopic { session }]
                    .endpoint(flashcards_receive_topic),
            )
            .branch(
                dptree::case![State::ReviewingFlashcards { session }]
                    .endpoint(reviewing_flashcards),
            ),
    )
    .dependencies(dptree::deps![storage, users, tutor])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const TUTOR_CHAT: &str = "Tutor Chat";
const PRACTICE_QUIZ: &str = "Practice Quiz";
const FLASHCARDS: &str = "Flashcards";
const STUDY_PLAN: &str = "Study Plan";
const PROGRESS_TRACKER: &str = "Progress Tracker";
const LOG_OUT: &str = "Log Out";

const MENU: &str = "Menu";
const CLEAR_CHAT: &str = "Clear Chat";
const REVEAL_ANSWER: &str = "Reveal Answer";
const NEXT_CARD: &str = "Next Card";

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(TUTOR_CHAT), KeyboardButton::new(PRACTICE_QUIZ)],
        vec![KeyboardButton::new(FLASHCARDS), KeyboardButton::new(STUDY_PLAN)],
        vec![KeyboardButton::new(PROGRESS_TRACKER), KeyboardButton::new(LOG_OUT)],
    ])
}

fn topic_keyboard() -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = Topic::ALL
        .chunks(2)
        .map(|pair| pair.iter().map(|t| KeyboardButton::new(t.label())).collect())
        .collect();
    rows.push(vec![KeyboardButton::new(MENU)]);
    KeyboardMarkup::new(rows)
}

fn count_keyboard() -> KeyboardMarkup {
    let counts: Vec<KeyboardButton> = (MIN_QUESTIONS..=MAX_QUESTIONS)
        .map(|n| KeyboardButton::new(n.to_string()))
        .collect();
    KeyboardMarkup::new(vec![counts, vec![KeyboardButton::new(MENU)]])
}

fn answer_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        OptionLetter::ALL
            .iter()
            .map(|l| KeyboardButton::new(l.as_str()))
            .collect(),
        vec![KeyboardButton::new(MENU)],
    ])
}

fn chat_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(CLEAR_CHAT),
        KeyboardButton::new(MENU),
    ]])
}

fn flashcard_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(REVEAL_ANSWER), KeyboardButton::new(NEXT_CARD)],
        vec![KeyboardButton::new(MENU)],
    ])
}

async fn to_menu(
    bot: &Bot,
    dialogue: &TutorDialogue,
    chat_id: ChatId,
    session: Session,
    text: &str,
) -> HandlerResult {
    bot.send_message(chat_id, text)
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::Menu { session }).await?;
    Ok(())
}

const GREETING_TEXT: &str = "Hi! I'm your South Carolina DMV permit test tutor. Please log in to continue. What is your email?";
async fn start(bot: Bot, dialogue: TutorDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;

    dialogue.update(State::ReceiveEmail).await?;
    Ok(())
}

async fn receive_email(bot: Bot, dialogue: TutorDialogue, msg: Message) -> HandlerResult {
    match msg.text().map(auth::normalize_email) {
        Some(email) if email.contains('@') => {
            bot.send_message(msg.chat.id, "Thanks! Now enter your password.")
                .await?;
            dialogue.update(State::ReceivePassword { email }).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please enter a valid email address.")
                .await?;
        }
    }
    Ok(())
}

async fn receive_password(
    bot: Bot,
    dialogue: TutorDialogue,
    email: String,
    users: Arc<UserStore>,
    msg: Message,
) -> HandlerResult {
    let Some(password) = msg.text() else {
        bot.send_message(msg.chat.id, "Please enter your password (as text).")
            .await?;
        return Ok(());
    };

    // Keep the password out of the chat history. Not fatal if the bot lacks the right to delete.
    let _ = bot.delete_message(msg.chat.id, msg.id).await;

    match login(users.as_ref(), &email, password) {
        Ok(LoginOutcome::Granted) => {
            info!("Session opened in chat {}", msg.chat.id);
            debug!("Chat {} logged in as {}", msg.chat.id, email);
            to_menu(
                &bot,
                &dialogue,
                msg.chat.id,
                Session::new(email),
                "Welcome! Pick where you want to start.",
            )
            .await?;
        }
        Ok(LoginOutcome::BadCredentials) => {
            bot.send_message(
                msg.chat.id,
                "Invalid email or password. Please enter your email again.",
            )
            .await?;
            dialogue.update(State::ReceiveEmail).await?;
        }
        Ok(LoginOutcome::NotPaid) => {
            bot.send_message(
                msg.chat.id,
                "This account does not have access yet. Access is limited to paid users. Enter another email to try again.",
            )
            .await?;
            dialogue.update(State::ReceiveEmail).await?;
        }
        Err(err) => {
            error!("Login check failed in chat {}: {}", msg.chat.id, err);
            bot.send_message(
                msg.chat.id,
                "Login is unavailable right now. Please enter your email to try again.",
            )
            .await?;
            dialogue.update(State::ReceiveEmail).await?;
        }
    }
    Ok(())
}

async fn menu(bot: Bot, dialogue: TutorDialogue, session: Session, msg: Message) -> HandlerResult {
    match msg.text() {
        Some(TUTOR_CHAT) => {
            let intro = if session.transcript.visible().is_empty() {
                "Ask me anything about the permit test.".to_string()
            } else {
                format!(
                    "Picking up where we left off ({} messages so far). Ask your next question.",
                    session.transcript.visible().len()
                )
            };
            bot.send_message(msg.chat.id, intro)
                .reply_markup(chat_keyboard())
                .await?;
            dialogue.update(State::TutorChat { session }).await?;
        }
        Some(PRACTICE_QUIZ) => {
            bot.send_message(
                msg.chat.id,
                "Pick a quiz topic. Answer every question to get your score.",
            )
            .reply_markup(topic_keyboard())
            .await?;
            dialogue.update(State::QuizReceiveTopic { session }).await?;
        }
        Some(FLASHCARDS) => {
            bot.send_message(msg.chat.id, "Pick a flashcard topic.")
                .reply_markup(topic_keyboard())
                .await?;
            dialogue
                .update(State::FlashcardsReceiveTopic { session })
                .await?;
        }
        Some(STUDY_PLAN) => {
            bot.send_message(msg.chat.id, study_plan::STUDY_PLAN).await?;
            match study_plan::render_pdf(study_plan::STUDY_PLAN) {
                Ok(pdf) => {
                    bot.send_document(
                        msg.chat.id,
                        InputFile::memory(pdf).file_name("sc-permit-study-plan.pdf"),
                    )
                    .await?;
                }
                Err(err) => {
                    error!("Study plan rendering failed: {}", err);
                    bot.send_message(msg.chat.id, "The PDF copy is unavailable right now.")
                        .await?;
                }
            }
            to_menu(&bot, &dialogue, msg.chat.id, session, "What next?").await?;
        }
        Some(PROGRESS_TRACKER) => {
            let report = session.progress.report();
            to_menu(&bot, &dialogue, msg.chat.id, session, &report).await?;
        }
        Some(LOG_OUT) => {
            info!("Session closed in chat {}", msg.chat.id);
            bot.send_message(
                msg.chat.id,
                "You are logged out. Enter your email to log in again.",
            )
            .reply_markup(teloxide::types::KeyboardRemove::new())
            .await?;
            dialogue.update(State::ReceiveEmail).await?;
        }
        _ => {
            to_menu(&bot, &dialogue, msg.chat.id, session, "Please choose one of the options.")
                .await?;
        }
    }
    Ok(())
}

async fn tutor_chat(
    bot: Bot,
    dialogue: TutorDialogue,
    tutor: Arc<Tutor>,
    mut session: Session,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(MENU) => {
            return to_menu(&bot, &dialogue, msg.chat.id, session, "Back to the menu.").await;
        }
        Some(CLEAR_CHAT) => {
            session.transcript.clear();
            bot.send_message(msg.chat.id, "Chat cleared. Ask a new question.")
                .reply_markup(chat_keyboard())
                .await?;
        }
        Some(text) => {
            let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

            let result = session.transcript.send(tutor.completion(), text).await;
            match result {
                Ok(reply) => {
                    // the turn is saved before sending so a failed send does not lose it
                    dialogue.update(State::TutorChat { session }).await?;
                    let pieces = split_reply(&reply, MAX_MESSAGE_UNITS);
                    let last = pieces.len().saturating_sub(1);
                    for (i, piece) in pieces.into_iter().enumerate() {
                        let request = bot.send_message(msg.chat.id, piece);
                        if i == last {
                            request.reply_markup(chat_keyboard()).await?;
                        } else {
                            request.await?;
                        }
                    }
                    return Ok(());
                }
                Err(err) => {
                    error!("Tutor reply failed: {}", err);
                    bot.send_message(
                        msg.chat.id,
                        "The tutor could not answer right now. Please send your question again.",
                    )
                    .await?;
                }
            }
        }
        None => {
            bot.send_message(msg.chat.id, "Please type your question as text.")
                .await?;
        }
    }

    dialogue.update(State::TutorChat { session }).await?;
    Ok(())
}

async fn quiz_receive_topic(
    bot: Bot,
    dialogue: TutorDialogue,
    session: Session,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(MENU) => to_menu(&bot, &dialogue, msg.chat.id, session, "Back to the menu.").await,
        text => match text.and_then(Topic::from_label) {
            Some(topic) => {
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "How many questions? ({} to {}, {} is a good start)",
                        MIN_QUESTIONS,
                        MAX_QUESTIONS,
                        quiz::DEFAULT_QUESTIONS
                    ),
                )
                .reply_markup(count_keyboard())
                .await?;
                dialogue
                    .update(State::QuizReceiveCount { session, topic })
                    .await?;
                Ok(())
            }
            None => {
                bot.send_message(msg.chat.id, "Please pick one of the topics.")
                    .reply_markup(topic_keyboard())
                    .await?;
                Ok(())
            }
        },
    }
}

fn question_text(quiz: &QuizState, idx: usize) -> String {
    let question = &quiz.questions[idx];
    let options = question.labelled_options().collect::<Vec<_>>().join("\n");
    format!(
        "Question {} of {}:\n{}\n\n{}",
        idx + 1,
        quiz.questions.len(),
        question.question,
        options
    )
}

async fn quiz_receive_count(
    bot: Bot,
    dialogue: TutorDialogue,
    tutor: Arc<Tutor>,
    (mut session, topic): (Session, Topic),
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == MENU {
        return to_menu(&bot, &dialogue, msg.chat.id, session, "Back to the menu.").await;
    }

    let count = match text.trim().parse::<usize>() {
        Ok(n) if (MIN_QUESTIONS..=MAX_QUESTIONS).contains(&n) => n,
        _ => {
            bot.send_message(
                msg.chat.id,
                format!("Please choose a number from {} to {}.", MIN_QUESTIONS, MAX_QUESTIONS),
            )
            .reply_markup(count_keyboard())
            .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "Creating your quiz...").await?;
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let quiz = match tutor.generate_quiz(topic, count).await {
        Ok(quiz) if !quiz.questions.is_empty() => quiz,
        Ok(_) => {
            warn!("Quiz reply for '{}' had no usable questions", topic);
            bot.send_message(
                msg.chat.id,
                "I couldn't put a quiz together this time. Pick a number to try again.",
            )
            .reply_markup(count_keyboard())
            .await?;
            return Ok(());
        }
        Err(err) => {
            error!("Quiz generation failed: {}", err);
            bot.send_message(
                msg.chat.id,
                "Quiz generation failed. Pick a number to try again.",
            )
            .reply_markup(count_keyboard())
            .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, question_text(&quiz, 0))
        .reply_markup(answer_keyboard())
        .await?;

    session.quiz = Some(quiz);
    dialogue.update(State::TakingQuiz { session }).await?;
    Ok(())
}

async fn taking_quiz(
    bot: Bot,
    dialogue: TutorDialogue,
    mut session: Session,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == MENU {
        session.quiz = None;
        return to_menu(
            &bot,
            &dialogue,
            msg.chat.id,
            session,
            "Quiz abandoned. It was not added to your progress.",
        )
        .await;
    }

    let Some(quiz) = session.quiz.as_mut() else {
        return to_menu(&bot, &dialogue, msg.chat.id, session, "No quiz in progress.").await;
    };
    let Some(current) = quiz.next_unanswered() else {
        return submit_quiz(&bot, &dialogue, msg.chat.id, session).await;
    };

    let Some(letter) = OptionLetter::from_selection(text) else {
        bot.send_message(msg.chat.id, "Please answer with A, B, C or D.")
            .reply_markup(answer_keyboard())
            .await?;
        return Ok(());
    };
    quiz.select(current, letter);

    match quiz.next_unanswered() {
        Some(next) => {
            bot.send_message(msg.chat.id, question_text(quiz, next))
                .reply_markup(answer_keyboard())
                .await?;
            dialogue.update(State::TakingQuiz { session }).await?;
            Ok(())
        }
        None => submit_quiz(&bot, &dialogue, msg.chat.id, session).await,
    }
}

async fn submit_quiz(
    bot: &Bot,
    dialogue: &TutorDialogue,
    chat_id: ChatId,
    mut session: Session,
) -> HandlerResult {
    let today = chrono::Local::now().date_naive();
    let Some((quiz, score)) = session.submit_quiz(today) else {
        return to_menu(bot, dialogue, chat_id, session, "No quiz in progress.").await;
    };
    info!(
        "Chat {} scored {}/{} on '{}'",
        chat_id, score.correct, score.attempted, quiz.topic
    );

    let answers = quiz
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let mark = if quiz.selections.get(&i) == Some(&q.correct_answer) {
                "correct"
            } else {
                "missed"
            };
            format!("- Question {}: {} ({})", i + 1, q.correct_answer, mark)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let summary = format!(
        "You got {} out of {} correct!\n\nCorrect answers:\n{}",
        score.correct, score.attempted, answers
    );
    to_menu(bot, dialogue, chat_id, session, &summary).await
}

fn card_text(deck: &FlashcardDeck, card: &Flashcard) -> String {
    format!(
        "Card {} of {}:\n{}",
        deck.position() + 1,
        deck.cards.len(),
        card.question
    )
}

async fn flashcards_receive_topic(
    bot: Bot,
    dialogue: TutorDialogue,
    tutor: Arc<Tutor>,
    mut session: Session,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == MENU {
        return to_menu(&bot, &dialogue, msg.chat.id, session, "Back to the menu.").await;
    }
    let Some(topic) = Topic::from_label(text) else {
        bot.send_message(msg.chat.id, "Please pick one of the topics.")
            .reply_markup(topic_keyboard())
            .await?;
        return Ok(());
    };

    bot.send_message(msg.chat.id, "Creating your flashcards...").await?;
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let deck = match tutor.generate_flashcards(topic).await {
        Ok(deck) if !deck.cards.is_empty() => deck,
        Ok(_) => {
            warn!("Flashcard reply for '{}' had no usable cards", topic);
            bot.send_message(
                msg.chat.id,
                "I couldn't make flashcards this time. Pick a topic to try again.",
            )
            .reply_markup(topic_keyboard())
            .await?;
            return Ok(());
        }
        Err(err) => {
            error!("Flashcard generation failed: {}", err);
            bot.send_message(
                msg.chat.id,
                "Flashcard generation failed. Pick a topic to try again.",
            )
            .reply_markup(topic_keyboard())
            .await?;
            return Ok(());
        }
    };

    if let Some(card) = deck.current() {
        bot.send_message(msg.chat.id, card_text(&deck, card))
            .reply_markup(flashcard_keyboard())
            .await?;
    }

    session.deck = Some(deck);
    dialogue
        .update(State::ReviewingFlashcards { session })
        .await?;
    Ok(())
}

async fn reviewing_flashcards(
    bot: Bot,
    dialogue: TutorDialogue,
    mut session: Session,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == MENU {
        return to_menu(&bot, &dialogue, msg.chat.id, session, "Back to the menu.").await;
    }
    let Some(deck) = session.deck.as_mut() else {
        return to_menu(&bot, &dialogue, msg.chat.id, session, "No flashcards yet.").await;
    };

    match text {
        REVEAL_ANSWER => {
            let reply = match deck.reveal() {
                Some(card) => format!("Answer: {}", card.answer),
                None => "No card to reveal.".to_string(),
            };
            bot.send_message(msg.chat.id, reply)
                .reply_markup(flashcard_keyboard())
                .await?;
        }
        NEXT_CARD => {
            let next = deck.advance().cloned();
            match next {
                Some(card) => {
                    bot.send_message(msg.chat.id, card_text(deck, &card))
                        .reply_markup(flashcard_keyboard())
                        .await?;
                }
                None => {
                    let done = format!(
                        "That's the whole deck! You revealed {} of {} answers.",
                        deck.revealed_count(),
                        deck.cards.len()
                    );
                    return to_menu(&bot, &dialogue, msg.chat.id, session, &done).await;
                }
            }
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                format!("Use \"{}\" or \"{}\".", REVEAL_ANSWER, NEXT_CARD),
            )
            .reply_markup(flashcard_keyboard())
            .await?;
        }
    }

    dialogue
        .update(State::ReviewingFlashcards { session })
        .await?;
    Ok(())
}
