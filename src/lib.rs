pub mod auth;
pub mod config;
pub mod error;
pub mod flashcards;
pub mod progress;
pub mod quiz;
pub mod session;
pub mod study_plan;
pub mod tutor;
