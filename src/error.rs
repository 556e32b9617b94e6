use thiserror::Error;

pub type Result<T> = std::result::Result<T, TutorError>;

#[derive(Error, Debug)]
pub enum TutorError {
    #[error("completion request failed: {0}")]
    Completion(#[from] chatgpt::err::Error),

    #[error("completion service returned an empty reply")]
    EmptyCompletion,

    #[error("failed to read user records from '{path}': {source}")]
    UserStore {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed user records: {0}")]
    UserRecords(#[from] serde_json::Error),

    #[error("password check failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("failed to render document: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
