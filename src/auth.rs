use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{Result, TutorError};

/// Login check in front of the rest of the bot.
pub trait AuthGate {
    /// Whether `password` is the password on record for `email`.
    fn authenticate(&self, email: &str, password: &str) -> Result<bool>;
    /// Whether `email` is on the paid users allow-list.
    fn is_authorized(&self, email: &str) -> bool;
}

#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Granted,
    BadCredentials,
    NotPaid,
}

pub fn login<G: AuthGate>(gate: &G, email: &str, password: &str) -> Result<LoginOutcome> {
    if !gate.authenticate(email, password)? {
        return Ok(LoginOutcome::BadCredentials);
    }
    if !gate.is_authorized(email) {
        return Ok(LoginOutcome::NotPaid);
    }
    Ok(LoginOutcome::Granted)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserRecord {
    pub email: String,
    /// bcrypt hash
    pub password_hash: String,
    #[serde(default)]
    pub paid: bool,
}

#[derive(Debug, serde::Deserialize)]
struct UserFile {
    users: Vec<UserRecord>,
}

/// User records loaded from a JSON file of the form
/// `{ "users": [{ "email": ..., "password_hash": ..., "paid": true }] }`.
#[derive(Debug, Default)]
pub struct UserStore {
    users: HashMap<String, UserRecord>,
}

impl UserStore {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| TutorError::UserStore {
            path: path.display().to_string(),
            source,
        })?;
        let file: UserFile = serde_json::from_str(&raw)?;
        let store = Self::from_records(file.users);
        info!(
            "Loaded {} user record(s) from {}",
            store.users.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_records(records: Vec<UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|record| (normalize_email(&record.email), record))
            .collect();
        Self { users }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

impl AuthGate for UserStore {
    fn authenticate(&self, email: &str, password: &str) -> Result<bool> {
        match self.users.get(&normalize_email(email)) {
            Some(record) => Ok(bcrypt::verify(password, &record.password_hash)?),
            None => {
                debug!("Login attempt for unknown email");
                Ok(false)
            }
        }
    }

    fn is_authorized(&self, email: &str) -> bool {
        self.users
            .get(&normalize_email(email))
            .map_or(false, |record| record.paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str, password: &str, paid: bool) -> UserRecord {
        UserRecord {
            email: email.to_string(),
            password_hash: bcrypt::hash(password, 4).unwrap(),
            paid,
        }
    }

    fn store() -> UserStore {
        UserStore::from_records(vec![
            record("Learner@Example.com", "parallel-park", true),
            record("trial@example.com", "yield", false),
        ])
    }

    #[test]
    fn paid_user_with_right_password_is_granted() {
        let outcome = login(&store(), "  learner@example.com ", "parallel-park").unwrap();
        assert_eq!(outcome, LoginOutcome::Granted);
    }

    #[test]
    fn wrong_password_or_unknown_email_is_rejected() {
        let store = store();
        assert_eq!(
            login(&store, "learner@example.com", "parallel-parking").unwrap(),
            LoginOutcome::BadCredentials
        );
        assert_eq!(
            login(&store, "nobody@example.com", "parallel-park").unwrap(),
            LoginOutcome::BadCredentials
        );
    }

    #[test]
    fn unpaid_user_is_not_authorized() {
        let store = store();
        assert!(store.authenticate("trial@example.com", "yield").unwrap());
        assert!(!store.is_authorized("trial@example.com"));
        assert_eq!(
            login(&store, "trial@example.com", "yield").unwrap(),
            LoginOutcome::NotPaid
        );
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        let store = UserStore::from_records(vec![UserRecord {
            email: "broken@example.com".to_string(),
            password_hash: "not-a-hash".to_string(),
            paid: true,
        }]);
        assert!(store.authenticate("broken@example.com", "anything").is_err());
    }

    #[test]
    fn store_loads_from_json_file() {
        let path = std::env::temp_dir().join(format!("dmv-tutor-users-{}.json", std::process::id()));
        let json = serde_json::json!({
            "users": [
                { "email": "a@example.com", "password_hash": bcrypt::hash("pw", 4).unwrap(), "paid": true },
                { "email": "b@example.com", "password_hash": bcrypt::hash("pw", 4).unwrap() }
            ]
        });
        fs::write(&path, json.to_string()).unwrap();

        let store = UserStore::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(store.user_count(), 2);
        assert!(store.is_authorized("a@example.com"));
        assert!(!store.is_authorized("b@example.com"));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = UserStore::load(Path::new("/nonexistent/users.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/users.json"));
    }
}
