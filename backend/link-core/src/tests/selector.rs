// Unit tests for auth method selection

use crate::auth::{AuthMethodSelector, Prompter, SelectorMode, SelectorPhase};
use crate::auth::parse_menu_choice;
use crate::config::AuthPreferences;
use crate::error::AuthError;
use crate::session_store::SessionStore;

use models::AuthMethod;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

/// Answers questions from a fixed script; `None` in the script means EOF.
struct ScriptedPrompter {
    answers: VecDeque<Option<String>>,
    said: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPrompter {
    fn new(answers: &[Option<&str>]) -> (Self, Arc<Mutex<Vec<String>>>) {
        let said = Arc::new(Mutex::new(Vec::new()));
        let prompter = Self {
            answers: answers.iter().map(|a| a.map(str::to_string)).collect(),
            said: Arc::clone(&said),
        };
        (prompter, said)
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&mut self, _question: &str) -> Result<Option<String>, AuthError> {
        Ok(self.answers.pop_front().flatten())
    }

    async fn say(&mut self, line: &str) -> Result<(), AuthError> {
        self.said.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

fn interactive(store: SessionStore, answers: &[Option<&str>]) -> (AuthMethodSelector, Arc<Mutex<Vec<String>>>) {
    let (prompter, said) = ScriptedPrompter::new(answers);
    (
        AuthMethodSelector::new(store, SelectorMode::Interactive(Box::new(prompter))),
        said,
    )
}

fn headless(store: SessionStore, preferences: AuthPreferences) -> AuthMethodSelector {
    AuthMethodSelector::new(store, SelectorMode::NonInteractive(preferences))
}

/// **VALUE**: Headless deployments resolve immediately.
///
/// **WHY THIS MATTERS**: A service manager without a terminal would otherwise
/// hang forever waiting on stdin.
///
/// **BUG THIS CATCHES**: Reading stdin when it is not a terminal.
#[tokio::test]
async fn given_no_terminal_when_selecting_then_resolves_qr_without_blocking() {
    let dir = TempDir::new().unwrap();
    let mut selector = headless(SessionStore::new(dir.path()), AuthPreferences::default());

    let attempt = tokio::time::timeout(Duration::from_secs(1), selector.select())
        .await
        .expect("selection must not block")
        .unwrap();

    assert_eq!(attempt.method(), AuthMethod::Qr);
    assert_eq!(selector.phase(), SelectorPhase::Resolved);
    assert!(!selector.is_interactive());
}

#[tokio::test]
async fn given_headless_pairing_without_phone_when_selecting_then_validation_error() {
    let dir = TempDir::new().unwrap();
    let preferences = AuthPreferences {
        preferred_method: Some(AuthMethod::Pairing),
        phone_number: None,
    };
    let mut selector = headless(SessionStore::new(dir.path()), preferences);

    let result = selector.select().await;

    assert!(matches!(result, Err(AuthError::Validation { .. })));
}

#[tokio::test]
async fn given_headless_pairing_with_phone_when_selecting_then_pairing_attempt() {
    let dir = TempDir::new().unwrap();
    let preferences = AuthPreferences {
        preferred_method: Some(AuthMethod::Pairing),
        phone_number: Some("+44 7700 900123".into()),
    };
    let mut selector = headless(SessionStore::new(dir.path()), preferences);

    let attempt = selector.select().await.unwrap();

    assert_eq!(attempt.method(), AuthMethod::Pairing);
    assert_eq!(attempt.phone_number().unwrap().as_str(), "+447700900123");
}

#[tokio::test]
async fn given_invalid_phone_then_valid_when_interactive_then_reprompts_and_resolves() {
    // GIVEN: Operator picks pairing, typos the number, then fixes it
    let dir = TempDir::new().unwrap();
    let (mut selector, said) = interactive(
        SessionStore::new(dir.path()),
        &[Some("2"), Some("4155551234"), Some("+1 415 555 1234")],
    );

    // WHEN
    let attempt = selector.select().await.unwrap();

    // THEN
    assert_eq!(attempt.method(), AuthMethod::Pairing);
    assert_eq!(attempt.phone_number().unwrap().as_str(), "+14155551234");
    assert!(said.lock().unwrap()[0].starts_with("Invalid phone number"));
}

#[tokio::test]
async fn given_empty_phone_when_interactive_then_back_to_menu() {
    let dir = TempDir::new().unwrap();
    let (mut selector, _) = interactive(
        SessionStore::new(dir.path()),
        &[Some("2"), Some(""), Some("1")],
    );

    let attempt = selector.select().await.unwrap();

    assert_eq!(attempt.method(), AuthMethod::Qr);
}

#[tokio::test]
async fn given_exit_choice_when_interactive_then_exit_attempt() {
    let dir = TempDir::new().unwrap();
    let (mut selector, _) = interactive(SessionStore::new(dir.path()), &[Some("4")]);

    assert_eq!(selector.select().await.unwrap().method(), AuthMethod::Exit);
}

#[tokio::test]
async fn given_stdin_closed_when_interactive_then_falls_back_to_qr() {
    let dir = TempDir::new().unwrap();
    let (mut selector, _) = interactive(SessionStore::new(dir.path()), &[None]);

    assert_eq!(selector.select().await.unwrap().method(), AuthMethod::Qr);
}

/// **VALUE**: `clear` wipes the bundle and asks again rather than resolving.
///
/// **BUG THIS CATCHES**: Returning `Clear` to the caller, which would try to
/// open a socket with a method that cannot authenticate.
#[tokio::test]
async fn given_clear_choice_when_interactive_then_wipes_and_asks_again() {
    // GIVEN: A valid persisted session
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("auth"));
    store
        .apply_update(&crate::session_store::CredentialDelta(json!({"me": {"id": "1@s"}})))
        .await
        .unwrap();
    let (mut selector, said) = interactive(store.clone(), &[Some("3"), Some("1")]);

    // WHEN
    let attempt = selector.select().await.unwrap();

    // THEN
    assert_eq!(attempt.method(), AuthMethod::Qr);
    assert!(!store.credentials_path().exists());
    assert_eq!(said.lock().unwrap().as_slice(), ["Stored session cleared."]);
}

#[test]
fn given_menu_answers_when_parsed_then_map_to_methods() {
    assert_eq!(parse_menu_choice(" 1 "), Some(AuthMethod::Qr));
    assert_eq!(parse_menu_choice("Pairing"), Some(AuthMethod::Pairing));
    assert_eq!(parse_menu_choice("3"), Some(AuthMethod::Clear));
    assert_eq!(parse_menu_choice("q"), Some(AuthMethod::Exit));
    assert_eq!(parse_menu_choice("5"), None);
}
