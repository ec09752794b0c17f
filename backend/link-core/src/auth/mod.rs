//! Authentication method selection.
//!
//! Runs whenever there is no usable persisted session or a re-auth was
//! requested. On a terminal the operator picks from a fixed menu; without a
//! terminal the selector never blocks and falls back to QR (or to pairing,
//! when the environment asks for it explicitly).

pub mod phone;
pub mod prompt;

pub use phone::normalize_phone_number;
pub use prompt::{Prompter, StdinPrompter, stdin_is_interactive};

use crate::config::AuthPreferences;
use crate::error::auth::AuthError;
use crate::session_store::SessionStore;

use models::{AuthAttempt, AuthMethod};

use log::{debug, info, warn};

const MENU: &str = "\
No usable session found. Choose how to link this device:
  1) Scan a QR code
  2) Enter a pairing code on your phone
  3) Clear stored session and check again
  4) Exit
> ";

const PHONE_QUESTION: &str =
    "Phone number in international format, e.g. +14155551234 (empty to go back): ";

/// Where the selector is in its conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPhase {
    Idle,
    PresentingMenu,
    CollectingPhone,
    Resolved,
}

/// How the selector obtains a decision.
pub enum SelectorMode {
    Interactive(Box<dyn Prompter>),
    NonInteractive(AuthPreferences),
}

pub struct AuthMethodSelector {
    store: SessionStore,
    mode: SelectorMode,
    phase: SelectorPhase,
}

impl AuthMethodSelector {
    pub fn new(store: SessionStore, mode: SelectorMode) -> Self {
        Self {
            store,
            mode,
            phase: SelectorPhase::Idle,
        }
    }

    /// Interactive when stdin is a terminal, otherwise headless with `preferences`.
    pub fn detect(store: SessionStore, preferences: AuthPreferences) -> Self {
        let mode = if stdin_is_interactive() {
            SelectorMode::Interactive(Box::new(StdinPrompter::new()))
        } else {
            SelectorMode::NonInteractive(preferences)
        };
        Self::new(store, mode)
    }

    pub fn phase(&self) -> SelectorPhase {
        self.phase
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.mode, SelectorMode::Interactive(_))
    }

    /// Resolve one authentication attempt.
    ///
    /// Never returns `Clear`: clearing happens here and the choice is asked
    /// again. May return `Exit`.
    pub async fn select(&mut self) -> Result<AuthAttempt, AuthError> {
        self.phase = SelectorPhase::Idle;

        let attempt = match &mut self.mode {
            SelectorMode::NonInteractive(preferences) => resolve_headless(preferences)?,
            SelectorMode::Interactive(prompter) => {
                resolve_interactive(prompter.as_mut(), &self.store, &mut self.phase).await?
            }
        };

        self.phase = SelectorPhase::Resolved;
        info!("Authentication method resolved: {}", attempt.method());
        Ok(attempt)
    }
}

fn resolve_headless(preferences: &AuthPreferences) -> Result<AuthAttempt, AuthError> {
    match preferences.preferred_method {
        Some(AuthMethod::Pairing) => {
            let raw = preferences.phone_number.as_deref().ok_or_else(|| {
                AuthError::validation("Pairing was requested but no phone number is configured")
            })?;
            Ok(AuthAttempt::pairing(normalize_phone_number(raw)?))
        }
        _ => {
            warn!("No terminal attached; defaulting to QR authentication");
            Ok(AuthAttempt::qr())
        }
    }
}

async fn resolve_interactive(
    prompter: &mut dyn Prompter,
    store: &SessionStore,
    phase: &mut SelectorPhase,
) -> Result<AuthAttempt, AuthError> {
    loop {
        *phase = SelectorPhase::PresentingMenu;

        let Some(answer) = prompter.ask(MENU).await? else {
            warn!("Input closed while choosing an auth method; defaulting to QR");
            return Ok(AuthAttempt::qr());
        };

        match parse_menu_choice(&answer) {
            Some(AuthMethod::Qr) => return Ok(AuthAttempt::qr()),
            Some(AuthMethod::Pairing) => {
                *phase = SelectorPhase::CollectingPhone;
                if let Some(attempt) = collect_phone(prompter).await? {
                    return Ok(attempt);
                }
            }
            Some(AuthMethod::Clear) => {
                store.clear().await?;
                prompter.say("Stored session cleared.").await?;
                if store.has_session().await {
                    return Ok(AuthAttempt::reuse());
                }
            }
            Some(AuthMethod::Exit) => return Ok(AuthAttempt::exit()),
            Some(AuthMethod::Reuse) | None => {
                debug!("Unrecognized menu answer: {answer:?}");
                prompter.say("Please answer 1, 2, 3 or 4.").await?;
            }
        }
    }
}

/// `Ok(None)` sends the operator back to the menu.
async fn collect_phone(prompter: &mut dyn Prompter) -> Result<Option<AuthAttempt>, AuthError> {
    loop {
        let Some(answer) = prompter.ask(PHONE_QUESTION).await? else {
            warn!("Input closed while reading a phone number; defaulting to QR");
            return Ok(Some(AuthAttempt::qr()));
        };

        if answer.trim().is_empty() {
            return Ok(None);
        }

        match normalize_phone_number(&answer) {
            Ok(phone) => return Ok(Some(AuthAttempt::pairing(phone))),
            Err(AuthError::Validation { message, .. }) => {
                prompter.say(&format!("Invalid phone number: {message}")).await?;
            }
            Err(other) => return Err(other),
        }
    }
}

pub(crate) fn parse_menu_choice(answer: &str) -> Option<AuthMethod> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "1" | "qr" => Some(AuthMethod::Qr),
        "2" | "pairing" | "pair" | "code" => Some(AuthMethod::Pairing),
        "3" | "clear" => Some(AuthMethod::Clear),
        "4" | "exit" | "quit" | "q" => Some(AuthMethod::Exit),
        _ => None,
    }
}
