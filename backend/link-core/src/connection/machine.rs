//! State machine for a single connection attempt.
//!
//! The machine is pure: it takes socket events and deadline expiries and
//! returns the effects the session driver has to carry out. One dispatch
//! function per phase keeps the allowed transitions readable.

use crate::protocol::SocketEvent;
use crate::session_store::CredentialDelta;

use models::{AuthMethod, CloseCause};

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::time::Duration;

use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    /// Socket requested; nothing heard from the auth handshake yet.
    Opening,
    /// A QR payload or pairing readiness was seen.
    Authenticating,
    Open,
    /// Closed or timed out. Every later input is ignored.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No auth activity and no open within the connect timeout.
    Connect,
    /// The QR / pairing window expired without the socket opening.
    AuthWindow,
}

impl Display for TimeoutKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            TimeoutKind::Connect => formatter.write_str("connect timeout"),
            TimeoutKind::AuthWindow => formatter.write_str("authentication window"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEnd {
    Closed(CloseCause),
    TimedOut(TimeoutKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptInput {
    Socket(SocketEvent),
    DeadlineElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEffect {
    PersistCredentials(CredentialDelta),
    ShowQr { payload: String, refresh_index: u32 },
    RequestPairingCode,
    ArmDeadline { kind: TimeoutKind, after: Duration },
    DisarmDeadline,
    MarkConnected,
    Finish(AttemptEnd),
}

#[derive(Debug)]
pub struct AttemptMachine {
    method: AuthMethod,
    connect_timeout: Duration,
    auth_window: Duration,
    phase: AttemptPhase,
    armed: Option<TimeoutKind>,
    qr_refreshes: u32,
    pairing_requested: bool,
    was_open: bool,
}

impl AttemptMachine {
    pub fn new(method: AuthMethod, connect_timeout: Duration, auth_window: Duration) -> Self {
        Self {
            method,
            connect_timeout,
            auth_window,
            phase: AttemptPhase::Opening,
            armed: None,
            qr_refreshes: 0,
            pairing_requested: false,
            was_open: false,
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn was_open(&self) -> bool {
        self.was_open
    }

    pub fn qr_refreshes(&self) -> u32 {
        self.qr_refreshes
    }

    /// Effects to run right after the socket was requested.
    pub fn start(&mut self) -> Vec<AttemptEffect> {
        vec![self.arm(TimeoutKind::Connect)]
    }

    pub fn handle(&mut self, input: AttemptInput) -> Vec<AttemptEffect> {
        trace!("Attempt input in phase {:?}: {:?}", self.phase, input);

        match self.phase {
            AttemptPhase::Opening => self.on_opening(input),
            AttemptPhase::Authenticating => self.on_authenticating(input),
            AttemptPhase::Open => self.on_open(input),
            AttemptPhase::Finished => Vec::new(),
        }
    }

    fn on_opening(&mut self, input: AttemptInput) -> Vec<AttemptEffect> {
        match input {
            AttemptInput::Socket(SocketEvent::CredentialsUpdated(delta)) => {
                vec![AttemptEffect::PersistCredentials(delta)]
            }
            AttemptInput::Socket(SocketEvent::Connecting) => {
                debug!("Socket connecting");
                Vec::new()
            }
            AttemptInput::Socket(SocketEvent::Qr(payload)) => {
                let mut effects = self.begin_authenticating();
                effects.extend(self.on_qr(payload));
                effects
            }
            AttemptInput::Socket(SocketEvent::PairingReady) => {
                let mut effects = self.begin_authenticating();
                effects.extend(self.request_pairing_once());
                effects
            }
            AttemptInput::Socket(SocketEvent::Open) => self.open(),
            AttemptInput::Socket(SocketEvent::Close(cause)) => {
                self.finish(AttemptEnd::Closed(cause))
            }
            AttemptInput::DeadlineElapsed => self.expire(),
        }
    }

    fn on_authenticating(&mut self, input: AttemptInput) -> Vec<AttemptEffect> {
        match input {
            AttemptInput::Socket(SocketEvent::CredentialsUpdated(delta)) => {
                vec![AttemptEffect::PersistCredentials(delta)]
            }
            AttemptInput::Socket(SocketEvent::Connecting) => Vec::new(),
            AttemptInput::Socket(SocketEvent::Qr(payload)) => self.on_qr(payload),
            AttemptInput::Socket(SocketEvent::PairingReady) => self.request_pairing_once(),
            AttemptInput::Socket(SocketEvent::Open) => self.open(),
            AttemptInput::Socket(SocketEvent::Close(cause)) => {
                self.finish(AttemptEnd::Closed(cause))
            }
            AttemptInput::DeadlineElapsed => self.expire(),
        }
    }

    fn on_open(&mut self, input: AttemptInput) -> Vec<AttemptEffect> {
        match input {
            AttemptInput::Socket(SocketEvent::CredentialsUpdated(delta)) => {
                vec![AttemptEffect::PersistCredentials(delta)]
            }
            AttemptInput::Socket(SocketEvent::Close(cause)) => {
                self.finish(AttemptEnd::Closed(cause))
            }
            AttemptInput::Socket(other) => {
                debug!("Ignoring {other:?} on an open socket");
                Vec::new()
            }
            AttemptInput::DeadlineElapsed => Vec::new(),
        }
    }

    fn on_qr(&mut self, payload: String) -> Vec<AttemptEffect> {
        self.qr_refreshes = self.qr_refreshes.saturating_add(1);

        if self.method == AuthMethod::Pairing {
            return self.request_pairing_once();
        }

        vec![AttemptEffect::ShowQr {
            payload,
            refresh_index: self.qr_refreshes,
        }]
    }

    fn request_pairing_once(&mut self) -> Vec<AttemptEffect> {
        if self.method != AuthMethod::Pairing || self.pairing_requested {
            return Vec::new();
        }
        self.pairing_requested = true;
        vec![AttemptEffect::RequestPairingCode]
    }

    fn begin_authenticating(&mut self) -> Vec<AttemptEffect> {
        self.phase = AttemptPhase::Authenticating;
        vec![self.arm(TimeoutKind::AuthWindow)]
    }

    fn open(&mut self) -> Vec<AttemptEffect> {
        self.phase = AttemptPhase::Open;
        self.was_open = true;
        self.armed = None;
        vec![AttemptEffect::DisarmDeadline, AttemptEffect::MarkConnected]
    }

    fn expire(&mut self) -> Vec<AttemptEffect> {
        let kind = self.armed.unwrap_or(TimeoutKind::Connect);
        self.finish(AttemptEnd::TimedOut(kind))
    }

    fn finish(&mut self, end: AttemptEnd) -> Vec<AttemptEffect> {
        self.phase = AttemptPhase::Finished;
        self.armed = None;
        vec![AttemptEffect::DisarmDeadline, AttemptEffect::Finish(end)]
    }

    fn arm(&mut self, kind: TimeoutKind) -> AttemptEffect {
        self.armed = Some(kind);
        let after = match kind {
            TimeoutKind::Connect => self.connect_timeout,
            TimeoutKind::AuthWindow => self.auth_window,
        };
        AttemptEffect::ArmDeadline { kind, after }
    }
}
