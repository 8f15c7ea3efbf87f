//! View-state machine and command handlers.
//!
//! Transitions:
//!
//! | from              | command            | to (success)    | effects           |
//! |-------------------|--------------------|-----------------|-------------------|
//! | (construction)    | restore            | by session      | refresh if logged in |
//! | `Unauthenticated` | `submit_auth`      | `AwaitingInput` | refresh history   |
//! | `Unauthenticated` | `toggle_auth_mode` | `Unauthenticated` | none            |
//! | `AwaitingInput`   | `submit_analysis`  | `Presenting`    | refresh history   |
//! | `Presenting`      | `request_another`  | `AwaitingInput` | none              |
//! | any               | `logout`           | `Unauthenticated` | none            |
//!
//! Failed commands leave the view where it was and record the error text.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use shared::domain::{AnalysisResult, AuthMode, HistoryEntry};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    error::{
        display_message, CommandError, ANALYSIS_FALLBACK, AUTH_FALLBACK, HISTORY_FALLBACK,
        MISSING_MEDIA_MESSAGE,
    },
    remote::{MediaFile, RemoteService},
    session::SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Unauthenticated,
    AwaitingInput,
    Presenting,
}

/// Work the state machine asks for after a transition settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RefreshHistory { identity: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Restored,
    Authenticated,
    Analyzed,
}

fn effects_for(transition: Transition, identity: &str) -> Vec<Effect> {
    if identity.is_empty() {
        return Vec::new();
    }
    match transition {
        Transition::Restored | Transition::Authenticated | Transition::Analyzed => {
            vec![Effect::RefreshHistory {
                identity: identity.to_string(),
            }]
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub view: View,
    pub auth_mode: AuthMode,
    pub loading: bool,
    pub error: Option<String>,
    pub analysis: Option<AnalysisResult>,
    pub history: Vec<HistoryEntry>,
    pub identity: String,
}

struct ControllerState {
    view: View,
    auth_mode: AuthMode,
    loading: bool,
    error: Option<String>,
    analysis: Option<AnalysisResult>,
    history: Vec<HistoryEntry>,
    /// Bumped on every login and logout.
    session_generation: u64,
    refresh_issued: u64,
    refresh_applied: u64,
}

#[derive(Debug, Clone, Copy)]
struct RefreshTicket {
    generation: u64,
    sequence: u64,
}

/// Keeps `loading` set for exactly one in-flight command.
///
/// Settling clears the flag under the caller's lock; if the command future
/// is dropped before it settles, dropping the guard clears it instead.
struct LoadingGuard<'a> {
    cell: &'a Mutex<ControllerState>,
    settled: bool,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(cell: &'a Mutex<ControllerState>, state: &mut ControllerState) -> Self {
        state.loading = true;
        state.error = None;
        Self {
            cell,
            settled: false,
        }
    }

    fn settle(mut self, state: &mut ControllerState) {
        state.loading = false;
        self.settled = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            lock_state(self.cell).loading = false;
        }
    }
}

fn lock_state(cell: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ViewController {
    remote: Arc<dyn RemoteService>,
    session: Arc<dyn SessionStore>,
    state: Mutex<ControllerState>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ViewController {
    /// Seeds the initial view from the persisted session.
    pub fn new(remote: Arc<dyn RemoteService>, session: Arc<dyn SessionStore>) -> Arc<Self> {
        let view = if session.get().is_empty() {
            View::Unauthenticated
        } else {
            View::AwaitingInput
        };
        Arc::new(Self {
            remote,
            session,
            state: Mutex::new(ControllerState {
                view,
                auth_mode: AuthMode::Login,
                loading: false,
                error: None,
                analysis: None,
                history: Vec::new(),
                session_generation: 0,
                refresh_issued: 0,
                refresh_applied: 0,
            }),
            background: Mutex::new(Vec::new()),
        })
    }

    /// Issues the startup effects for a restored session. Must run inside a
    /// tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let (identity, generation) = self.current_session();
        if !identity.is_empty() {
            info!(user_id = %identity, "session: restored persisted identity");
        }
        self.dispatch(effects_for(Transition::Restored, &identity), generation);
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.lock();
        ViewSnapshot {
            view: state.view,
            auth_mode: state.auth_mode,
            loading: state.loading,
            error: state.error.clone(),
            analysis: state.analysis.clone(),
            history: state.history.clone(),
            identity: self.session.get(),
        }
    }

    pub fn view(&self) -> View {
        self.lock().view
    }

    pub fn toggle_auth_mode(&self) -> Result<AuthMode, CommandError> {
        let mut state = self.lock();
        if state.view != View::Unauthenticated {
            return Err(CommandError::InvalidState {
                command: "toggle_auth_mode",
                state: state.view,
            });
        }
        state.auth_mode = state.auth_mode.toggled();
        state.error = None;
        Ok(state.auth_mode)
    }

    pub async fn submit_auth(
        self: &Arc<Self>,
        username: &str,
        password: &str,
    ) -> Result<(), CommandError> {
        let (mode, generation, loading) = {
            let mut state = self.lock();
            if state.view != View::Unauthenticated {
                return Err(CommandError::InvalidState {
                    command: "submit_auth",
                    state: state.view,
                });
            }
            let loading = LoadingGuard::acquire(&self.state, &mut state);
            (state.auth_mode, state.session_generation, loading)
        };

        info!(mode = mode.endpoint(), username, "auth: submitting credentials");
        let outcome = self.remote.authenticate(mode, username, password).await;

        let (effects, settled_generation) = {
            let mut state = self.lock();
            loading.settle(&mut state);
            if state.session_generation != generation {
                debug!("auth: session changed while in flight; dropping outcome");
                return Err(CommandError::Superseded {
                    command: "submit_auth",
                });
            }
            match outcome {
                Ok(identity) if identity.trim().is_empty() => {
                    warn!("auth: service returned an empty user id");
                    state.error = Some(AUTH_FALLBACK.to_string());
                    return Err(CommandError::Auth(AUTH_FALLBACK.to_string()));
                }
                Ok(identity) => {
                    self.session.set(&identity);
                    state.session_generation += 1;
                    state.view = View::AwaitingInput;
                    info!(user_id = %identity, "auth: session established");
                    (
                        effects_for(Transition::Authenticated, &identity),
                        state.session_generation,
                    )
                }
                Err(failure) => {
                    let message = display_message(&failure, AUTH_FALLBACK);
                    warn!(status = ?failure.status, error = %message, "auth: request failed");
                    state.error = Some(message.clone());
                    return Err(CommandError::Auth(message));
                }
            }
        };

        self.dispatch(effects, settled_generation);
        Ok(())
    }

    /// Uploads `media` for the current identity. A missing file is rejected
    /// with `Validation` from any view, before the view check and before any
    /// remote call.
    pub async fn submit_analysis(
        self: &Arc<Self>,
        media: Option<MediaFile>,
    ) -> Result<AnalysisResult, CommandError> {
        let (media, identity, generation, loading) = {
            let mut state = self.lock();
            let Some(media) = media else {
                state.error = Some(MISSING_MEDIA_MESSAGE.to_string());
                return Err(CommandError::Validation(MISSING_MEDIA_MESSAGE.to_string()));
            };
            if state.view != View::AwaitingInput {
                return Err(CommandError::InvalidState {
                    command: "submit_analysis",
                    state: state.view,
                });
            }
            let loading = LoadingGuard::acquire(&self.state, &mut state);
            (media, self.session.get(), state.session_generation, loading)
        };

        info!(
            user_id = %identity,
            filename = %media.filename,
            size_bytes = media.bytes.len(),
            "analysis: submitting media"
        );
        let outcome = self.remote.submit_for_analysis(&identity, media).await;

        let (result, effects) = {
            let mut state = self.lock();
            loading.settle(&mut state);
            if state.session_generation != generation {
                debug!("analysis: session changed while in flight; dropping outcome");
                return Err(CommandError::Superseded {
                    command: "submit_analysis",
                });
            }
            match outcome {
                Ok(result) => {
                    info!(clarity_index = result.clarity_index, "analysis: report received");
                    state.analysis = Some(result.clone());
                    state.view = View::Presenting;
                    (result, effects_for(Transition::Analyzed, &identity))
                }
                Err(failure) => {
                    let message = display_message(&failure, ANALYSIS_FALLBACK);
                    warn!(status = ?failure.status, error = %message, "analysis: request failed");
                    state.error = Some(message.clone());
                    return Err(CommandError::Analysis(message));
                }
            }
        };

        self.dispatch(effects, generation);
        Ok(result)
    }

    pub fn request_another(&self) -> Result<(), CommandError> {
        let mut state = self.lock();
        if state.view != View::Presenting {
            return Err(CommandError::InvalidState {
                command: "request_another",
                state: state.view,
            });
        }
        state.analysis = None;
        state.error = None;
        state.view = View::AwaitingInput;
        Ok(())
    }

    /// Ends the session from any view. Idempotent.
    pub fn logout(&self) {
        let mut state = self.lock();
        // Under the lock so an auth settle cannot persist after the clear.
        self.session.clear();
        state.session_generation += 1;
        state.view = View::Unauthenticated;
        state.analysis = None;
        state.history.clear();
        state.error = None;
        info!("session: logged out");
    }

    /// Refreshes history for the current identity and waits for it. Failures
    /// are logged and leave the previous entries in place.
    pub async fn refresh_history(&self) {
        let (identity, generation) = self.current_session();
        if identity.is_empty() {
            debug!("history: no session; skipping refresh");
            return;
        }
        let ticket = self.issue_refresh_ticket(generation);
        self.run_refresh(&identity, ticket).await;
    }

    /// Waits for every background effect issued so far.
    pub async fn settle_background(&self) {
        let handles = std::mem::take(
            &mut *self
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for joined in join_all(handles).await {
            if let Err(err) = joined {
                warn!(error = %err, "background effect terminated abnormally");
            }
        }
    }

    /// Spawns `effects` on behalf of the session `generation` they were
    /// derived from. A logout in between makes their results stale.
    fn dispatch(self: &Arc<Self>, effects: Vec<Effect>, generation: u64) {
        for effect in effects {
            let controller = Arc::clone(self);
            let handle = match effect {
                Effect::RefreshHistory { identity } => {
                    let ticket = self.issue_refresh_ticket(generation);
                    tokio::spawn(async move { controller.run_refresh(&identity, ticket).await })
                }
            };
            let mut background = self
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            background.retain(|handle| !handle.is_finished());
            background.push(handle);
        }
    }

    fn current_session(&self) -> (String, u64) {
        let state = self.lock();
        (self.session.get(), state.session_generation)
    }

    fn issue_refresh_ticket(&self, generation: u64) -> RefreshTicket {
        let mut state = self.lock();
        state.refresh_issued += 1;
        RefreshTicket {
            generation,
            sequence: state.refresh_issued,
        }
    }

    async fn run_refresh(&self, identity: &str, ticket: RefreshTicket) {
        match self.remote.fetch_history(identity).await {
            Ok(history) => {
                let mut state = self.lock();
                if ticket.generation != state.session_generation {
                    debug!(user_id = identity, "history: session changed; discarding refresh");
                    return;
                }
                if ticket.sequence <= state.refresh_applied {
                    debug!(
                        user_id = identity,
                        sequence = ticket.sequence,
                        "history: newer refresh already applied; discarding"
                    );
                    return;
                }
                state.refresh_applied = ticket.sequence;
                debug!(user_id = identity, entries = history.len(), "history: refreshed");
                state.history = history;
            }
            Err(failure) => {
                let err = CommandError::HistoryFetch(display_message(&failure, HISTORY_FALLBACK));
                warn!(user_id = identity, error = %err, "history: refresh failed; keeping previous entries");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        lock_state(&self.state)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
