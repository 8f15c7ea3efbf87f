//! Client-side session and workflow core for the meeting clarity service.
//!
//! [`ViewController`] owns the view-state machine and sequences the three
//! remote operations (authenticate, analyze, fetch history) against a
//! [`RemoteService`], persisting the session identity through a
//! [`SessionStore`].

pub mod controller;
pub mod error;
pub mod remote;
pub mod session;

pub use controller::{Effect, View, ViewController, ViewSnapshot};
pub use error::{display_message, CommandError, RemoteFailure};
pub use remote::{HttpRemoteService, MediaFile, RemoteService, DEFAULT_API_BASE_URL};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
