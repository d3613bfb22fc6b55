//! Session state: the per-account profile record and the unattended login
//! driver that authenticates it.

pub mod forms;
pub mod login;
pub mod profile;

pub use login::{LoginDriver, LoginState};
pub use profile::{SessionHandle, SessionProfile};
