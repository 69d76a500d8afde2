//! Recording session lifecycle: states, controller and error taxonomy.

pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionError};
pub use state::{SessionSnapshot, SessionState};
