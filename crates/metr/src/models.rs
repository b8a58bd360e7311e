//! Records exchanged with the search backend and kept by the chat view.
//!
//! The backend owns conversations; the client only ever holds the id of the
//! active one plus a local, display-oriented copy of its messages.
pub mod conversation;
pub mod location;
pub mod message;
