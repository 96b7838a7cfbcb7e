//! Pure content rules: who may do what to a post, who may see it, how RSVP
//! requests resolve, and how feed pages are bounded.
//!
//! Nothing here touches storage. Callers resolve a [`Viewer`] once per request
//! and hand it to these checks alongside the rows they loaded.

pub mod capability;
pub mod content;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod rsvp;
pub mod visibility;

pub use capability::Viewer;
pub use error::{Error, Result};
pub use visibility::{AudienceFacts, View};
