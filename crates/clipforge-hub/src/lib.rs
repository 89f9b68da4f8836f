//! The Clipforge progress hub.
//!
//! Owns long-lived job records and fans progress events out to any number
//! of attached listeners. Listener sets mutate only under the job's lock;
//! a slow or dead handle is detached without disturbing the others, and
//! terminal events close every stream.

mod error;
mod hub;

pub use error::{HubError, HubResult};
pub use hub::{ProgressHub, LISTENER_BUFFER};
