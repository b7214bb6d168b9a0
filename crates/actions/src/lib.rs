//! `actions` crate: the `ActionExecutor` trait and its implementations.
//!
//! Every task attached to a workflow node is carried out by an
//! [`ActionExecutor`]: the engine hands it a method, an action identifier and
//! a JSON parameter payload and gets back a status code and a body.

pub mod error;
pub mod traits;
pub mod http;
pub mod mock;

pub use error::ActionError;
pub use http::HttpActionExecutor;
pub use traits::{ActionExecutor, ActionRequest, ActionResponse, HttpMethod};
