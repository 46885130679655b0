//! An interface for handling completion requests
//!
//! This crate provides a `RequestHandler` trait that decouples the inbound
//! HTTP surface from the model-provider client. A handler answers a request
//! by spawning its own worker and writing exactly one final result into the
//! oneshot sender it is given; the caller keeps the receiving half and
//! decides how long it is willing to wait.

use std::error::Error;
use tokio::sync::oneshot::Sender;

pub trait RequestHandler: Send + Sync {
    /// Run one full assistant cycle (create, poll, extract) for `prompt`.
    ///
    /// This never fails from the caller's point of view: provider failures
    /// are folded into a human-readable string, so the worker always sends a
    /// plain `String`. The only thing the caller has to handle is its own
    /// wait deadline.
    fn answer_request(&self, prompt: &str, result: Sender<String>);

    /// Single-turn completion without any thread context.
    fn single_completion(
        &self,
        message: &str,
        result: Sender<Result<String, Box<dyn Error + Send + Sync>>>,
    );
}
