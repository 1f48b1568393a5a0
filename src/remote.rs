//! Execution node abstraction.
//!
//! Provisioning must be able to run on a different machine than the one
//! orchestrating the invocation. [`RemoteExecutionPort`] models that boundary
//! as a request/response exchange of plain serializable messages.
//! [`LocalNode`] is the in-process implementation: it ships the JSON-encoded
//! request to a worker thread over a channel and waits for the JSON reply,
//! checking for cancellation while it waits.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::RsdetectError;
use crate::provision::{self, Downloader, InvocationPrefix, ProvisionRequest, ProvisionResponse};

/// Interval at which blocked callers check for cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Operating system family of an execution node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Unix,
}

impl OsFamily {
    /// The family of the machine this code runs on.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

/// A node that can report its OS family and run provisioning requests.
///
/// Both calls block. Implementations must return [`RsdetectError::Cancelled`]
/// promptly once `cancel` is set, abandoning the pending call.
pub trait RemoteExecutionPort: Send + Sync {
    /// Returns the node's operating system family.
    fn os_family(&self, cancel: &CancellationToken) -> Result<OsFamily, RsdetectError>;

    /// Runs `request` on the node and returns the invocation prefix it produced.
    fn provision(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> Result<InvocationPrefix, RsdetectError>;
}

/// Handles one JSON-encoded request and returns the JSON-encoded reply.
///
/// This is the node-side entry point; it is pure data in, data out.
pub fn handle_request(json: &str, downloader: &dyn Downloader) -> serde_json::Result<String> {
    let response: ProvisionResponse = match serde_json::from_str::<ProvisionRequest>(json) {
        Ok(request) => provision::provision(&request, downloader).into(),
        Err(e) => {
            let error = RsdetectError::Unexpected(format!("malformed request: {}", e));
            Err::<InvocationPrefix, _>(error).into()
        }
    };
    serde_json::to_string(&response)
}

/// Execution node running on this machine.
#[derive(Clone)]
pub struct LocalNode {
    downloader: Arc<dyn Downloader>,
}

impl LocalNode {
    pub fn new(downloader: Arc<dyn Downloader>) -> Self {
        Self { downloader }
    }
}

impl RemoteExecutionPort for LocalNode {
    fn os_family(&self, cancel: &CancellationToken) -> Result<OsFamily, RsdetectError> {
        if cancel.is_cancelled() {
            return Err(RsdetectError::Cancelled);
        }
        Ok(OsFamily::current())
    }

    fn provision(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> Result<InvocationPrefix, RsdetectError> {
        if cancel.is_cancelled() {
            return Err(RsdetectError::Cancelled);
        }

        let json = serde_json::to_string(request)
            .map_err(|e| RsdetectError::Unexpected(format!("failed to encode request: {}", e)))?;

        let (tx, rx) = mpsc::channel();
        let downloader = Arc::clone(&self.downloader);
        thread::Builder::new()
            .name("provision-worker".to_string())
            .spawn(move || {
                // The receiver is gone if the caller was cancelled.
                let _ = tx.send(handle_request(&json, downloader.as_ref()));
            })
            .map_err(|e| {
                RsdetectError::Unexpected(format!("failed to spawn provisioning worker: {}", e))
            })?;

        let reply = loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(reply) => break reply,
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        warn!("cancelling pending provisioning request");
                        return Err(RsdetectError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RsdetectError::Unexpected(
                        "provisioning worker exited without a reply".to_string(),
                    ));
                }
            }
        };

        let reply =
            reply.map_err(|e| RsdetectError::Unexpected(format!("failed to encode reply: {}", e)))?;
        debug!("provisioning reply: {}", reply);
        let response: ProvisionResponse = serde_json::from_str(&reply)
            .map_err(|e| RsdetectError::Unexpected(format!("failed to decode reply: {}", e)))?;
        response.into_result()
    }
}
