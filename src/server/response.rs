use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

/// How the response is to be completed, beyond plain body output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Server-side forward to another resource.
    Forward { path: String },
    /// Client redirect.
    Redirect { url: String, permanent: bool },
    /// Error page / structured error with a status and message.
    Error { status: u16, message: String },
}

#[derive(Debug, Default)]
struct ResponseState {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    committed: bool,
    disposition: Option<Disposition>,
}

/// Cheap-to-clone handle over the response being produced for one request.
///
/// Mirrors the minimum contract the dispatch core needs from a container
/// response: set status and headers, write a body, forward or redirect, and
/// send an error with status and message. Once committed, further mutation
/// is ignored with a warning (matching container semantics where a flushed
/// response cannot be rewritten).
#[derive(Clone, Default)]
pub struct Response {
    inner: Arc<Mutex<ResponseState>>,
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        let state = self.state();
        if state.status == 0 {
            200
        } else {
            state.status
        }
    }

    pub fn set_status(&self, status: u16) {
        let mut state = self.state();
        if state.committed {
            warn!(status, "Ignoring status change on committed response");
            return;
        }
        state.status = status;
    }

    pub fn set_header(&self, name: &str, value: &str) {
        let mut state = self.state();
        if state.committed {
            warn!(header = name, "Ignoring header change on committed response");
            return;
        }
        state.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        state.headers.push((name.to_string(), value.to_string()));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.state()
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Append body bytes. Writing commits the response.
    pub fn write(&self, bytes: &[u8]) {
        let mut state = self.state();
        state.body.extend_from_slice(bytes);
        state.committed = true;
    }

    /// Record a server-side forward. No-op with a warning if committed.
    pub fn forward(&self, path: &str) {
        let mut state = self.state();
        if state.committed {
            warn!(path, "Ignoring forward on committed response");
            return;
        }
        state.disposition = Some(Disposition::Forward {
            path: path.to_string(),
        });
        state.committed = true;
        debug!(path, "Response forwarded");
    }

    /// Record a client redirect. No-op with a warning if committed.
    pub fn redirect(&self, url: &str, permanent: bool) {
        let mut state = self.state();
        if state.committed {
            warn!(url, "Ignoring redirect on committed response");
            return;
        }
        state.status = if permanent { 301 } else { 302 };
        state.disposition = Some(Disposition::Redirect {
            url: url.to_string(),
            permanent,
        });
        state.committed = true;
        debug!(url, permanent, "Response redirected");
    }

    /// Send an error with status and message. No-op with a warning if the
    /// response is already committed.
    pub fn send_error(&self, status: u16, message: &str) {
        let mut state = self.state();
        if state.committed {
            warn!(status, message, "Ignoring send_error on committed response");
            return;
        }
        state.status = status;
        state.disposition = Some(Disposition::Error {
            status,
            message: message.to_string(),
        });
        state.committed = true;
        debug!(status, message, "Error sent on response");
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state().committed
    }

    #[must_use]
    pub fn disposition(&self) -> Option<Disposition> {
        self.state().disposition.clone()
    }

    /// The accumulated body as UTF-8 (lossy), for assertions and logging.
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.state().body).into_owned()
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Response")
            .field("status", &state.status)
            .field("committed", &state.committed)
            .field("disposition", &state.disposition)
            .field("body_len", &state.body.len())
            .finish()
    }
}
