//! Blocking request/reply across the execution-context boundary.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::port::{MessagePort, PortMessage, ReplyPortId};
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

/// Group of calls that can be cancelled together (one per player).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallScope(u64);

impl CallScope {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Per-call settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Overrides the bridge's default wait bound.
    pub timeout: Option<Duration>,
    pub scope: Option<CallScope>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn in_scope(mut self, scope: CallScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

#[derive(Debug)]
enum CallState {
    Waiting,
    Replied(Bytes),
    Cancelled,
}

/// One outstanding request.
///
/// Shared between the waiting thread and whoever delivers the reply, so it
/// lives on the heap until both sides are done with it.
struct PendingCall {
    method: String,
    scope: Option<CallScope>,
    state: Mutex<CallState>,
    ready: Condvar,
}

impl PendingCall {
    fn new(method: &str, scope: Option<CallScope>) -> Self {
        Self {
            method: method.to_string(),
            scope,
            state: Mutex::new(CallState::Waiting),
            ready: Condvar::new(),
        }
    }

    /// Move out of `Waiting`; later transitions are ignored.
    fn complete(&self, outcome: CallState) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, CallState::Waiting) {
            return false;
        }
        *state = outcome;
        self.ready.notify_all();
        true
    }
}

#[derive(Default)]
struct RegistryState {
    calls: HashMap<u64, Arc<PendingCall>>,
    /// Scopes whose calls are refused; entries go away with `forget_scope`.
    cancelled_scopes: HashSet<CallScope>,
}

#[derive(Default)]
struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Record a new call unless its scope has been cancelled. The check and
    /// the insert share one lock so a concurrent `cancel_scope` either sees
    /// the call or makes it refused.
    fn register(&self, call_id: u64, call: &Arc<PendingCall>) -> bool {
        let mut state = self.state.lock();
        if let Some(scope) = call.scope {
            if state.cancelled_scopes.contains(&scope) {
                return false;
            }
        }
        state.calls.insert(call_id, Arc::clone(call));
        true
    }

    fn take(&self, call_id: u64) -> Option<Arc<PendingCall>> {
        self.state.lock().calls.remove(&call_id)
    }

    fn reply(&self, call_id: u64, response: Bytes) -> bool {
        match self.take(call_id) {
            Some(call) => {
                debug!(call_id, method = %call.method, len = response.len(), "Reply received");
                call.complete(CallState::Replied(response))
            }
            None => {
                warn!(call_id, "Reply for unknown or abandoned call");
                false
            }
        }
    }
}

/// Cross-context call bridge.
///
/// A native callback thread calls [`CallBridge::invoke`], which posts a
/// [`PortMessage`] to the application context and parks the thread until the
/// application answers through [`CallBridge::post_reply`] (or a
/// [`ReplyHandle`]), the wait bound expires, or the call is cancelled.
///
/// ```text
/// native thread ──post──> MessagePort ──> application
///       ▲                                      │
///       └──────── post_reply(call_id) <────────┘
/// ```
pub struct CallBridge {
    reply_port: ReplyPortId,
    default_timeout: Duration,
    next_call: AtomicU64,
    next_scope: AtomicU64,
    registry: Arc<Registry>,
}

impl CallBridge {
    pub fn new(reply_port: ReplyPortId, default_timeout: Duration) -> Self {
        Self {
            reply_port,
            default_timeout,
            next_call: AtomicU64::new(1),
            next_scope: AtomicU64::new(1),
            registry: Arc::new(Registry::default()),
        }
    }

    pub fn reply_port(&self) -> ReplyPortId {
        self.reply_port
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn new_scope(&self) -> CallScope {
        CallScope(self.next_scope.fetch_add(1, Ordering::Relaxed))
    }

    /// Post `payload` to `target` and block until the reply arrives.
    ///
    /// An empty reply is returned as-is; callers needing content must check.
    pub fn invoke(
        &self,
        target: &dyn MessagePort,
        method: &str,
        payload: Bytes,
        options: CallOptions,
    ) -> Result<Bytes> {
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let call = Arc::new(PendingCall::new(method, options.scope));
        if !self.registry.register(call_id, &call) {
            return Err(BridgeError::Cancelled(method.to_string()));
        }

        let message = PortMessage {
            reply_port: self.reply_port,
            call_id,
            method: method.to_string(),
            payload,
        };
        debug!(call_id, method, port = %target.describe(), len = message.payload.len(), "Posting call");

        if let Err(e) = target.post(message) {
            self.registry.take(call_id);
            warn!(call_id, method, error = %e, "Post failed");
            return Err(e);
        }

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        self.wait(call_id, &call, timeout)
    }

    fn wait(&self, call_id: u64, call: &PendingCall, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut state = call.state.lock();

        while matches!(*state, CallState::Waiting) {
            if call.ready.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        match std::mem::replace(&mut *state, CallState::Cancelled) {
            CallState::Replied(response) => Ok(response),
            CallState::Cancelled => {
                info!(call_id, method = %call.method, "Call cancelled");
                Err(BridgeError::Cancelled(call.method.clone()))
            }
            CallState::Waiting => {
                drop(state);
                self.registry.take(call_id);
                warn!(call_id, method = %call.method, ?timeout, "Call timed out");
                Err(BridgeError::Timeout {
                    method: call.method.clone(),
                    timeout,
                })
            }
        }
    }

    /// Deliver the reply for `call_id`; returns `false` if nobody waits.
    pub fn post_reply(&self, call_id: u64, response: Bytes) -> bool {
        self.registry.reply(call_id, response)
    }

    /// Handle for the thread that drains the reply port.
    pub fn reply_handle(&self) -> ReplyHandle {
        ReplyHandle {
            registry: Arc::clone(&self.registry),
        }
    }

    /// Abort one outstanding call.
    pub fn cancel(&self, call_id: u64) -> bool {
        self.registry
            .take(call_id)
            .map(|call| call.complete(CallState::Cancelled))
            .unwrap_or(false)
    }

    /// Abort every outstanding call in `scope` and refuse new ones.
    pub fn cancel_scope(&self, scope: CallScope) -> usize {
        let calls: Vec<Arc<PendingCall>> = {
            let mut state = self.registry.state.lock();
            state.cancelled_scopes.insert(scope);
            let ids: Vec<u64> = state
                .calls
                .iter()
                .filter(|(_, call)| call.scope == Some(scope))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| state.calls.remove(&id)).collect()
        };
        let cancelled = calls
            .iter()
            .filter(|call| call.complete(CallState::Cancelled))
            .count();
        if cancelled > 0 {
            info!(scope = scope.id(), cancelled, "Cancelled pending calls");
        }
        cancelled
    }

    /// Drop the cancellation mark of `scope` once nothing can call in it
    /// any more.
    pub fn forget_scope(&self, scope: CallScope) {
        self.registry.state.lock().cancelled_scopes.remove(&scope);
    }

    /// Number of scopes currently refusing calls.
    pub fn cancelled_scope_count(&self) -> usize {
        self.registry.state.lock().cancelled_scopes.len()
    }

    /// Abort every outstanding call.
    pub fn cancel_all(&self) -> usize {
        let calls: Vec<Arc<PendingCall>> = self.registry.state.lock().calls.drain().map(|(_, c)| c).collect();
        calls
            .iter()
            .filter(|call| call.complete(CallState::Cancelled))
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.registry.state.lock().calls.len()
    }
}

impl fmt::Debug for CallBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallBridge")
            .field("reply_port", &self.reply_port)
            .field("default_timeout", &self.default_timeout)
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Reply side of a [`CallBridge`], cheap to clone and move to another thread.
#[derive(Clone)]
pub struct ReplyHandle {
    registry: Arc<Registry>,
}

impl ReplyHandle {
    pub fn post_reply(&self, call_id: u64, response: Bytes) -> bool {
        self.registry.reply(call_id, response)
    }
}

impl fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyHandle").finish_non_exhaustive()
    }
}
