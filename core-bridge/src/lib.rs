//! # Cross-Context Call Bridge
//!
//! Lets a native callback thread obtain a value computed in the embedding
//! application's execution context, which it cannot call into directly.
//!
//! The request is posted through a [`MessagePort`](bridge_traits::MessagePort);
//! the calling thread then waits, with a bound, until the reply is delivered
//! back by call id. Calls can be grouped in a [`CallScope`] so that a player
//! being disposed can release every native thread still waiting on its
//! behalf.
//!
//! ```ignore
//! let bridge = CallBridge::new(ReplyPortId(port), Duration::from_secs(30));
//! let scope = bridge.new_scope();
//!
//! // native thread
//! let license = bridge.invoke(&app_port, "onLicenseChallenge", challenge,
//!     CallOptions::default().in_scope(scope))?;
//!
//! // reply port thread
//! bridge.post_reply(call_id, response);
//! ```

pub mod call;

pub use call::{CallBridge, CallOptions, CallScope, ReplyHandle};
