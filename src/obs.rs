//! Flow-level observability.
//!
//! Every session flow opens a [`FlowSpan`], which counts the attempt and, once the flow settles,
//! its outcome. Both sinks are feature-gated and compile to no-ops otherwise:
//!
//! - `tracing`: spans named `cooknet_session.flow` with `flow` and `stage` fields, warning events
//!   when credentials are dropped, and debug events carrying token fingerprints.
//! - `metrics`: the `cooknet_session_flow_total` counter labeled by `flow` and `outcome`.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Session flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Startup validation of stored credentials.
	Bootstrap,
	/// Email/password login.
	Login,
	/// Third-party identity login.
	IdentityLogin,
	/// Account registration.
	Register,
	/// Token rotation.
	Refresh,
	/// Intercepted API request.
	Request,
	/// Local credential removal.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Bootstrap => "bootstrap",
			FlowKind::Login => "login",
			FlowKind::IdentityLogin => "identity_login",
			FlowKind::Register => "register",
			FlowKind::Refresh => "refresh",
			FlowKind::Request => "request",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a session helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
