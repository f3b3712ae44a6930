//! Optional observability helpers for credential stages.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `service_account_auth.stage` with the `kind`
//!   (lifecycle stage) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `service_account_auth_stage_total` counter for every
//!   attempt/success/failure, labeled by `kind` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Credential lifecycle stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
	/// Credential document discovery.
	Discovery,
	/// Self-signed assertion acquisition.
	SelfSigned,
	/// Token endpoint exchange.
	Exchange,
	/// Request metadata augmentation.
	Apply,
}
impl StageKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageKind::Discovery => "discovery",
			StageKind::SelfSigned => "self_signed",
			StageKind::Exchange => "exchange",
			StageKind::Apply => "apply",
		}
	}
}
impl Display for StageKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a credential stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
