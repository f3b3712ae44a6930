// self
use crate::obs::{StageKind, StageOutcome};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_outcome(kind: StageKind, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"service_account_auth_stage_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
