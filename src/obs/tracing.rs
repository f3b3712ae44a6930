// self
use crate::{_prelude::*, obs::StageKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by credential stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage kind + call site.
	pub fn new(kind: StageKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("service_account_auth.stage", kind = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> StageSpanGuard {
		#[cfg(feature = "tracing")]
		{
			StageSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			StageSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`StageSpan::entered`].
pub struct StageSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for StageSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StageSpanGuard(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn stage_span_noop_without_tracing() {
		let _guard = StageSpan::new(StageKind::Apply, "test").entered();
		// Compile-time smoke test ensures the guard exists even when tracing is disabled.
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = StageSpan::new(StageKind::Exchange, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
