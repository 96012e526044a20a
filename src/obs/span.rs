// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome, record_flow_outcome, record_result},
};

/// Future type returned by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future type returned by [`FlowSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// One observed run of a session flow.
///
/// Starting a span counts an attempt; [`FlowSpan::run`] and [`FlowSpan::finish`] count the
/// outcome. With the `tracing` feature the run happens inside a `cooknet_session.flow` span.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at call site `stage` and records the attempt.
	pub fn start(kind: FlowKind, stage: &'static str) -> Self {
		record_flow_outcome(kind, FlowOutcome::Attempt);

		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("cooknet_session.flow", flow = kind.as_str(), stage);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Flow this span observes.
	pub fn kind(&self) -> FlowKind {
		self.kind
	}

	/// Drives `fut` inside the span and records its outcome.
	pub async fn run<Fut, T, E>(self, fut: Fut) -> std::result::Result<T, E>
	where
		Fut: Future<Output = std::result::Result<T, E>>,
	{
		let result = self.instrument(fut).await;

		record_result(self.kind, &result);

		result
	}

	/// Records an outcome computed outside of [`FlowSpan::run`].
	pub fn finish(&self, outcome: FlowOutcome) {
		record_flow_outcome(self.kind, outcome);
	}

	/// Enters the span for a synchronous section.
	pub fn entered(self) -> FlowSpanGuard {
		#[cfg(feature = "tracing")]
		{
			FlowSpanGuard { kind: self.kind, _entered: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			FlowSpanGuard { kind: self.kind }
		}
	}

	/// Attaches the span to `fut` without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Guard returned by [`FlowSpan::entered`]; the span is exited on drop.
pub struct FlowSpanGuard {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	_entered: tracing::span::EnteredSpan,
}
impl FlowSpanGuard {
	/// Records the outcome of the synchronous section.
	pub fn finish<T, E>(&self, result: &std::result::Result<T, E>) {
		record_result(self.kind, result);
	}
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowSpanGuard").field("kind", &self.kind).finish()
	}
}

/// Emits a warning event for the flow (when tracing is enabled).
pub fn flow_warning(kind: FlowKind, message: &str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(flow = kind.as_str(), %error, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, message, error);
	}
}

/// Emits a debug event carrying a token fingerprint, never the token itself.
pub fn flow_debug(kind: FlowKind, message: &str, token_fingerprint: Option<&str>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = kind.as_str(), token = token_fingerprint, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, message, token_fingerprint);
	}
}
