//! Single-flight token rotation.
//!
//! Every caller that observes a rejected access token funnels through
//! [`RefreshCoordinator::refresh`]. Requests are serialized behind one async guard; once a waiter
//! holds the guard it re-reads the [`TokenStore`], and when the stored access token no longer
//! matches the one that was rejected, the rotation performed by the previous holder is reused
//! without touching the network. Failed rotations clear the stored pair so the session falls back
//! to an anonymous state. A rotated pair is written only while the refresh token it replaced is
//! still stored, so a logout or login completing mid-flight always wins.

mod metrics;

pub use metrics::{RefreshMetrics, RefreshStats};

// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenPair, TokenSecret},
	client::{self, ApiRequest, ApiResponse},
	descriptor::ApiDescriptor,
	http::ApiHttpClient,
	obs::{self, FlowKind, FlowSpan},
	store::{CompareAndSwapOutcome, TokenStore},
};

/// Parameters for a refresh request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshRequest {
	/// Access token the backend rejected, if the request carried one.
	pub rejected: Option<TokenSecret>,
	/// Rotates even when the stored access token already differs from `rejected`.
	pub force: bool,
}
impl RefreshRequest {
	/// Builds a request on behalf of a call that presented `rejected` and received `401`.
	pub fn after_rejection(rejected: Option<TokenSecret>) -> Self {
		Self { rejected, force: false }
	}

	/// Forces a network rotation regardless of the stored state.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Returns `true` when `current` shows that another caller already rotated the pair.
	pub fn already_rotated(&self, current: Option<&TokenSecret>) -> bool {
		if self.force {
			return false;
		}

		match current {
			Some(current) => self.rejected.as_ref() != Some(current),
			None => false,
		}
	}
}

/// Owns the refresh endpoint call and its single-flight guard.
pub struct RefreshCoordinator<C>
where
	C: ApiHttpClient,
{
	http_client: Arc<C>,
	descriptor: Arc<ApiDescriptor>,
	tokens: TokenStore,
	guard: AsyncMutex<()>,
	metrics: RefreshMetrics,
}
impl<C> RefreshCoordinator<C>
where
	C: ApiHttpClient,
{
	/// Creates a coordinator bound to one transport, backend, and token store.
	pub fn new(http_client: Arc<C>, descriptor: Arc<ApiDescriptor>, tokens: TokenStore) -> Self {
		Self {
			http_client,
			descriptor,
			tokens,
			guard: AsyncMutex::new(()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Obtains a fresh pair, reusing a concurrent rotation when one already landed.
	pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPair> {
		self.metrics.bump_attempts();

		let result = FlowSpan::start(FlowKind::Refresh, "refresh")
			.run(self.refresh_single_flight(request))
			.await;

		if result.is_err() {
			self.metrics.bump_failures();
		}

		result
	}

	async fn refresh_single_flight(&self, request: RefreshRequest) -> Result<TokenPair> {
		let _singleflight = self.guard.lock().await;

		if let Some(pair) =
			self.tokens.read()?.filter(|pair| request.already_rotated(Some(&pair.access)))
		{
			self.metrics.bump_coalesced();
			obs::flow_debug(
				FlowKind::Refresh,
				"Reusing a rotation completed by a concurrent caller.",
				Some(pair.access.fingerprint().as_str()),
			);

			return Ok(pair);
		}

		let Some(refresh) = self.tokens.refresh_token()? else {
			self.discard(None);

			return Err(Error::NoRefreshToken);
		};

		match self.rotate(&refresh).await {
			Ok(pair) => {
				self.metrics.bump_rotations();
				obs::flow_debug(
					FlowKind::Refresh,
					"Rotated token pair.",
					Some(pair.access.fingerprint().as_str()),
				);

				Ok(pair)
			},
			Err(err) => {
				let status = err.status();

				if err.is_superseded() {
					obs::flow_debug(
						FlowKind::Refresh,
						"Discarding a rotation superseded by newer credentials.",
						None,
					);
				} else {
					self.discard(Some(&refresh));
					obs::flow_warning(FlowKind::Refresh, "Token refresh failed.", &err);
				}

				Err(Error::RefreshFailed { status, source: Box::new(err) })
			},
		}
	}

	async fn rotate(&self, refresh: &TokenSecret) -> Result<TokenPair> {
		let request = ApiRequest::post(self.descriptor.endpoints.refresh.as_str())
			.json(serde_json::json!({}))
			.bearer(refresh.clone());
		let (reply, _) =
			client::execute(self.http_client.as_ref(), &self.descriptor, &self.tokens, &request)
				.await?;
		let grant: TokenGrant = ApiResponse::from_reply(reply)?.json()?;
		let (pair, _) = grant.into_parts();

		if !pair.is_usable() {
			return Err(Error::InvalidInput {
				reason: "refresh response carried a blank token".into(),
			});
		}

		match self.tokens.compare_and_swap_refresh(refresh, &pair)? {
			CompareAndSwapOutcome::Updated => Ok(pair),
			outcome => Err(Error::CredentialsReplaced { outcome }),
		}
	}

	/// Drops the credentials a failed refresh was working from, unless a login replaced them.
	fn discard(&self, sent: Option<&TokenSecret>) {
		match self.tokens.clear_if_refresh(sent) {
			Ok(CompareAndSwapOutcome::RefreshMismatch) => obs::flow_debug(
				FlowKind::Refresh,
				"Keeping credentials stored after the refresh started.",
				None,
			),
			Ok(_) => {},
			Err(e) =>
				obs::flow_warning(FlowKind::Refresh, "Failed to clear rejected credentials.", &e),
		}
	}
}
impl<C> Debug for RefreshCoordinator<C>
where
	C: ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refresh", &self.descriptor.endpoints.refresh)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn already_rotated_compares_against_rejected_token() {
		let a1 = TokenSecret::new("A1");
		let a2 = TokenSecret::new("A2");
		let request = RefreshRequest::after_rejection(Some(a1.clone()));

		assert!(!request.already_rotated(Some(&a1)));
		assert!(request.already_rotated(Some(&a2)));
		assert!(!request.already_rotated(None));
		assert!(!request.clone().force_refresh().already_rotated(Some(&a2)));
		assert!(RefreshRequest::after_rejection(None).already_rotated(Some(&a2)));
	}
}
