//! Session state derived from the stored credentials.
//!
//! A [`Session`] starts in [`SessionPhase::Init`]. [`Session::bootstrap`] moves it through
//! `Checking` to either `Authenticated` (the backend accepted the stored pair) or `Anonymous`.
//! Login and logout bump an internal epoch so that a bootstrap result arriving after either of
//! them is discarded instead of overwriting the newer state. Once authenticated, a refresh
//! failure reported by the client drops the session to `Anonymous` on its own.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{IdentityCredential, LoginCredentials, Registration, TokenGrant, UserProfile},
	client::{ApiClient, ApiRequest},
	http::ApiHttpClient,
	notify::{Listeners, Notification, Notifier, Subscription},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
	users::Receipt,
};

/// Title of the notification shown when login fails.
pub const LOGIN_FAILED_TITLE: &str = "Login Failed";
/// Title of the notification shown when registration fails.
pub const REGISTRATION_FAILED_TITLE: &str = "Registration Failed";
/// Message shown after a successful login.
pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful!";
/// Message shown after a successful registration.
pub const REGISTRATION_SUCCESS_MESSAGE: &str = "Registration successful! Please login.";
/// Error text used when a failed login carries no backend detail.
pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed";
/// Error text used when a failed registration carries no backend detail.
pub const REGISTRATION_FALLBACK_MESSAGE: &str = "Registration failed";

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
	/// Created; the stored credentials have not been looked at yet.
	#[default]
	Init,
	/// Validating the stored credentials against the backend.
	Checking,
	/// A user profile is loaded.
	Authenticated,
	/// No usable credentials.
	Anonymous,
}

/// Read-only snapshot handed to views and observers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
	/// Current phase.
	pub phase: SessionPhase,
	/// Current user, present only while authenticated.
	pub user: Option<UserProfile>,
}
impl SessionState {
	/// Returns `true` until the bootstrap check resolved.
	pub fn is_loading(&self) -> bool {
		matches!(self.phase, SessionPhase::Init | SessionPhase::Checking)
	}

	/// Returns `true` when a user profile is loaded.
	pub fn is_authenticated(&self) -> bool {
		self.phase == SessionPhase::Authenticated && self.user.is_some()
	}

	fn authenticated(user: UserProfile) -> Self {
		Self { phase: SessionPhase::Authenticated, user: Some(user) }
	}

	fn anonymous() -> Self {
		Self { phase: SessionPhase::Anonymous, user: None }
	}
}

/// What to do with the stored pair when the identity check fails for a reason other than an
/// expired session (403, 5xx, network, malformed body).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BootstrapFailurePolicy {
	/// Drop the stored pair.
	#[default]
	ClearTokens,
	/// Keep the stored pair so [`Session::revalidate`] can try again later.
	PreserveTokens,
}

/// Session behavior knobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
	/// Handling of non-fatal identity-check failures.
	pub bootstrap_failure: BootstrapFailurePolicy,
}
impl SessionOptions {
	/// Overrides the bootstrap failure policy.
	pub fn bootstrap_failure(mut self, policy: BootstrapFailurePolicy) -> Self {
		self.bootstrap_failure = policy;

		self
	}
}

enum IdentityCheck {
	Verified(UserProfile),
	NoCredentials,
	Expired,
	Failed(Error),
}

#[derive(Debug, Default)]
struct SessionCore {
	state: RwLock<SessionState>,
	observers: Listeners<SessionState>,
	epoch: AtomicU64,
}
impl SessionCore {
	fn replace_state(&self, next: SessionState) {
		{
			let mut state = self.state.write();

			self.epoch.fetch_add(1, Ordering::AcqRel);
			*state = next.clone();
		}

		self.observers.emit(&next);
	}

	/// Drops an authenticated session whose credentials are gone. Returns `true` when the state
	/// changed.
	fn expire(&self, tokens: &TokenStore) -> bool {
		let next = {
			let mut state = self.state.write();

			if !state.is_authenticated() {
				return false;
			}
			// A login that landed after the failed refresh keeps its session.
			if matches!(tokens.read(), Ok(Some(_))) {
				return false;
			}

			self.epoch.fetch_add(1, Ordering::AcqRel);
			*state = SessionState::anonymous();

			state.clone()
		};

		obs::flow_debug(
			FlowKind::Logout,
			"Session expired; credentials could not be renewed.",
			None,
		);
		self.observers.emit(&next);

		true
	}
}

/// Owner of the session state and the authentication operations that change it.
pub struct Session<C>
where
	C: ApiHttpClient,
{
	client: ApiClient<C>,
	notifier: Arc<dyn Notifier>,
	options: SessionOptions,
	core: Arc<SessionCore>,
	_expiry: Subscription,
}
impl<C> Session<C>
where
	C: ApiHttpClient,
{
	/// Creates a session with default options.
	pub fn new(client: ApiClient<C>, notifier: Arc<dyn Notifier>) -> Self {
		Self::with_options(client, notifier, SessionOptions::default())
	}

	/// Creates a session with explicit options.
	pub fn with_options(
		client: ApiClient<C>,
		notifier: Arc<dyn Notifier>,
		options: SessionOptions,
	) -> Self {
		let core = Arc::new(SessionCore::default());
		let expiry = client.on_session_expired({
			let core = Arc::downgrade(&core);
			let tokens = client.tokens().clone();

			move |_| {
				if let Some(core) = core.upgrade() {
					core.expire(&tokens);
				}
			}
		});

		Self { client, notifier, options, core, _expiry: expiry }
	}

	/// Snapshot of the current state.
	pub fn state(&self) -> SessionState {
		self.core.state.read().clone()
	}

	/// Options in use.
	pub fn options(&self) -> SessionOptions {
		self.options
	}

	/// Underlying client, including anonymous endpoints such as email verification.
	pub fn client(&self) -> &ApiClient<C> {
		&self.client
	}

	/// Registers an observer for state changes; dropping the guard unsubscribes.
	pub fn subscribe<F>(&self, listener: F) -> Subscription
	where
		F: 'static + Fn(&SessionState) + Send + Sync,
	{
		self.core.observers.subscribe(listener)
	}

	/// Hands out the API client once bootstrap resolved to an authenticated session.
	pub fn protected_client(&self) -> Result<ApiClient<C>> {
		if self.core.state.read().is_authenticated() {
			Ok(self.client.clone())
		} else {
			Err(Error::Unauthenticated)
		}
	}

	/// Runs the startup identity check once; later calls return the current state.
	pub async fn bootstrap(&self) -> SessionState {
		let epoch = {
			let mut state = self.core.state.write();

			if state.phase != SessionPhase::Init {
				return state.clone();
			}

			state.phase = SessionPhase::Checking;

			self.core.epoch.load(Ordering::Acquire)
		};

		self.core.observers.emit(&self.state());
		self.check(FlowKind::Bootstrap, "bootstrap", epoch).await
	}

	/// Re-runs the identity check against the stored pair.
	///
	/// Has no effect before [`Session::bootstrap`] resolved.
	pub async fn revalidate(&self) -> SessionState {
		let epoch = {
			let state = self.core.state.read();

			if state.is_loading() {
				return state.clone();
			}

			self.core.epoch.load(Ordering::Acquire)
		};

		self.check(FlowKind::Bootstrap, "revalidate", epoch).await
	}

	/// Logs in with email and password.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile> {
		let result = FlowSpan::start(FlowKind::Login, "login")
			.run(async {
				let grant = self.client.login(credentials).await?;

				self.establish(grant).await
			})
			.await;

		self.report_login(&result);

		result
	}

	/// Logs in with a credential issued by a third-party identity provider.
	pub async fn login_with_identity(&self, credential: &IdentityCredential) -> Result<UserProfile> {
		let result = FlowSpan::start(FlowKind::IdentityLogin, "login_with_identity")
			.run(async {
				let grant = self.client.login_with_identity(credential).await?;

				self.establish(grant).await
			})
			.await;

		self.report_login(&result);

		result
	}

	/// Creates an account; the session state is left untouched.
	pub async fn register(&self, registration: &Registration) -> Result<Receipt> {
		let result = FlowSpan::start(FlowKind::Register, "register")
			.run(self.client.register(registration))
			.await;

		match &result {
			Ok(_) =>
				self.notifier.notify(Notification::success("Success", REGISTRATION_SUCCESS_MESSAGE)),
			Err(err) => self.notifier.notify(Notification::error(
				REGISTRATION_FAILED_TITLE,
				err.user_message(REGISTRATION_FALLBACK_MESSAGE),
			)),
		}

		result
	}

	/// Clears the stored pair and resets to `Anonymous` without contacting the backend.
	///
	/// The state is reset even when the store fails; the store error is returned afterwards.
	pub fn logout(&self) -> Result<()> {
		let span = FlowSpan::start(FlowKind::Logout, "logout").entered();
		let cleared = self.client.tokens().clear();

		if let Err(e) = &cleared {
			obs::flow_warning(FlowKind::Logout, "Failed to clear stored credentials.", e);
		}

		self.core.replace_state(SessionState::anonymous());
		span.finish(&cleared);

		cleared.map_err(Error::from)
	}

	/// Moves to `Anonymous` when `err` shows the session ended and no newer credentials were
	/// stored since. Returns `true` when the state changed.
	///
	/// Refresh failures on session requests are already applied through the client's expiry
	/// events; this covers errors the caller obtained some other way.
	pub fn handle_session_error(&self, err: &Error) -> bool {
		err.is_session_fatal() && self.core.expire(self.client.tokens())
	}

	async fn check(&self, kind: FlowKind, stage: &'static str, epoch: u64) -> SessionState {
		let span = FlowSpan::start(kind, stage);
		let outcome = span.instrument(self.verify_identity()).await;

		match &outcome {
			IdentityCheck::Failed(err) => {
				obs::flow_warning(kind, "Identity check failed.", err);
				span.finish(FlowOutcome::Failure);
			},
			_ => span.finish(FlowOutcome::Success),
		}

		self.apply_check(kind, epoch, outcome)
	}

	async fn verify_identity(&self) -> IdentityCheck {
		match self.client.tokens().read() {
			Ok(Some(_)) => {},
			Ok(None) => return IdentityCheck::NoCredentials,
			Err(err) => return IdentityCheck::Failed(err.into()),
		}

		match self.client.me().await {
			Ok(user) => IdentityCheck::Verified(user),
			Err(err) if err.is_session_fatal() => IdentityCheck::Expired,
			Err(err) => IdentityCheck::Failed(err),
		}
	}

	fn apply_check(&self, kind: FlowKind, epoch: u64, outcome: IdentityCheck) -> SessionState {
		let next = {
			let mut state = self.core.state.write();

			if self.core.epoch.load(Ordering::Acquire) != epoch {
				obs::flow_debug(kind, "Discarding stale identity check.", None);

				return state.clone();
			}

			let tokens = self.client.tokens();
			let cleared = match outcome {
				IdentityCheck::Verified(user) => {
					*state = SessionState::authenticated(user);

					Ok(())
				},
				IdentityCheck::NoCredentials => {
					*state = SessionState::anonymous();

					// A lone half can never be renewed.
					match tokens.is_partial() {
						Ok(true) => tokens.clear(),
						other => other.map(|_| ()),
					}
				},
				IdentityCheck::Expired => {
					*state = SessionState::anonymous();

					tokens.clear()
				},
				IdentityCheck::Failed(_) => {
					*state = SessionState::anonymous();

					match self.options.bootstrap_failure {
						BootstrapFailurePolicy::ClearTokens => tokens.clear(),
						BootstrapFailurePolicy::PreserveTokens => Ok(()),
					}
				},
			};

			if let Err(e) = cleared {
				obs::flow_warning(kind, "Failed to clear stored credentials.", &e);
			}

			state.clone()
		};

		self.core.observers.emit(&next);

		next
	}

	async fn establish(&self, grant: TokenGrant) -> Result<UserProfile> {
		let (pair, user) = grant.into_parts();

		if !pair.is_usable() {
			return Err(Error::InvalidInput { reason: "login response carried a blank token".into() });
		}

		let user = match user {
			Some(user) => user,
			None =>
				self.client
					.send_json(
						ApiRequest::get(self.client.descriptor().endpoints.me.as_str())
							.bearer(pair.access.clone()),
					)
					.await?,
		};

		self.client.tokens().save(&pair)?;
		self.core.replace_state(SessionState::authenticated(user.clone()));

		Ok(user)
	}

	fn report_login(&self, result: &Result<UserProfile>) {
		match result {
			Ok(_) => self.notifier.notify(Notification::success("Success", LOGIN_SUCCESS_MESSAGE)),
			Err(err) => self.notifier.notify(Notification::error(
				LOGIN_FAILED_TITLE,
				err.user_message(LOGIN_FALLBACK_MESSAGE),
			)),
		}
	}
}
impl<C> Debug for Session<C>
where
	C: ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("state", &*self.core.state.read())
			.field("options", &self.options)
			.field("client", &self.client)
			.finish()
	}
}
