//! Route gating derived from [`SessionState`].
//!
//! The guard is a pure function of the session snapshot and a path; it never renders protected
//! content while the bootstrap check is still running.

// self
use crate::{_prelude::*, session::SessionState};

/// Who may open a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteAccess {
	/// Everyone, regardless of session state.
	Public,
	/// Authenticated users only.
	Protected,
	/// Anonymous users only (landing, login, registration).
	GuestOnly,
}

/// Outcome of evaluating a route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
	/// Session state is still loading; render a placeholder.
	Wait,
	/// Render the requested view.
	Render,
	/// Navigate elsewhere.
	Redirect {
		/// Target path.
		to: String,
	},
}

/// Errors raised while building a route table.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RouteError {
	/// Pattern must start with `/`.
	#[error("Route pattern must start with `/`: {pattern:?}.")]
	NotAbsolute {
		/// Offending pattern.
		pattern: String,
	},
	/// Pattern contains an empty segment or an unnamed parameter.
	#[error("Route pattern has an empty segment: {pattern:?}.")]
	EmptySegment {
		/// Offending pattern.
		pattern: String,
	},
	/// `*` may only appear as the final segment.
	#[error("Wildcard must be the last segment: {pattern:?}.")]
	MisplacedWildcard {
		/// Offending pattern.
		pattern: String,
	},
	/// Same pattern registered twice.
	#[error("Route pattern registered twice: {pattern:?}.")]
	Duplicate {
		/// Offending pattern.
		pattern: String,
	},
	/// Redirect target must be an absolute path.
	#[error("Redirect target must start with `/`: {path:?}.")]
	InvalidRedirect {
		/// Offending path.
		path: String,
	},
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Param,
}

/// Parsed path pattern supporting `:param` segments and a trailing `*`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePattern {
	raw: String,
	segments: Vec<Segment>,
	wildcard: bool,
}
impl RoutePattern {
	/// Parses `pattern`.
	pub fn parse(pattern: &str) -> Result<Self, RouteError> {
		if !pattern.starts_with('/') {
			return Err(RouteError::NotAbsolute { pattern: pattern.into() });
		}

		let trimmed = pattern.trim_end_matches('/');
		let parts = if trimmed.is_empty() {
			Vec::new()
		} else {
			trimmed[1..].split('/').collect::<Vec<_>>()
		};
		let mut segments = Vec::with_capacity(parts.len());
		let mut wildcard = false;

		for (idx, part) in parts.iter().enumerate() {
			if part.is_empty() || *part == ":" {
				return Err(RouteError::EmptySegment { pattern: pattern.into() });
			}
			if *part == "*" {
				if idx + 1 != parts.len() {
					return Err(RouteError::MisplacedWildcard { pattern: pattern.into() });
				}

				wildcard = true;

				continue;
			}

			segments.push(if part.starts_with(':') {
				Segment::Param
			} else {
				Segment::Literal((*part).to_owned())
			});
		}

		Ok(Self { raw: trimmed_or_root(pattern), segments, wildcard })
	}

	/// Source pattern, without a trailing slash.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Returns `true` when `path` matches the pattern.
	pub fn matches(&self, path: &str) -> bool {
		let parts = path_segments(path);

		if self.wildcard {
			if parts.len() < self.segments.len() {
				return false;
			}
		} else if parts.len() != self.segments.len() {
			return false;
		}

		self.segments.iter().zip(&parts).all(|(segment, part)| match segment {
			Segment::Literal(literal) => literal == part,
			Segment::Param => !part.is_empty(),
		})
	}
}

/// Ordered route table; the first matching pattern decides.
#[derive(Clone, Debug)]
pub struct RouteTable {
	routes: Vec<(RoutePattern, RouteAccess)>,
	fallback: RouteAccess,
}
impl RouteTable {
	/// Starts an empty table.
	pub fn builder() -> RouteTableBuilder {
		RouteTableBuilder::default()
	}

	/// CookNet's route map.
	///
	/// Should the built-in patterns ever fail validation, the table fails closed: every path
	/// requires authentication.
	pub fn cooknet() -> Self {
		match Self::cooknet_routes().build() {
			Ok(table) => table,
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::error!(error = %e, "Built-in route table is invalid.");
				#[cfg(not(feature = "tracing"))]
				let _ = e;

				Self { routes: Vec::new(), fallback: RouteAccess::Protected }
			},
		}
	}

	/// Access level for `path`.
	pub fn access(&self, path: &str) -> RouteAccess {
		self.routes
			.iter()
			.find(|(pattern, _)| pattern.matches(path))
			.map(|(_, access)| *access)
			.unwrap_or(self.fallback)
	}

	fn cooknet_routes() -> RouteTableBuilder {
		let mut builder = Self::builder();

		for path in ["/", "/login", "/register"] {
			builder = builder.guest_only(path);
		}
		for path in ["/verify-email", "/verify-email-sent"] {
			builder = builder.public(path);
		}
		for path in [
			"/home",
			"/feed",
			"/dashboard",
			"/settings",
			"/create-post",
			"/saved",
			"/friends",
			"/communities",
			"/recipe/:id",
		] {
			builder = builder.protected(path);
		}

		builder
	}
}

/// Builder for [`RouteTable`]; patterns are validated in [`RouteTableBuilder::build`].
#[derive(Clone, Debug)]
pub struct RouteTableBuilder {
	entries: Vec<(String, RouteAccess)>,
	fallback: RouteAccess,
}
impl RouteTableBuilder {
	/// Registers a route with an explicit access level.
	pub fn route(mut self, pattern: impl Into<String>, access: RouteAccess) -> Self {
		self.entries.push((pattern.into(), access));

		self
	}

	/// Registers a public route.
	pub fn public(self, pattern: impl Into<String>) -> Self {
		self.route(pattern, RouteAccess::Public)
	}

	/// Registers a protected route.
	pub fn protected(self, pattern: impl Into<String>) -> Self {
		self.route(pattern, RouteAccess::Protected)
	}

	/// Registers a guest-only route.
	pub fn guest_only(self, pattern: impl Into<String>) -> Self {
		self.route(pattern, RouteAccess::GuestOnly)
	}

	/// Access level for unmatched paths (defaults to public).
	pub fn fallback(mut self, access: RouteAccess) -> Self {
		self.fallback = access;

		self
	}

	/// Validates every pattern.
	pub fn build(self) -> Result<RouteTable, RouteError> {
		let mut routes: Vec<(RoutePattern, RouteAccess)> = Vec::with_capacity(self.entries.len());

		for (raw, access) in self.entries {
			let pattern = RoutePattern::parse(&raw)?;

			if routes.iter().any(|(existing, _)| existing.as_str() == pattern.as_str()) {
				return Err(RouteError::Duplicate { pattern: raw });
			}

			routes.push((pattern, access));
		}

		Ok(RouteTable { routes, fallback: self.fallback })
	}
}
impl Default for RouteTableBuilder {
	fn default() -> Self {
		Self { entries: Vec::new(), fallback: RouteAccess::Public }
	}
}

/// Decides whether a view may render for the current session.
#[derive(Clone, Debug)]
pub struct RouteGuard {
	table: RouteTable,
	login_path: String,
	home_path: String,
}
impl RouteGuard {
	/// Where unauthenticated visitors of protected routes are sent.
	pub const LOGIN_PATH: &'static str = "/login";
	/// Where authenticated visitors of guest-only routes are sent.
	pub const HOME_PATH: &'static str = "/home";

	/// Creates a guard over `table` with the default redirect targets.
	pub fn new(table: RouteTable) -> Self {
		Self { table, login_path: Self::LOGIN_PATH.into(), home_path: Self::HOME_PATH.into() }
	}

	/// Overrides the redirect targets.
	pub fn with_redirects(
		mut self,
		login_path: impl Into<String>,
		home_path: impl Into<String>,
	) -> Result<Self, RouteError> {
		let login_path = login_path.into();
		let home_path = home_path.into();

		for path in [&login_path, &home_path] {
			if !path.starts_with('/') {
				return Err(RouteError::InvalidRedirect { path: path.clone() });
			}
		}

		self.login_path = login_path;
		self.home_path = home_path;

		Ok(self)
	}

	/// Route table in use.
	pub fn table(&self) -> &RouteTable {
		&self.table
	}

	/// Evaluates `path` against `state`.
	pub fn evaluate(&self, state: &SessionState, path: &str) -> GuardDecision {
		match self.table.access(path) {
			RouteAccess::Public => GuardDecision::Render,
			_ if state.is_loading() => GuardDecision::Wait,
			RouteAccess::Protected if state.is_authenticated() => GuardDecision::Render,
			RouteAccess::Protected => GuardDecision::Redirect { to: self.login_path.clone() },
			RouteAccess::GuestOnly if state.is_authenticated() =>
				GuardDecision::Redirect { to: self.home_path.clone() },
			RouteAccess::GuestOnly => GuardDecision::Render,
		}
	}
}
impl Default for RouteGuard {
	fn default() -> Self {
		Self::new(RouteTable::cooknet())
	}
}

fn trimmed_or_root(pattern: &str) -> String {
	match pattern.trim_end_matches('/') {
		"" => "/".into(),
		trimmed => trimmed.into(),
	}
}

fn path_segments(path: &str) -> Vec<&str> {
	let end = path.find(['?', '#']).unwrap_or(path.len());
	let path = path[..end].trim_matches('/');

	if path.is_empty() { Vec::new() } else { path.split('/').collect() }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::UserProfile, session::SessionPhase};

	fn state(phase: SessionPhase) -> SessionState {
		let user = (phase == SessionPhase::Authenticated)
			.then(|| UserProfile::new(serde_json::json!({ "id": 1, "username": "alice" })));

		SessionState { phase, user }
	}

	#[test]
	fn patterns_match_params_wildcards_and_decorations() {
		let recipe = RoutePattern::parse("/recipe/:id").expect("Pattern should parse.");

		assert!(recipe.matches("/recipe/42"));
		assert!(recipe.matches("/recipe/42/?tab=steps#top"));
		assert!(!recipe.matches("/recipe"));
		assert!(!recipe.matches("/recipe/42/edit"));

		let docs = RoutePattern::parse("/docs/*").expect("Pattern should parse.");

		assert!(docs.matches("/docs"));
		assert!(docs.matches("/docs/a/b"));

		let root = RoutePattern::parse("/").expect("Root should parse.");

		assert!(root.matches("/"));
		assert!(root.matches("/?ref=mail"));
		assert!(!root.matches("/home"));
	}

	#[test]
	fn builder_rejects_malformed_tables() {
		assert!(matches!(
			RouteTable::builder().protected("home").build(),
			Err(RouteError::NotAbsolute { .. })
		));
		assert!(matches!(
			RouteTable::builder().protected("/a/*/b").build(),
			Err(RouteError::MisplacedWildcard { .. })
		));
		assert!(matches!(
			RouteTable::builder().protected("/a//b").build(),
			Err(RouteError::EmptySegment { .. })
		));
		assert!(matches!(
			RouteTable::builder().protected("/home").public("/home/").build(),
			Err(RouteError::Duplicate { .. })
		));
	}

	#[test]
	fn built_in_routes_all_validate() {
		let builder = RouteTable::cooknet_routes();
		let registered = builder.entries.len();
		let table = builder.build().expect("Every built-in route should validate.");

		assert_eq!(table.routes.len(), registered);
		assert_eq!(RouteTable::cooknet().routes.len(), registered);
		assert_eq!(table.access("/recipe/7"), RouteAccess::Protected);
		assert_eq!(table.access("/unknown"), RouteAccess::Public);
	}

	#[test]
	fn protected_routes_wait_render_or_redirect() {
		let guard = RouteGuard::default();

		assert_eq!(guard.evaluate(&state(SessionPhase::Init), "/feed"), GuardDecision::Wait);
		assert_eq!(guard.evaluate(&state(SessionPhase::Checking), "/recipe/7"), GuardDecision::Wait);
		assert_eq!(
			guard.evaluate(&state(SessionPhase::Authenticated), "/recipe/7"),
			GuardDecision::Render
		);
		assert_eq!(
			guard.evaluate(&state(SessionPhase::Anonymous), "/settings"),
			GuardDecision::Redirect { to: "/login".into() },
		);
	}

	#[test]
	fn guest_and_public_routes() {
		let guard = RouteGuard::default();

		assert_eq!(
			guard.evaluate(&state(SessionPhase::Authenticated), "/login"),
			GuardDecision::Redirect { to: "/home".into() },
		);
		assert_eq!(guard.evaluate(&state(SessionPhase::Anonymous), "/"), GuardDecision::Render);
		assert_eq!(guard.evaluate(&state(SessionPhase::Checking), "/register"), GuardDecision::Wait);
		assert_eq!(
			guard.evaluate(&state(SessionPhase::Checking), "/verify-email?token=abc"),
			GuardDecision::Render,
		);
		assert_eq!(guard.evaluate(&state(SessionPhase::Anonymous), "/nowhere"), GuardDecision::Render);
		assert_eq!(guard.table().access("/communities/"), RouteAccess::Protected);
	}

	#[test]
	fn custom_redirects_are_validated() {
		assert!(RouteGuard::default().with_redirects("login", "/home").is_err());

		let guard = RouteGuard::default()
			.with_redirects("/sign-in", "/feed")
			.expect("Absolute redirects should be accepted.");

		assert_eq!(
			guard.evaluate(&state(SessionPhase::Anonymous), "/home"),
			GuardDecision::Redirect { to: "/sign-in".into() },
		);
	}
}
