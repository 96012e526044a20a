//! Storage contracts, the credential-pair [`TokenStore`], and built-in key/value backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
};

/// Persistent key/value backend holding session entries (the `localStorage` of the client).
///
/// Every entry is independent; [`TokenStore`] layers the pair invariant on top.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes or replaces the value stored under `key`.
	fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes the entry stored under `key`; missing entries are not an error.
	fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Storage keys are empty or collide.
	#[error("Invalid storage keys: {message}.")]
	InvalidKeys {
		/// Human-readable error payload.
		message: String,
	},
}

/// Fixed keys under which the two credential halves are persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
	access: String,
	refresh: String,
}
impl StorageKeys {
	/// Default key for the access token.
	pub const DEFAULT_ACCESS: &'static str = "access_token";
	/// Default key for the refresh token.
	pub const DEFAULT_REFRESH: &'static str = "refresh_token";

	/// Builds a key set; keys must be non-empty and distinct.
	pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Result<Self, StoreError> {
		let access = access.into();
		let refresh = refresh.into();

		if access.trim().is_empty() || refresh.trim().is_empty() {
			return Err(StoreError::InvalidKeys { message: "keys must not be empty".into() });
		}
		if access == refresh {
			return Err(StoreError::InvalidKeys {
				message: format!("access and refresh share the key `{access}`"),
			});
		}

		Ok(Self { access, refresh })
	}

	/// Key holding the access token.
	pub fn access(&self) -> &str {
		&self.access
	}

	/// Key holding the refresh token.
	pub fn refresh(&self) -> &str {
		&self.refresh
	}
}
impl Default for StorageKeys {
	fn default() -> Self {
		Self { access: Self::DEFAULT_ACCESS.into(), refresh: Self::DEFAULT_REFRESH.into() }
	}
}

/// Result of a conditional write keyed on the stored refresh token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored refresh token matched and the write was applied.
	Updated,
	/// A different refresh token is stored; nothing was written.
	RefreshMismatch,
	/// No refresh token is stored.
	Missing,
}

/// Sole source of truth for the persisted credential pair.
///
/// Writes go refresh-then-access and removals go access-then-refresh, so no reader can observe
/// an access token without a refresh token able to renew it. The API client reads the bearer
/// credential from here on every request, which makes [`TokenStore::clear`] also drop the
/// credential attached to outbound calls.
///
/// Clones share one write lock. Conditional writes ([`TokenStore::compare_and_swap_refresh`],
/// [`TokenStore::clear_if_refresh`]) compare and write under it, so a logout or login landing
/// while a refresh is in flight is never overwritten by the stale rotation.
#[derive(Clone)]
pub struct TokenStore {
	backend: Arc<dyn SessionStore>,
	keys: StorageKeys,
	write_lock: Arc<Mutex<()>>,
}
impl TokenStore {
	/// Wraps a backend using the default storage keys.
	pub fn new(backend: Arc<dyn SessionStore>) -> Self {
		Self::with_keys(backend, StorageKeys::default())
	}

	/// Wraps a backend using custom storage keys.
	pub fn with_keys(backend: Arc<dyn SessionStore>, keys: StorageKeys) -> Self {
		Self { backend, keys, write_lock: Default::default() }
	}

	/// In-memory store, handy for tests and headless tools.
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryStore::default()))
	}

	/// Storage keys in use.
	pub fn keys(&self) -> &StorageKeys {
		&self.keys
	}

	/// Persists both halves of `pair`.
	pub fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
		let _write = self.write_lock.lock();

		self.write_pair(pair)
	}

	/// Replaces the stored pair with `replacement` only while `expected` is still the stored
	/// refresh token.
	pub fn compare_and_swap_refresh(
		&self,
		expected: &TokenSecret,
		replacement: &TokenPair,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		let _write = self.write_lock.lock();

		match self.refresh_token()? {
			None => Ok(CompareAndSwapOutcome::Missing),
			Some(current) if &current != expected => Ok(CompareAndSwapOutcome::RefreshMismatch),
			Some(_) => {
				self.write_pair(replacement)?;

				Ok(CompareAndSwapOutcome::Updated)
			},
		}
	}

	/// Returns the stored pair, or `None` when either half is missing or blank.
	pub fn read(&self) -> Result<Option<TokenPair>, StoreError> {
		let refresh = self.refresh_token()?;
		let access = self.access_token()?;

		Ok(match (access, refresh) {
			(Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
			_ => None,
		})
	}

	/// Returns the stored access token on its own.
	pub fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		self.entry(&self.keys.access)
	}

	/// Returns the stored refresh token on its own.
	pub fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		self.entry(&self.keys.refresh)
	}

	/// Returns `true` when exactly one half is present.
	pub fn is_partial(&self) -> Result<bool, StoreError> {
		Ok(self.access_token()?.is_some() != self.refresh_token()?.is_some())
	}

	/// Removes both entries.
	pub fn clear(&self) -> Result<(), StoreError> {
		let _write = self.write_lock.lock();

		self.remove_pair()
	}

	/// Removes both entries while the stored refresh token still equals `expected`.
	///
	/// `None` asks to drop only an orphaned access token. When no refresh token is stored the
	/// lone access half is removed and [`CompareAndSwapOutcome::Missing`] is returned; a
	/// different refresh token leaves the store untouched.
	pub fn clear_if_refresh(
		&self,
		expected: Option<&TokenSecret>,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		let _write = self.write_lock.lock();

		match (self.refresh_token()?, expected) {
			(None, _) => {
				self.backend.remove(&self.keys.access)?;

				Ok(CompareAndSwapOutcome::Missing)
			},
			(Some(current), Some(expected)) if &current == expected => {
				self.remove_pair()?;

				Ok(CompareAndSwapOutcome::Updated)
			},
			(Some(_), _) => Ok(CompareAndSwapOutcome::RefreshMismatch),
		}
	}

	fn write_pair(&self, pair: &TokenPair) -> Result<(), StoreError> {
		self.backend.set(&self.keys.refresh, pair.refresh.expose())?;
		self.backend.set(&self.keys.access, pair.access.expose())
	}

	fn remove_pair(&self) -> Result<(), StoreError> {
		self.backend.remove(&self.keys.access)?;
		self.backend.remove(&self.keys.refresh)
	}

	fn entry(&self, key: &str) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.backend.get(key)?.map(TokenSecret::new).filter(|secret| !secret.is_blank()))
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore").field("keys", &self.keys).finish()
	}
}
