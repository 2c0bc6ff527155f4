//! Instance-scoped token cache with one slot per identity mode.
//!
//! A [`TokenCache`] is created empty, filled by the broker on the first successful acquisition
//! for a mode, and never refreshed or cleared afterwards. Share one cache between brokers by
//! wrapping it in an `Arc`; construct a fresh one to get independent state (for example per
//! test). The per-mode acquisition guards live in the cache too, so brokers sharing a cache
//! also share a single in-flight acquisition per mode.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, IdentityMode},
};

type SlotMap = RwLock<HashMap<IdentityMode, AccessToken>>;
type GuardMap = Mutex<HashMap<IdentityMode, Arc<AsyncMutex<()>>>>;

/// Observable state of a single cache slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
	/// No token has been acquired yet (or every attempt so far failed).
	Empty,
	/// An acquisition is in flight.
	Acquiring,
	/// A token is cached for the rest of the cache's lifetime.
	Cached,
}

/// Thread-safe per-mode token memo.
#[derive(Debug, Default)]
pub struct TokenCache {
	slots: SlotMap,
	guards: GuardMap,
}
impl TokenCache {
	/// Returns the cached token for `mode`, if any.
	pub fn get(&self, mode: IdentityMode) -> Option<AccessToken> {
		self.slots.read().get(&mode).cloned()
	}

	/// Stores `token` in the slot for its own mode and returns the value now cached.
	///
	/// A slot is written at most once: if another caller already filled it, the existing token
	/// wins and is returned instead.
	pub fn insert(&self, token: AccessToken) -> AccessToken {
		self.slots.write().entry(token.mode).or_insert(token).clone()
	}

	/// Returns `true` when `mode` has a cached token.
	pub fn contains(&self, mode: IdentityMode) -> bool {
		self.slots.read().contains_key(&mode)
	}

	/// Number of filled slots.
	pub fn len(&self) -> usize {
		self.slots.read().len()
	}

	/// Returns `true` when no slot is filled.
	pub fn is_empty(&self) -> bool {
		self.slots.read().is_empty()
	}

	/// Reports whether `mode` is empty, being acquired, or cached.
	pub fn state(&self, mode: IdentityMode) -> CacheState {
		if self.contains(mode) {
			return CacheState::Cached;
		}

		let guard = self.guards.lock().get(&mode).cloned();

		match guard {
			Some(guard) if guard.try_lock().is_none() => CacheState::Acquiring,
			_ => CacheState::Empty,
		}
	}

	/// Singleflight guard serializing acquisitions for `mode`.
	pub(crate) fn acquisition_guard(&self, mode: IdentityMode) -> Arc<AsyncMutex<()>> {
		self.guards.lock().entry(mode).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn slots_are_independent() {
		let cache = TokenCache::default();

		assert!(cache.is_empty());

		cache.insert(AccessToken::new(IdentityMode::Application, "app-token"));

		assert!(cache.contains(IdentityMode::Application));
		assert!(!cache.contains(IdentityMode::DelegatedUser));
		assert_eq!(cache.len(), 1);

		cache.insert(AccessToken::new(IdentityMode::DelegatedUser, "user-token"));

		assert_eq!(
			cache.get(IdentityMode::Application).map(|token| token.expose().to_owned()),
			Some("app-token".into())
		);
		assert_eq!(
			cache.get(IdentityMode::DelegatedUser).map(|token| token.expose().to_owned()),
			Some("user-token".into())
		);
	}

	#[test]
	fn first_write_wins() {
		let cache = TokenCache::default();
		let first = cache.insert(AccessToken::new(IdentityMode::Application, "first"));
		let second = cache.insert(AccessToken::new(IdentityMode::Application, "second"));

		assert_eq!(first.expose(), "first");
		assert_eq!(second.expose(), "first");
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn held_guard_reports_acquiring() {
		let cache = TokenCache::default();

		assert_eq!(cache.state(IdentityMode::Application), CacheState::Empty);

		let guard = cache.acquisition_guard(IdentityMode::Application);
		let held = guard.try_lock().expect("Fresh guard should be free.");

		assert_eq!(cache.state(IdentityMode::Application), CacheState::Acquiring);
		assert_eq!(cache.state(IdentityMode::DelegatedUser), CacheState::Empty);

		drop(held);
		cache.insert(AccessToken::new(IdentityMode::Application, "app-token"));

		assert_eq!(cache.state(IdentityMode::Application), CacheState::Cached);
	}
}
