//! Access token records held in the per-mode cache slots.

// self
use crate::{
	_prelude::*,
	auth::{IdentityMode, TokenSecret, UserInfo},
};

/// Token issued for one identity mode.
///
/// Records are never refreshed: once cached, a record stays valid for the lifetime of the
/// [`TokenCache`](crate::cache::TokenCache) holding it. `expires_at` is kept only as
/// diagnostic information reported by the provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessToken {
	/// Identity mode the token was acquired for.
	pub mode: IdentityMode,
	/// Bearer secret; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Instant the broker received the token.
	pub acquired_at: OffsetDateTime,
	/// Provider-reported expiry, when the response carried `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
	/// Signed-in user, for delegated-user tokens whose response carried an `id_token`.
	pub user: Option<UserInfo>,
}
impl AccessToken {
	/// Creates a record acquired now.
	pub fn new(mode: IdentityMode, secret: impl Into<String>) -> Self {
		Self {
			mode,
			secret: TokenSecret::new(secret),
			acquired_at: OffsetDateTime::now_utc(),
			expires_at: None,
			user: None,
		}
	}

	/// Records the provider-reported lifetime relative to [`AccessToken::acquired_at`].
	///
	/// A lifetime that overflows the representable range leaves `expires_at` unset.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_at = self.acquired_at.checked_add(expires_in);

		self
	}

	/// Attaches the signed-in user.
	pub fn with_user(mut self, user: UserInfo) -> Self {
		self.user = Some(user);

		self
	}

	/// Raw token value. Callers must avoid logging it.
	pub fn expose(&self) -> &str {
		self.secret.expose()
	}
}
impl PartialEq for AccessToken {
	fn eq(&self, other: &Self) -> bool {
		self.mode == other.mode
			&& self.secret == other.secret
			&& self.acquired_at == other.acquired_at
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("mode", &self.mode)
			.field("secret", &"<redacted>")
			.field("acquired_at", &self.acquired_at)
			.field("expires_at", &self.expires_at)
			.field("user", &self.user)
			.finish()
	}
}
