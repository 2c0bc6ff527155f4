//! Identity-provider specifics: grant labels and the strategy hook that decorates token
//! requests and classifies token-endpoint failures.

pub mod strategy;

pub use strategy::*;

// self
use crate::{_prelude::*, auth::IdentityMode};

/// OAuth 2.0 grant types used by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Interactive Authorization Code grant (delegated user).
	AuthorizationCode,
	/// Client Credentials grant (application).
	ClientCredentials,
}
impl GrantType {
	/// Grant used to acquire tokens for `mode`.
	pub const fn for_mode(mode: IdentityMode) -> Self {
		match mode {
			IdentityMode::Application => GrantType::ClientCredentials,
			IdentityMode::DelegatedUser => GrantType::AuthorizationCode,
		}
	}

	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::ClientCredentials => "client_credentials",
		}
	}

	/// Identity mode this grant acquires tokens for.
	pub const fn mode(self) -> IdentityMode {
		match self {
			GrantType::AuthorizationCode => IdentityMode::DelegatedUser,
			GrantType::ClientCredentials => IdentityMode::Application,
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
