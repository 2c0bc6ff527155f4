//! Signed-in user details decoded from the `id_token` of a delegated sign-in.
//!
//! The token is only decoded, never verified: it arrives over the same TLS channel as the
//! access token and is used for display purposes only.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Failure to decode an `id_token`.
#[derive(Debug, ThisError)]
pub enum IdTokenError {
	/// The token does not have the `header.payload.signature` shape.
	#[error("ID token is not a compact JWT.")]
	Malformed,
	/// The payload segment is not base64url.
	#[error("ID token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// The payload is not the expected JSON object.
	#[error("ID token claims could not be parsed.")]
	Claims(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Profile of the user who completed the interactive sign-in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Object identifier of the user in the directory.
	#[serde(default, rename = "oid")]
	pub object_id: Option<String>,
	/// Given (first) name.
	#[serde(default)]
	pub given_name: Option<String>,
	/// Family (last) name.
	#[serde(default)]
	pub family_name: Option<String>,
	/// Display name.
	#[serde(default, rename = "name")]
	pub display_name: Option<String>,
	/// User principal name; falls back to `unique_name` for personal accounts.
	#[serde(default, alias = "unique_name")]
	pub upn: Option<String>,
}
impl UserInfo {
	/// Decodes the claims segment of a compact JWT.
	pub fn from_id_token(id_token: &str) -> Result<Self, IdTokenError> {
		let mut segments = id_token.split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(IdTokenError::Malformed);
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		Ok(serde_path_to_error::deserialize(de)?)
	}

	/// Best human-readable name: `given family`, then display name, then UPN.
	pub fn greeting_name(&self) -> Option<String> {
		match (self.given_name.as_deref(), self.family_name.as_deref()) {
			(Some(given), Some(family)) => Some(format!("{given} {family}")),
			(Some(single), None) | (None, Some(single)) => Some(single.to_owned()),
			(None, None) => self.display_name.clone().or_else(|| self.upn.clone()),
		}
	}

	/// Welcome line shown after a successful delegated sign-in.
	pub fn welcome_message(&self) -> String {
		match self.greeting_name() {
			Some(name) => format!("Welcome {name}"),
			None => "Welcome".into(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn jwt(claims: &str) -> String {
		format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(claims))
	}

	#[test]
	fn decodes_claims_and_builds_welcome() {
		let token = jwt(
			r#"{"oid":"u-1","given_name":"Ada","family_name":"Lovelace","unique_name":"ada@contoso.com"}"#,
		);
		let user = UserInfo::from_id_token(&token).expect("Claims should decode.");

		assert_eq!(user.object_id.as_deref(), Some("u-1"));
		assert_eq!(user.upn.as_deref(), Some("ada@contoso.com"));
		assert_eq!(user.welcome_message(), "Welcome Ada Lovelace");
	}

	#[test]
	fn greeting_falls_back_to_display_name() {
		let user = UserInfo { display_name: Some("Grace".into()), ..Default::default() };

		assert_eq!(user.welcome_message(), "Welcome Grace");
		assert_eq!(UserInfo::default().welcome_message(), "Welcome");
	}

	#[test]
	fn malformed_tokens_are_rejected() {
		assert!(matches!(UserInfo::from_id_token("not-a-jwt"), Err(IdTokenError::Malformed)));
		assert!(matches!(UserInfo::from_id_token("a.%%%.c"), Err(IdTokenError::Encoding(_))));
		assert!(matches!(UserInfo::from_id_token(&jwt("[1,2]")), Err(IdTokenError::Claims(_))));
	}
}
