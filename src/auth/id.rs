//! Strongly typed identifiers for tenants and registered applications.
//!
//! Both identifiers end up as URL path segments or form values, so validation rejects empty
//! values, whitespace, and URL delimiters up front instead of letting the provider fail later.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 256;
const URL_DELIMITERS: [char; 4] = ['/', '?', '#', '\\'];

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
	},
	/// The identifier contains a URL delimiter and cannot be used as a path segment.
	#[error("{kind} identifier contains the reserved character `{ch}`.")]
	ReservedCharacter {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
		/// First offending character.
		ch: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (tenant, client).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { TenantId, "Directory tenant: a GUID or a verified domain such as `contoso.onmicrosoft.com`.", "Tenant" }
def_id! { ClientId, "Application (client) identifier registered with the identity provider.", "Client" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if let Some(ch) = view.chars().find(|ch| URL_DELIMITERS.contains(ch)) {
		return Err(IdentifierError::ReservedCharacter { kind, ch });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_delimiters() {
		assert!(TenantId::new(" contoso").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("").is_err());

		let err = TenantId::new("contoso/common").expect_err("Slash must be rejected.");

		assert_eq!(err, IdentifierError::ReservedCharacter { kind: "Tenant", ch: '/' });

		let tenant = TenantId::new("4fd2b2f2-ea27-4fe5-a8f3-7b1a7c975f34")
			.expect("GUID tenant should be valid.");

		assert_eq!(tenant.as_ref(), "4fd2b2f2-ea27-4fe5-a8f3-7b1a7c975f34");
		TenantId::new("GraphDir1.onMicrosoft.com").expect("Domain tenant should be valid.");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let client: ClientId =
			serde_json::from_str("\"118473c2\"").expect("Client id should deserialize.");

		assert_eq!(client.as_ref(), "118473c2");
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
		assert_eq!(format!("{client:?}"), "Client(118473c2)");
	}

	#[test]
	fn length_limit_is_enforced() {
		TenantId::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(TenantId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}
}
