//! Identity modes the broker can authenticate as.

// self
use crate::_prelude::*;

/// Which identity a token (and the directory client using it) represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
	/// The application itself, via the client-credentials grant.
	Application,
	/// A signed-in user, via the interactive authorization-code grant.
	DelegatedUser,
}
impl IdentityMode {
	/// Both modes, in the order the console demo runs them.
	pub const ALL: [IdentityMode; 2] = [IdentityMode::Application, IdentityMode::DelegatedUser];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			IdentityMode::Application => "application",
			IdentityMode::DelegatedUser => "delegated_user",
		}
	}

	/// Whether acquiring a token in this mode needs a human at the keyboard.
	pub const fn is_interactive(self) -> bool {
		matches!(self, IdentityMode::DelegatedUser)
	}
}
impl Display for IdentityMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_delegated_user_needs_interaction() {
		assert_eq!(
			IdentityMode::ALL.map(|mode| (mode.as_str(), mode.is_interactive())),
			[("application", false), ("delegated_user", true)]
		);
	}
}
