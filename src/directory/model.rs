//! Directory objects used by the walkthrough. Only the properties the broker's callers read or
//! write are modeled; unknown properties are ignored when decoding.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

/// Password assigned to users created by [`NewUser::member`].
pub const INITIAL_PASSWORD: &str = "ChangeMe123!";

/// Tenant (company) information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDetail {
	/// Tenant object identifier.
	pub object_id: String,
	/// Company display name.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Domains the tenant proved ownership of.
	#[serde(default)]
	pub verified_domains: Vec<VerifiedDomain>,
}
impl TenantDetail {
	/// The domain flagged as default, falling back to the initial `*.onmicrosoft.com` domain.
	pub fn default_domain(&self) -> Option<&VerifiedDomain> {
		self.verified_domains
			.iter()
			.find(|domain| domain.default)
			.or_else(|| self.verified_domains.iter().find(|domain| domain.initial))
	}
}

/// A verified tenant domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedDomain {
	/// Domain name.
	pub name: String,
	/// Whether new users get this domain by default.
	#[serde(default)]
	pub default: bool,
	/// Whether this is the tenant's initial domain.
	#[serde(default)]
	pub initial: bool,
}

/// Directory user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	/// Object identifier.
	pub object_id: String,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Given (first) name.
	#[serde(default)]
	pub given_name: Option<String>,
	/// Surname.
	#[serde(default)]
	pub surname: Option<String>,
	/// User principal name.
	#[serde(default)]
	pub user_principal_name: Option<String>,
	/// Mail alias.
	#[serde(default)]
	pub mail_nickname: Option<String>,
	/// Whether the account can sign in.
	#[serde(default)]
	pub account_enabled: Option<bool>,
	/// Job title.
	#[serde(default)]
	pub job_title: Option<String>,
	/// Department.
	#[serde(default)]
	pub department: Option<String>,
	/// Two-letter usage location, required before licenses can be assigned.
	#[serde(default)]
	pub usage_location: Option<String>,
}
impl User {
	/// Display name, falling back to the UPN and finally the object id.
	pub fn label(&self) -> &str {
		self.display_name
			.as_deref()
			.or(self.user_principal_name.as_deref())
			.unwrap_or(&self.object_id)
	}
}

/// Payload for creating a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
	/// Whether the account can sign in.
	pub account_enabled: bool,
	/// Display name.
	pub display_name: String,
	/// Mail alias.
	pub mail_nickname: String,
	/// User principal name.
	pub user_principal_name: String,
	/// Initial password settings.
	pub password_profile: PasswordProfile,
	/// Two-letter usage location.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage_location: Option<String>,
}
impl NewUser {
	/// Enabled member `first.last<random>@domain` with the initial password and a forced change
	/// at next sign-in.
	pub fn member(first_name: &str, last_name: &str, domain: &str) -> Self {
		let suffix = random_suffix(4);

		Self {
			account_enabled: true,
			display_name: format!("{first_name} {last_name}"),
			mail_nickname: format!("{first_name}{last_name}"),
			user_principal_name: format!("{first_name}.{last_name}{suffix}@{domain}"),
			password_profile: PasswordProfile {
				password: INITIAL_PASSWORD.into(),
				force_change_password_next_login: true,
			},
			usage_location: Some("US".into()),
		}
	}
}

/// Password settings of a new user.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordProfile {
	/// Initial password.
	pub password: String,
	/// Forces a password change at next sign-in.
	pub force_change_password_next_login: bool,
}
impl Debug for PasswordProfile {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PasswordProfile")
			.field("password", &"<redacted>")
			.field("force_change_password_next_login", &self.force_change_password_next_login)
			.finish()
	}
}

/// Partial update for a user; unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
	/// New job title.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub job_title: Option<String>,
	/// New department.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub department: Option<String>,
	/// New usage location.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage_location: Option<String>,
}

/// Directory group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
	/// Object identifier.
	pub object_id: String,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Description.
	#[serde(default)]
	pub description: Option<String>,
	/// Mail alias.
	#[serde(default)]
	pub mail_nickname: Option<String>,
	/// Whether the group is mail-enabled.
	#[serde(default)]
	pub mail_enabled: Option<bool>,
	/// Whether the group is a security group.
	#[serde(default)]
	pub security_enabled: Option<bool>,
}

/// Payload for creating a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
	/// Display name.
	pub display_name: String,
	/// Description.
	pub description: String,
	/// Mail alias.
	pub mail_nickname: String,
	/// Whether the group is mail-enabled.
	pub mail_enabled: bool,
	/// Whether the group is a security group.
	pub security_enabled: bool,
}
impl NewGroup {
	/// Security group with a randomized name so repeated runs never collide.
	pub fn security(description: impl Into<String>) -> Self {
		Self {
			display_name: format!("newGroup{}", random_suffix(8)),
			description: description.into(),
			mail_nickname: format!("group{}", random_suffix(4)),
			mail_enabled: false,
			security_enabled: true,
		}
	}
}

/// Any directory object, as returned by navigation properties such as `memberOf`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryObject {
	/// OData type, for example `Microsoft.DirectoryServices.Group`.
	#[serde(default, rename = "odata.type")]
	pub odata_type: Option<String>,
	/// Object identifier.
	pub object_id: String,
	/// Display name, for the object types that have one.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Sign-in name, when the object is a user.
	#[serde(default)]
	pub user_principal_name: Option<String>,
}
impl DirectoryObject {
	/// OData type suffix, for example `User` or `Group`.
	pub fn kind(&self) -> &str {
		self.odata_type
			.as_deref()
			.and_then(|ty| ty.rsplit('.').next())
			.unwrap_or("DirectoryObject")
	}

	/// Display name, falling back to the object id.
	pub fn label(&self) -> &str {
		self.display_name.as_deref().unwrap_or(&self.object_id)
	}
}

/// Activated directory role, such as `Company Administrator`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRole {
	/// Object identifier.
	pub object_id: String,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Description.
	#[serde(default)]
	pub description: Option<String>,
	/// Template the role was activated from.
	#[serde(default)]
	pub role_template_id: Option<String>,
}

/// Service principal: an application's instance in this tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
	/// Object identifier.
	pub object_id: String,
	/// Client id of the application it represents.
	#[serde(default)]
	pub app_id: Option<String>,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
}

/// Application registration owned by this tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
	/// Object identifier.
	pub object_id: String,
	/// Client id.
	#[serde(default)]
	pub app_id: Option<String>,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
}

fn random_suffix(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_domain_prefers_the_default_flag() {
		let tenant: TenantDetail = serde_json::from_str(
			r#"{"objectId":"t","verifiedDomains":[{"name":"contoso.onmicrosoft.com","initial":true},{"name":"contoso.com","default":true}]}"#,
		)
		.expect("Tenant fixture should parse.");

		assert_eq!(tenant.default_domain().map(|domain| domain.name.as_str()), Some("contoso.com"));
	}

	#[test]
	fn new_members_follow_the_naming_scheme() {
		let user = NewUser::member("Ada", "Lovelace", "contoso.com");
		let json = serde_json::to_value(&user).expect("User payload should serialize.");

		assert_eq!(json["displayName"], "Ada Lovelace");
		assert_eq!(json["mailNickname"], "AdaLovelace");
		assert_eq!(json["passwordProfile"]["forceChangePasswordNextLogin"], true);
		assert!(user.user_principal_name.starts_with("Ada.Lovelace"));
		assert!(user.user_principal_name.ends_with("@contoso.com"));
		assert!(!format!("{user:?}").contains(INITIAL_PASSWORD));
	}

	#[test]
	fn partial_updates_skip_unset_fields() {
		let update = UserUpdate { job_title: Some("Engineer".into()), ..Default::default() };

		assert_eq!(
			serde_json::to_string(&update).expect("Update should serialize."),
			r#"{"jobTitle":"Engineer"}"#
		);
	}

	#[test]
	fn directory_objects_expose_their_kind() {
		let object: DirectoryObject = serde_json::from_str(
			r#"{"odata.type":"Microsoft.DirectoryServices.User","objectId":"u1","userPrincipalName":"ada@contoso.com"}"#,
		)
		.expect("Member fixture should parse.");

		assert_eq!(object.kind(), "User");
		assert_eq!(object.label(), "u1");
		assert_eq!(object.user_principal_name.as_deref(), Some("ada@contoso.com"));
	}
}
