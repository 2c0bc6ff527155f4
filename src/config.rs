//! Static broker configuration: authority, resource, tenant, and per-mode client settings.
//!
//! Configuration is assembled with [`BrokerConfig::builder`], deserialized with serde, or read
//! from `GRAPH_*` environment variables through [`BrokerConfig::from_env`]. Secrets never
//! appear in `Debug` output.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, IdentityMode, TenantId},
	error::ConfigError,
};

/// Environment variable holding the tenant identifier (required).
pub const ENV_TENANT_ID: &str = "GRAPH_TENANT_ID";
/// Environment variable holding the application-mode client identifier.
pub const ENV_APP_CLIENT_ID: &str = "GRAPH_APP_CLIENT_ID";
/// Environment variable holding the application-mode client secret.
pub const ENV_APP_CLIENT_SECRET: &str = "GRAPH_APP_CLIENT_SECRET";
/// Environment variable holding the delegated-user client identifier.
pub const ENV_USER_CLIENT_ID: &str = "GRAPH_USER_CLIENT_ID";
/// Environment variable overriding the delegated-user authority tenant.
pub const ENV_USER_AUTHORITY_TENANT: &str = "GRAPH_USER_AUTHORITY_TENANT";
/// Environment variable overriding the resource (audience) URL.
pub const ENV_RESOURCE_URL: &str = "GRAPH_RESOURCE_URL";
/// Environment variable overriding the authority base URL.
pub const ENV_AUTHORITY_URL: &str = "GRAPH_AUTHORITY_URL";
/// Environment variable overriding the delegated-user redirect URI.
pub const ENV_REDIRECT_URI: &str = "GRAPH_REDIRECT_URI";
/// Environment variable overriding the interactive prompt policy.
pub const ENV_PROMPT: &str = "GRAPH_PROMPT";
/// Environment variable overriding the Graph `api-version`.
pub const ENV_API_VERSION: &str = "GRAPH_API_VERSION";

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/";
const DEFAULT_RESOURCE: &str = "https://graph.windows.net";
const DEFAULT_REDIRECT: &str = "https://localhost";
const DEFAULT_USER_AUTHORITY_TENANT: &str = "common";
const DEFAULT_API_VERSION: &str = "1.6";

/// How aggressively the authorize endpoint should prompt the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPolicy {
	/// Always ask for credentials, ignoring any existing session.
	#[default]
	Login,
	/// Let the user pick among signed-in accounts.
	SelectAccount,
	/// Force the consent screen.
	Consent,
	/// Let the provider decide; no `prompt` parameter is sent.
	Auto,
}
impl PromptPolicy {
	/// Value of the `prompt` query parameter, if any.
	pub const fn as_param(self) -> Option<&'static str> {
		match self {
			PromptPolicy::Login => Some("login"),
			PromptPolicy::SelectAccount => Some("select_account"),
			PromptPolicy::Consent => Some("consent"),
			PromptPolicy::Auto => None,
		}
	}
}
impl FromStr for PromptPolicy {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"login" | "always" => Ok(Self::Login),
			"select_account" => Ok(Self::SelectAccount),
			"consent" => Ok(Self::Consent),
			"auto" | "none" => Ok(Self::Auto),
			other => Err(ConfigError::InvalidSetting { key: ENV_PROMPT, value: other.to_owned() }),
		}
	}
}

/// Credentials for the non-interactive application identity.
#[derive(Clone, Default, Deserialize)]
pub struct ApplicationCredentials {
	/// Registered client identifier.
	#[serde(default)]
	pub client_id: Option<ClientId>,
	/// Client secret; validated lazily when an application token is requested.
	#[serde(default)]
	pub client_secret: Option<String>,
}
impl ApplicationCredentials {
	/// Returns the secret when it is set and not blank.
	pub fn usable_secret(&self) -> Option<&str> {
		self.client_secret.as_deref().filter(|secret| !secret.trim().is_empty())
	}
}
impl Debug for ApplicationCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApplicationCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.usable_secret().is_some())
			.finish()
	}
}

/// Settings for the interactive delegated-user identity.
#[derive(Clone, Debug, Deserialize)]
pub struct DelegatedUserSettings {
	/// Registered (public) client identifier.
	#[serde(default)]
	pub client_id: Option<ClientId>,
	/// Authority tenant segment used for sign-in (`common` accepts any work account).
	#[serde(default = "default_user_authority_tenant")]
	pub authority_tenant: TenantId,
	/// Redirect URI registered for the client.
	#[serde(default = "default_redirect")]
	pub redirect_uri: Url,
	/// Prompt policy for the authorize request.
	#[serde(default)]
	pub prompt: PromptPolicy,
}
impl Default for DelegatedUserSettings {
	fn default() -> Self {
		Self {
			client_id: None,
			authority_tenant: default_user_authority_tenant(),
			redirect_uri: default_redirect(),
			prompt: PromptPolicy::default(),
		}
	}
}

/// Complete broker configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct BrokerConfig {
	/// Directory tenant; used for the application authority and the directory service root.
	pub tenant: TenantId,
	/// Authority base URL (for example `https://login.microsoftonline.com/`).
	#[serde(default = "default_authority")]
	pub authority: Url,
	/// Resource (audience) URL; also the base of the directory service root.
	#[serde(default = "default_resource")]
	pub resource: Url,
	/// Graph `api-version` query value appended to every directory request.
	#[serde(default = "default_api_version")]
	pub api_version: String,
	/// Application identity settings.
	#[serde(default)]
	pub application: ApplicationCredentials,
	/// Delegated-user identity settings.
	#[serde(default)]
	pub delegated: DelegatedUserSettings,
}
impl BrokerConfig {
	/// Creates a builder seeded with defaults for the provided tenant.
	pub fn builder(tenant: TenantId) -> BrokerConfigBuilder {
		BrokerConfigBuilder::new(tenant)
	}

	/// Reads configuration from `GRAPH_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads configuration through an arbitrary key lookup; blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let tenant = get(ENV_TENANT_ID).ok_or(ConfigError::MissingSetting { key: ENV_TENANT_ID })?;
		let mut builder = Self::builder(TenantId::new(tenant.trim())?);

		if let Some(value) = get(ENV_AUTHORITY_URL) {
			builder = builder.authority(parse_url("authority", &value)?);
		}
		if let Some(value) = get(ENV_RESOURCE_URL) {
			builder = builder.resource(parse_url("resource", &value)?);
		}
		if let Some(value) = get(ENV_API_VERSION) {
			builder = builder.api_version(value.trim());
		}
		if let Some(value) = get(ENV_APP_CLIENT_ID) {
			builder = builder.application_client_id(ClientId::new(value.trim())?);
		}
		// Kept verbatim so a blank secret is reported when an application token is requested.
		if let Some(value) = lookup(ENV_APP_CLIENT_SECRET) {
			builder = builder.application_client_secret(value);
		}
		if let Some(value) = get(ENV_USER_CLIENT_ID) {
			builder = builder.user_client_id(ClientId::new(value.trim())?);
		}
		if let Some(value) = get(ENV_USER_AUTHORITY_TENANT) {
			builder = builder.user_authority_tenant(TenantId::new(value.trim())?);
		}
		if let Some(value) = get(ENV_REDIRECT_URI) {
			let redirect = Url::parse(value.trim())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;

			builder = builder.redirect_uri(redirect);
		}
		if let Some(value) = get(ENV_PROMPT) {
			builder = builder.prompt(value.parse()?);
		}

		builder.build()
	}

	/// Checks endpoint schemes and that at least one identity is usable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("authority", &self.authority)?;
		validate_endpoint("resource", &self.resource)?;
		validate_endpoint("redirect", &self.delegated.redirect_uri)?;

		if self.application.client_id.is_none() && self.delegated.client_id.is_none() {
			return Err(ConfigError::MissingSetting { key: ENV_APP_CLIENT_ID });
		}
		if self.api_version.trim().is_empty() {
			return Err(ConfigError::MissingSetting { key: ENV_API_VERSION });
		}

		Ok(())
	}

	/// Client identifier configured for `mode`.
	pub fn client_id(&self, mode: IdentityMode) -> Result<&ClientId, ConfigError> {
		let client_id = match mode {
			IdentityMode::Application => self.application.client_id.as_ref(),
			IdentityMode::DelegatedUser => self.delegated.client_id.as_ref(),
		};

		client_id.ok_or(ConfigError::MissingClientId { mode })
	}

	/// Authority tenant segment used by `mode`.
	pub fn authority_tenant(&self, mode: IdentityMode) -> &TenantId {
		match mode {
			IdentityMode::Application => &self.tenant,
			IdentityMode::DelegatedUser => &self.delegated.authority_tenant,
		}
	}

	/// `{authority}/{tenant}/oauth2/token` for `mode`.
	pub fn token_endpoint(&self, mode: IdentityMode) -> Result<Url, ConfigError> {
		self.authority_endpoint(mode, "oauth2/token", "token")
	}

	/// `{authority}/{tenant}/oauth2/authorize` for `mode`.
	pub fn authorize_endpoint(&self, mode: IdentityMode) -> Result<Url, ConfigError> {
		self.authority_endpoint(mode, "oauth2/authorize", "authorize")
	}

	/// Resource identifier sent with token requests (no trailing slash).
	pub fn resource_id(&self) -> &str {
		self.resource.as_str().trim_end_matches('/')
	}

	/// `{resource}/{tenant}/`, the base URL for directory calls.
	pub fn service_root(&self) -> Result<Url, ConfigError> {
		with_trailing_slash(self.resource.clone())
			.join(&format!("{}/", self.tenant))
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "service root", source })
	}

	fn authority_endpoint(
		&self,
		mode: IdentityMode,
		suffix: &str,
		endpoint: &'static str,
	) -> Result<Url, ConfigError> {
		with_trailing_slash(self.authority.clone())
			.join(&format!("{}/{suffix}", self.authority_tenant(mode)))
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })
	}
}

/// Builder for [`BrokerConfig`] values.
#[derive(Debug)]
pub struct BrokerConfigBuilder {
	config: BrokerConfig,
}
impl BrokerConfigBuilder {
	/// Creates a new builder seeded with defaults.
	pub fn new(tenant: TenantId) -> Self {
		Self {
			config: BrokerConfig {
				tenant,
				authority: default_authority(),
				resource: default_resource(),
				api_version: default_api_version(),
				application: ApplicationCredentials::default(),
				delegated: DelegatedUserSettings::default(),
			},
		}
	}

	/// Overrides the authority base URL.
	pub fn authority(mut self, url: Url) -> Self {
		self.config.authority = url;

		self
	}

	/// Overrides the resource URL.
	pub fn resource(mut self, url: Url) -> Self {
		self.config.resource = url;

		self
	}

	/// Overrides the Graph `api-version`.
	pub fn api_version(mut self, version: impl Into<String>) -> Self {
		self.config.api_version = version.into();

		self
	}

	/// Sets the application-mode client identifier.
	pub fn application_client_id(mut self, client_id: ClientId) -> Self {
		self.config.application.client_id = Some(client_id);

		self
	}

	/// Sets the application-mode client secret.
	pub fn application_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.config.application.client_secret = Some(secret.into());

		self
	}

	/// Sets the delegated-user client identifier.
	pub fn user_client_id(mut self, client_id: ClientId) -> Self {
		self.config.delegated.client_id = Some(client_id);

		self
	}

	/// Overrides the delegated-user authority tenant.
	pub fn user_authority_tenant(mut self, tenant: TenantId) -> Self {
		self.config.delegated.authority_tenant = tenant;

		self
	}

	/// Overrides the delegated-user redirect URI.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.config.delegated.redirect_uri = url;

		self
	}

	/// Overrides the interactive prompt policy.
	pub fn prompt(mut self, prompt: PromptPolicy) -> Self {
		self.config.delegated.prompt = prompt;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn default_authority() -> Url {
	Url::parse(DEFAULT_AUTHORITY).expect("Default authority URL is valid.")
}

fn default_resource() -> Url {
	Url::parse(DEFAULT_RESOURCE).expect("Default resource URL is valid.")
}

fn default_redirect() -> Url {
	Url::parse(DEFAULT_REDIRECT).expect("Default redirect URL is valid.")
}

fn default_user_authority_tenant() -> TenantId {
	TenantId::new(DEFAULT_USER_AUTHORITY_TENANT).expect("Default authority tenant is valid.")
}

fn default_api_version() -> String {
	DEFAULT_API_VERSION.into()
}

fn parse_url(endpoint: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value.trim()).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })
}

fn with_trailing_slash(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |key| map.get(key).cloned()
	}

	#[test]
	fn defaults_match_azure_ad_v1() {
		let config = BrokerConfig::from_lookup(lookup(&[
			(ENV_TENANT_ID, "contoso.onmicrosoft.com"),
			(ENV_APP_CLIENT_ID, "app"),
		]))
		.expect("Minimal configuration should load.");

		assert_eq!(config.resource_id(), "https://graph.windows.net");
		assert_eq!(config.api_version, "1.6");
		assert_eq!(config.delegated.prompt, PromptPolicy::Login);
		assert_eq!(
			config.token_endpoint(IdentityMode::Application).expect("Endpoint should join.").as_str(),
			"https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/token"
		);
		assert_eq!(
			config
				.authorize_endpoint(IdentityMode::DelegatedUser)
				.expect("Endpoint should join.")
				.as_str(),
			"https://login.microsoftonline.com/common/oauth2/authorize"
		);
		assert_eq!(
			config.service_root().expect("Service root should join.").as_str(),
			"https://graph.windows.net/contoso.onmicrosoft.com/"
		);
	}

	#[test]
	fn authority_without_trailing_slash_keeps_its_path() {
		let config = BrokerConfig::from_lookup(lookup(&[
			(ENV_TENANT_ID, "t1"),
			(ENV_USER_CLIENT_ID, "user"),
			(ENV_AUTHORITY_URL, "https://login.example.com/base"),
			(ENV_PROMPT, "select_account"),
		]))
		.expect("Configuration should load.");

		assert_eq!(
			config.token_endpoint(IdentityMode::DelegatedUser).expect("Endpoint should join.").as_str(),
			"https://login.example.com/base/common/oauth2/token"
		);
		assert_eq!(config.delegated.prompt, PromptPolicy::SelectAccount);
		assert!(matches!(
			config.client_id(IdentityMode::Application),
			Err(ConfigError::MissingClientId { mode: IdentityMode::Application })
		));
	}

	#[test]
	fn missing_or_invalid_settings_are_reported() {
		assert!(matches!(
			BrokerConfig::from_lookup(lookup(&[])),
			Err(ConfigError::MissingSetting { key: ENV_TENANT_ID })
		));
		assert!(matches!(
			BrokerConfig::from_lookup(lookup(&[(ENV_TENANT_ID, "t1")])),
			Err(ConfigError::MissingSetting { .. })
		));
		assert!(matches!(
			BrokerConfig::from_lookup(lookup(&[
				(ENV_TENANT_ID, "t1"),
				(ENV_APP_CLIENT_ID, "app"),
				(ENV_AUTHORITY_URL, "http://login.example.com/"),
			])),
			Err(ConfigError::InsecureEndpoint { endpoint: "authority", .. })
		));
		assert!(matches!(
			BrokerConfig::from_lookup(lookup(&[
				(ENV_TENANT_ID, "t1"),
				(ENV_APP_CLIENT_ID, "app"),
				(ENV_PROMPT, "sometimes"),
			])),
			Err(ConfigError::InvalidSetting { key: ENV_PROMPT, .. })
		));
	}

	#[test]
	fn blank_secret_is_kept_but_unusable() {
		let config = BrokerConfig::from_lookup(lookup(&[
			(ENV_TENANT_ID, "t1"),
			(ENV_APP_CLIENT_ID, "app"),
			(ENV_APP_CLIENT_SECRET, "   "),
		]))
		.expect("Blank secret should not fail loading.");

		assert_eq!(config.application.client_secret.as_deref(), Some("   "));
		assert!(config.application.usable_secret().is_none());
		assert!(format!("{:?}", config.application).contains("client_secret_set: false"));
	}

	#[test]
	fn deserializes_with_defaults() {
		let config: BrokerConfig = serde_json::from_str(
			r#"{"tenant":"t1","application":{"client_id":"app","client_secret":"s3cret"}}"#,
		)
		.expect("Configuration JSON should deserialize.");

		config.validate().expect("Deserialized configuration should validate.");

		assert_eq!(config.application.usable_secret(), Some("s3cret"));
		assert_eq!(config.delegated.redirect_uri.as_str(), "https://localhost/");
		assert!(!format!("{config:?}").contains("s3cret"));
	}
}
