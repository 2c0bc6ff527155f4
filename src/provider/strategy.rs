//! Provider strategy hooks that customize token exchanges.
//!
//! Strategies decorate outgoing token requests and map failures into the broker taxonomy
//! without tying flows to any particular HTTP client.

// std
use std::collections::BTreeMap;
// self
use crate::{_prelude::*, provider::GrantType};

/// Strategy hook that allows providers to decorate requests and classify errors.
pub trait ProviderStrategy: Send + Sync {
	/// Maps token-endpoint failures into the broker taxonomy.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds provider-specific form parameters before a token request is dispatched.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}

	/// Adds provider-specific query parameters to the interactive authorize URL.
	fn augment_authorize_request(&self, _query: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant (bad code, bad credentials, denied access).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Admin or user consent is missing for the resource.
	ConsentRequired,
	/// Failure is temporary and may be retried.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level failures.
	pub fn network_failure(grant_type: GrantType) -> Self {
		Self { network_error: true, ..Self::new(grant_type) }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a (truncated) body preview for non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Azure AD (v1 endpoint) strategy.
///
/// Adds the `resource` parameter every v1 token and authorize request needs, and recognizes
/// `AADSTS` codes embedded in error descriptions before falling back to the OAuth `error`
/// field, body hints, and finally the HTTP status.
#[derive(Clone, Debug)]
pub struct AzureAdStrategy {
	resource: String,
}
impl AzureAdStrategy {
	/// Creates a strategy targeting `resource` (for example `https://graph.windows.net`).
	pub fn new(resource: impl Into<String>) -> Self {
		Self { resource: resource.into() }
	}

	/// Resource identifier added to requests.
	pub fn resource(&self) -> &str {
		&self.resource
	}
}
impl Display for AzureAdStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "azure-ad-strategy({})", self.resource)
	}
}
impl ProviderStrategy for AzureAdStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		if let Some(kind) = ctx
			.error_description
			.as_deref()
			.or(ctx.body_preview.as_deref())
			.and_then(classify_aadsts)
		{
			return kind;
		}
		if let Some(kind) = ctx.oauth_error.as_deref().and_then(match_oauth_error) {
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}

	fn augment_token_request(&self, _grant: GrantType, form: &mut BTreeMap<String, String>) {
		form.insert("resource".into(), self.resource.clone());
	}

	fn augment_authorize_request(&self, query: &mut BTreeMap<String, String>) {
		query.insert("resource".into(), self.resource.clone());
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf: String = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

fn classify_aadsts(text: &str) -> Option<ProviderErrorKind> {
	let start = text.find("AADSTS")?;
	let code: String = text[start + 6..].chars().take_while(char::is_ascii_digit).collect();

	match code.as_str() {
		// Consent missing or revoked for the resource.
		"65001" | "65004" | "90094" => Some(ProviderErrorKind::ConsentRequired),
		// Bad or expired secret, unknown application.
		"7000215" | "7000222" | "700016" | "70002" => Some(ProviderErrorKind::InvalidClient),
		// Bad credentials, expired or reused code, user cancelled.
		"50126" | "70008" | "54005" | "50020" => Some(ProviderErrorKind::InvalidGrant),
		// Throttled or provider-side outage.
		"50196" | "90033" => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn match_oauth_error(value: &str) -> Option<ProviderErrorKind> {
	let lowered = value.to_ascii_lowercase();

	match lowered.as_str() {
		"invalid_grant" | "access_denied" => Some(ProviderErrorKind::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(ProviderErrorKind::InvalidClient),
		"consent_required" | "interaction_required" | "invalid_resource" | "invalid_scope" =>
			Some(ProviderErrorKind::ConsentRequired),
		"temporarily_unavailable" | "server_error" => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("consent") || text.contains("invalid_resource") =>
			Some(ProviderErrorKind::ConsentRequired),
		text if text.contains("temporarily_unavailable") => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::ConsentRequired,
		_ => ProviderErrorKind::Transient,
	}
}
