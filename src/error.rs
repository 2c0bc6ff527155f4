//! Broker-level error types shared across flows, the directory client, and the walkthrough.
//!
//! The taxonomy has three top-level buckets:
//!
//! - [`Error::Config`]: deployment misconfiguration; retrying cannot help until an operator fixes
//!   it.
//! - [`Error::Auth`]: the identity provider (or the interactive step) refused to issue a token.
//!   Callers may retry with backoff.
//! - [`Error::Request`]: a directory call failed after a valid token was obtained.

// self
use crate::{_prelude::*, auth::IdentityMode};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token acquisition failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Directory call failed after a token was obtained.
	#[error(transparent)]
	Request(#[from] RequestError),
}
impl Error {
	/// Returns `true` for configuration errors, which need operator action.
	pub fn is_config(&self) -> bool {
		matches!(self, Self::Config(_))
	}

	/// Returns `true` when the error aborted token acquisition (configuration or auth failure).
	pub fn is_acquisition_failure(&self) -> bool {
		matches!(self, Self::Config(_) | Self::Auth(_))
	}

	/// Returns `true` when a caller-side retry has a chance to succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Config(_) => false,
			Self::Auth(e) => e.is_retryable(),
			Self::Request(e) => e.is_retryable(),
		}
	}

	/// Upstream `Retry-After` hint, when the provider supplied one.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Auth(AuthError::Transient(TransientError::TokenEndpoint {
				retry_after, ..
			})) => *retry_after,
			Self::Request(RequestError::Status { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}
}
impl From<TransientError> for Error {
	fn from(e: TransientError) -> Self {
		Self::Auth(e.into())
	}
}
impl From<TransportError> for Error {
	fn from(e: TransportError) -> Self {
		Self::Auth(e.into())
	}
}
impl From<InteractionError> for Error {
	fn from(e: InteractionError) -> Self {
		Self::Auth(e.into())
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured endpoint could not be parsed or joined.
	#[error("The {endpoint} endpoint is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// A required setting is missing.
	#[error("Required setting `{key}` is missing.")]
	MissingSetting {
		/// Setting (environment variable) name.
		key: &'static str,
	},
	/// A setting holds a value the broker does not understand.
	#[error("Setting `{key}` has an unsupported value `{value}`.")]
	InvalidSetting {
		/// Setting (environment variable) name.
		key: &'static str,
		/// Offending value.
		value: String,
	},
	/// Application mode requires a non-empty client secret.
	#[error("Application client secret is not configured.")]
	MissingClientSecret,
	/// The requested identity mode has no client identifier configured.
	#[error("No client identifier is configured for {mode} mode.")]
	MissingClientId {
		/// Mode that lacks a client identifier.
		mode: IdentityMode,
	},
	/// Delegated-user mode needs an interactive prompt.
	#[error("Delegated-user mode requires an interactive prompt.")]
	MissingPrompt,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token acquisition failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Provider rejected the grant (bad code, expired consent, denied access).
	#[error("Provider rejected the {mode} grant: {reason}.")]
	InvalidGrant {
		/// Mode whose acquisition failed.
		mode: IdentityMode,
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed for {mode} mode: {reason}.")]
	InvalidClient {
		/// Mode whose acquisition failed.
		mode: IdentityMode,
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Consent or scope is missing for the requested resource.
	#[error("Consent is required for {mode} mode: {reason}.")]
	ConsentRequired {
		/// Mode whose acquisition failed.
		mode: IdentityMode,
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The interactive sign-in step failed.
	#[error(transparent)]
	Interaction(#[from] InteractionError),
}
impl AuthError {
	/// Returns `true` when a caller-side retry has a chance to succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures of the interactive (delegated-user) sign-in step.
#[derive(Debug, ThisError)]
pub enum InteractionError {
	/// The user (or prompt implementation) abandoned the sign-in.
	#[error("Interactive sign-in was cancelled.")]
	Cancelled,
	/// The prompt could not read the user's answer.
	#[error("Interactive prompt failed.")]
	Prompt(#[from] std::io::Error),
	/// The redirect could not be parsed as a URL.
	#[error("Redirect `{input}` is not a valid URL.")]
	InvalidRedirect {
		/// Raw text supplied by the prompt.
		input: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The returned `state` does not match the one sent with the authorize request.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// The redirect carries neither a code nor an error.
	#[error("Redirect does not contain an authorization code.")]
	MissingCode,
	/// The authorize endpoint redirected back with an OAuth error.
	#[error("Authorization endpoint returned `{error}`: {description}.")]
	Denied {
		/// OAuth `error` parameter.
		error: String,
		/// OAuth `error_description` parameter, or a placeholder.
		description: String,
	},
}

/// Directory request failures (a token was available, the call itself failed).
#[derive(Debug, ThisError)]
pub enum RequestError {
	/// The directory responded with a non-success status.
	#[error("Directory request failed with HTTP {status}: {message}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Graph error code (for example `Request_ResourceNotFound`).
		code: Option<String>,
		/// Graph error message, or a body preview.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The request never reached the directory.
	#[error("Network error occurred while calling the directory.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The response body could not be decoded.
	#[error("Directory returned a body that could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// The request body could not be encoded.
	#[error("Request body could not be encoded.")]
	Encode(#[source] serde_json::Error),
	/// The HTTP request could not be assembled.
	#[error("Directory request could not be built.")]
	Build(#[source] oauth2::http::Error),
	/// The bearer token cannot be carried in an HTTP header.
	#[error("Access token is not a valid header value.")]
	InvalidHeader(#[from] oauth2::http::header::InvalidHeaderValue),
	/// A request path could not be resolved against the service root.
	#[error("Directory path `{path}` is invalid.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl RequestError {
	/// Wraps a transport-specific failure.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}

	/// Returns `true` for throttling, server-side, and network failures.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Status { status, .. } => *status == 429 || *status >= 500,
			Self::Transport { .. } => true,
			_ => false,
		}
	}
}

/// Renders an error and its whole `source()` chain as `outer: inner: innermost`.
pub fn message_chain(err: &(dyn StdError + 'static)) -> String {
	let mut buf = err.to_string();
	let mut current = err.source();

	while let Some(source) = current {
		let text = source.to_string();

		if !buf.ends_with(&text) {
			if buf.ends_with('.') {
				buf.pop();
			}

			buf.push_str(": ");
			buf.push_str(&text);
		}

		current = source.source();
	}

	buf
}
