//! OAuth client facade over the `oauth2` crate, specialised for Azure AD v1 endpoints.
//!
//! Azure AD v1 token responses deviate from RFC 6749 in small ways (`expires_in` arrives as a
//! string, `token_type` is occasionally missing behind proxies), so the facade parses them with
//! the lenient [`GraphTokenResponse`] instead of the stock `BasicTokenResponse`.

pub use oauth2;

// std
use std::{borrow::Cow, time::Duration as StdDuration};
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId as OAuthClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	Scope, StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
use serde::{Deserializer, de::Error as _};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, IdentityMode},
	config::BrokerConfig,
	error::{AuthError, ConfigError, TransientError, TransportError},
	http::{GraphHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{GrantType, ProviderErrorContext, ProviderErrorKind, ProviderStrategy},
};

type GraphOAuthClient = oauth2::Client<
	BasicErrorResponse,
	GraphTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_strategy: &dyn ProviderStrategy,
		_grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unrecognised transport failure"),
		}
	}
}

/// Token endpoint response as returned by Azure AD v1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphTokenResponse {
	access_token: oauth2::AccessToken,
	#[serde(default = "default_token_type")]
	token_type: BasicTokenType,
	#[serde(default, deserialize_with = "deserialize_lenient_seconds")]
	expires_in: Option<u64>,
	#[serde(default)]
	refresh_token: Option<RefreshToken>,
	/// OpenID Connect ID token; present for interactive sign-ins.
	#[serde(default)]
	pub id_token: Option<String>,
	/// Resource the token was minted for.
	#[serde(default)]
	pub resource: Option<String>,
}
impl TokenResponse for GraphTokenResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &oauth2::AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &Self::TokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<StdDuration> {
		self.expires_in.map(StdDuration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		None
	}
}

/// Token returned by a successful exchange.
#[derive(Debug)]
pub(crate) struct IssuedToken {
	pub(crate) token: AccessToken,
	pub(crate) id_token: Option<String>,
}

pub(crate) trait OAuth2Facade {
	fn exchange_client_credentials<'a, 'strategy, 'params>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		extra_params: &'params [(String, String)],
	) -> FacadeFuture<'a, IssuedToken>
	where
		'strategy: 'a,
		'params: 'a;

	fn exchange_authorization_code<'a, 'strategy, 'code, 'pkce, 'redirect, 'params>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		code: &'code str,
		pkce_verifier: &'pkce str,
		redirect_uri: &'redirect Url,
		extra_params: &'params [(String, String)],
	) -> FacadeFuture<'a, IssuedToken>
	where
		'strategy: 'a,
		'code: 'a,
		'pkce: 'a,
		'redirect: 'a,
		'params: 'a;
}

pub(crate) struct AzureFacade<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: GraphOAuthClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> AzureFacade<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a client for `mode`; the secret is attached only when provided.
	pub(crate) fn for_mode(
		config: &BrokerConfig,
		mode: IdentityMode,
		client_secret: Option<&str>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let client_id = config.client_id(mode)?;
		let auth_url = AuthUrl::from_url(config.authorize_endpoint(mode)?);
		let token_url = TokenUrl::from_url(config.token_endpoint(mode)?);
		let mut oauth_client: GraphOAuthClient = oauth2::Client::<
			BasicErrorResponse,
			GraphTokenResponse,
			BasicTokenIntrospectionResponse,
			StandardRevocableToken,
			BasicRevocationErrorResponse,
		>::new(OAuthClientId::new(client_id.to_string()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> OAuth2Facade for AzureFacade<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_client_credentials<'a, 'strategy, 'params>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		extra_params: &'params [(String, String)],
	) -> FacadeFuture<'a, IssuedToken>
	where
		'strategy: 'a,
		'params: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = self.oauth_client.exchange_client_credentials();

			for (key, value) in extra_params {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::ClientCredentials,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(IdentityMode::Application, response)
		})
	}

	fn exchange_authorization_code<'a, 'strategy, 'code, 'pkce, 'redirect, 'params>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		code: &'code str,
		pkce_verifier: &'pkce str,
		redirect_uri: &'redirect Url,
		extra_params: &'params [(String, String)],
	) -> FacadeFuture<'a, IssuedToken>
	where
		'strategy: 'a,
		'code: 'a,
		'pkce: 'a,
		'redirect: 'a,
		'params: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::from_url(redirect_uri.clone());
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			for (key, value) in extra_params {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::AuthorizationCode,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(IdentityMode::DelegatedUser, response)
		})
	}
}

fn default_token_type() -> BasicTokenType {
	BasicTokenType::Bearer
}

fn deserialize_lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(u64),
		Text(String),
	}

	match Option::<Raw>::deserialize(deserializer)? {
		None => Ok(None),
		Some(Raw::Number(secs)) => Ok(Some(secs)),
		Some(Raw::Text(text)) => text.trim().parse().map(Some).map_err(D::Error::custom),
	}
}

fn map_token_response(mode: IdentityMode, response: GraphTokenResponse) -> Result<IssuedToken> {
	let mut token = AccessToken::new(mode, response.access_token().secret().to_owned());

	if let Some(expires_in) = response.expires_in() {
		let secs = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);

		token = token.with_expires_in(Duration::seconds(secs));
	}

	Ok(IssuedToken { token, id_token: response.id_token })
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(strategy, grant, meta_ref, error),
		RequestTokenError::Parse(error, body) => match meta_status(meta_ref) {
			Some(status) if status >= 400 => {
				let ctx = ProviderErrorContext::new(grant)
					.with_http_status(status)
					.with_body_preview(String::from_utf8_lossy(&body));

				classified_error(strategy, grant, &ctx, status_message(status), meta_ref)
			},
			status => TransientError::TokenResponseParse { source: error, status }.into(),
		},
		RequestTokenError::Other(message) => match meta_status(meta_ref) {
			Some(status) if status >= 400 => {
				let ctx = ProviderErrorContext::new(grant).with_http_status(status);

				classified_error(strategy, grant, &ctx, status_message(status), meta_ref)
			},
			status => TransientError::TokenEndpoint {
				message,
				status,
				retry_after: meta_retry_after(meta_ref),
			}
			.into(),
		},
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx =
		ProviderErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_string(),
	};

	classified_error(strategy, grant, &ctx, message, meta)
}

fn classified_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	ctx: &ProviderErrorContext,
	reason: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mode = grant.mode();

	match strategy.classify_token_error(ctx) {
		ProviderErrorKind::InvalidGrant => AuthError::InvalidGrant { mode, reason }.into(),
		ProviderErrorKind::InvalidClient => AuthError::InvalidClient { mode, reason }.into(),
		ProviderErrorKind::ConsentRequired => AuthError::ConsentRequired { mode, reason }.into(),
		ProviderErrorKind::Transient => TransientError::TokenEndpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn status_message(status: u16) -> String {
	format!("token endpoint answered HTTP {status}")
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
