//! Fixtures shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	io,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use graph_broker::{
	auth::{ClientId, TenantId},
	config::BrokerConfig,
	error::{Error, InteractionError, TransportError},
	flows::{AuthorizationRequest, Broker, ReqwestBroker},
	http::{GraphHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	provider::{GrantType, ProviderStrategy},
	url::{Url, form_urlencoded},
};
use httpmock::prelude::*;

pub const TENANT: &str = "contoso-tenant";
pub const APP_CLIENT_ID: &str = "app-client";
pub const APP_CLIENT_SECRET: &str = "app-secret";
pub const USER_CLIENT_ID: &str = "user-client";
pub const APP_TOKEN_PATH: &str = "/contoso-tenant/oauth2/token";
pub const USER_TOKEN_PATH: &str = "/common/oauth2/token";
pub const SERVICE_ROOT_PATH: &str = "/graph/contoso-tenant";

/// Configuration pointing every endpoint at `server`.
pub fn config(server: &MockServer, secret: Option<&str>) -> BrokerConfig {
	config_at(&server.base_url(), secret)
}

/// Configuration pointing every endpoint at `base` (for example a closed port).
pub fn config_at(base: &str, secret: Option<&str>) -> BrokerConfig {
	let mut builder = BrokerConfig::builder(
		TenantId::new(TENANT).expect("Tenant fixture should be valid."),
	)
	.authority(Url::parse(&format!("{base}/")).expect("Authority fixture should parse."))
	.resource(Url::parse(&format!("{base}/graph")).expect("Resource fixture should parse."))
	.application_client_id(ClientId::new(APP_CLIENT_ID).expect("Client fixture should be valid."))
	.user_client_id(ClientId::new(USER_CLIENT_ID).expect("Client fixture should be valid."));

	if let Some(secret) = secret {
		builder = builder.application_client_secret(secret);
	}

	builder.build().expect("Test configuration should validate.")
}

/// Reqwest-backed broker against `server` with the application secret configured.
pub fn broker(server: &MockServer) -> ReqwestBroker {
	Broker::new(config(server, Some(APP_CLIENT_SECRET)))
}

/// Form-encoded `resource` parameter the broker sends for `server`.
pub fn resource_param(server: &MockServer) -> String {
	let resource = format!("{}/graph", server.base_url());

	format!("resource={}", form_urlencoded::byte_serialize(resource.as_bytes()).collect::<String>())
}

/// Unsigned compact JWT carrying `claims`.
pub fn id_token(claims: &str) -> String {
	format!("eyJhbGciOiJub25lIn0.{}.", URL_SAFE_NO_PAD.encode(claims))
}

/// Prompt that approves the sign-in with `code`, echoing the request's state.
pub fn approving_prompt(
	code: &'static str,
	calls: Arc<AtomicUsize>,
) -> impl Fn(&AuthorizationRequest) -> Result<String, InteractionError> + Send + Sync {
	move |request: &AuthorizationRequest| {
		calls.fetch_add(1, Ordering::SeqCst);

		let state = request
			.authorize_url
			.query_pairs()
			.find(|(key, _)| key == "state")
			.map(|(_, value)| value.into_owned())
			.expect("Authorize URL should carry a state.");

		Ok(format!("{}?code={code}&state={state}", request.redirect_uri))
	}
}

/// Transport that counts requests and fails every one of them.
#[derive(Clone, Debug, Default)]
pub struct CountingHttpClient {
	pub calls: Arc<AtomicUsize>,
}
impl CountingHttpClient {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl GraphHttpClient for CountingHttpClient {
	type Handle = CountingHandle;
	type TransportError = io::Error;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		CountingHandle { calls: self.calls.clone(), slot }
	}
}

#[derive(Clone, Debug)]
pub struct CountingHandle {
	calls: Arc<AtomicUsize>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for CountingHandle {
	type Error = HttpClientError<io::Error>;
	type Future = std::pin::Pin<
		Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>,
	>;

	fn call(&'c self, _request: HttpRequest) -> Self::Future {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.slot.take();

		Box::pin(async {
			Err(HttpClientError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "offline")))
		})
	}
}

/// Mapper for [`CountingHttpClient`].
#[derive(Clone, Debug, Default)]
pub struct IoErrorMapper;
impl TransportErrorMapper<io::Error> for IoErrorMapper {
	fn map_transport_error(
		&self,
		_strategy: &dyn ProviderStrategy,
		_grant: GrantType,
		_metadata: Option<&ResponseMetadata>,
		error: HttpClientError<io::Error>,
	) -> Error {
		TransportError::network(error).into()
	}
}

/// Broker over a [`CountingHttpClient`].
pub fn counting_broker(
	config: BrokerConfig,
) -> (Broker<CountingHttpClient, IoErrorMapper>, CountingHttpClient) {
	let http_client = CountingHttpClient::default();
	let broker = Broker::with_http_client(config, http_client.clone(), IoErrorMapper);

	(broker, http_client)
}
