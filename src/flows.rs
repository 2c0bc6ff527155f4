//! Credential broker: per-mode token acquisition, caching, and directory client hand-out.
//!
//! [`Broker::token`] returns the cached token for a mode or runs the mode's acquisition flow
//! exactly once, even under concurrent first use, and caches only successes. A failed
//! acquisition leaves the slot empty so the next call starts over.

pub mod delegated;

mod application;

pub use delegated::*;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, IdentityMode},
	cache::{CacheState, TokenCache},
	config::BrokerConfig,
	directory::{DirectoryClient, TokenFuture, TokenProvider},
	error,
	http::GraphHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowOutcome, FlowSpan},
	provider::{AzureAdStrategy, ProviderStrategy},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Obtains and memoizes tokens for the application and delegated-user identities.
///
/// The broker owns the HTTP client, configuration, provider strategy, and token cache so the
/// grant-specific flows only deal with request shapes. Clones share the cache, and with it the
/// per-mode singleflight guards.
pub struct Broker<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Static client configuration.
	pub config: Arc<BrokerConfig>,
	/// Strategy responsible for provider-specific token request adjustments.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Token cache holding one slot per identity mode.
	pub cache: Arc<TokenCache>,
	prompt: Option<Arc<dyn InteractivePrompt>>,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: BrokerConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let strategy = Arc::new(AzureAdStrategy::new(config.resource_id()));

		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			config: Arc::new(config),
			strategy,
			cache: Default::default(),
			prompt: None,
		}
	}

	/// Replaces the token cache, for example to share one cache between brokers.
	///
	/// Brokers sharing a cache also share its acquisition guards, so concurrent first use still
	/// performs one acquisition per mode.
	pub fn with_cache(mut self, cache: Arc<TokenCache>) -> Self {
		self.cache = cache;

		self
	}

	/// Installs the interactive step used by delegated-user acquisition.
	pub fn with_prompt(mut self, prompt: impl 'static + InteractivePrompt) -> Self {
		self.prompt = Some(Arc::new(prompt));

		self
	}

	/// Replaces the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Returns the token for `mode`, acquiring and caching it on first use.
	///
	/// Concurrent callers for the same mode share one acquisition. Failures are returned to
	/// every waiting caller in turn and never cached.
	pub async fn token(&self, mode: IdentityMode) -> Result<AccessToken> {
		if let Some(token) = self.cache_hit(mode) {
			return Ok(token);
		}

		let span = FlowSpan::new(mode, "token");

		span.instrument(async move {
			let guard = self.cache.acquisition_guard(mode);
			let _singleflight = guard.lock().await;

			if let Some(token) = self.cache_hit(mode) {
				return Ok(token);
			}

			obs::record_acquisition(mode, FlowOutcome::Attempt);

			let result = match mode {
				IdentityMode::Application => self.acquire_application().await,
				IdentityMode::DelegatedUser => self.acquire_delegated().await,
			};

			match result {
				Ok(token) => {
					obs::record_acquisition(mode, FlowOutcome::Success);

					Ok(self.cache.insert(token))
				},
				Err(e) => {
					obs::record_acquisition(mode, FlowOutcome::Failure);
					obs::emit_acquisition_failure(mode, &error::message_chain(&e));

					Err(e)
				},
			}
		})
		.await
	}

	/// Returns a directory client bound to `mode` without performing any network I/O.
	///
	/// The client asks this broker for a token on its first request.
	pub fn client(&self, mode: IdentityMode) -> Result<DirectoryClient<C>> {
		let service_root = self.config.service_root()?;
		let provider: Arc<dyn TokenProvider> =
			Arc::new(ModeTokenProvider { broker: self.clone(), mode });

		Ok(DirectoryClient::new(
			mode,
			service_root,
			self.config.api_version.clone(),
			provider,
			self.http_client.clone(),
		))
	}

	/// Cached token for `mode`, without acquiring.
	pub fn cached(&self, mode: IdentityMode) -> Option<AccessToken> {
		self.cache.get(mode)
	}

	/// Reports whether `mode` is empty, being acquired, or cached.
	pub fn cache_state(&self, mode: IdentityMode) -> CacheState {
		self.cache.state(mode)
	}

	fn cache_hit(&self, mode: IdentityMode) -> Option<AccessToken> {
		let token = self.cache.get(mode)?;

		obs::record_acquisition(mode, FlowOutcome::CacheHit);
		obs::emit_cache_hit(mode);

		Some(token)
	}

	/// Flattens the strategy's form additions for `oauth2`'s extra-parameter API.
	fn token_request_params(&self, mode: IdentityMode) -> Vec<(String, String)> {
		let grant = crate::provider::GrantType::for_mode(mode);
		let mut form = BTreeMap::new();

		self.strategy.augment_token_request(grant, &mut form);

		form.into_iter()
			.filter(|(key, _)| {
				!matches!(key.as_str(), "grant_type" | "code" | "redirect_uri" | "client_id")
			})
			.collect()
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest-backed transport.
	pub fn new(config: BrokerConfig) -> Self {
		Self::with_http_client(
			config,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for Broker<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			config: self.config.clone(),
			strategy: self.strategy.clone(),
			cache: self.cache.clone(),
			prompt: self.prompt.clone(),
		}
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("config", &self.config)
			.field("cache", &self.cache)
			.field("prompt_set", &self.prompt.is_some())
			.finish()
	}
}

struct ModeTokenProvider<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	broker: Broker<C, M>,
	mode: IdentityMode,
}
impl<C, M> TokenProvider for ModeTokenProvider<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn mode(&self) -> IdentityMode {
		self.mode
	}

	fn token(&self) -> TokenFuture<'_> {
		Box::pin(self.broker.token(self.mode))
	}
}
