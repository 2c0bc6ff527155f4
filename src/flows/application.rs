//! Application identity: the `client_credentials` grant with the configured app secret.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, IdentityMode},
	error::ConfigError,
	flows::Broker,
	http::GraphHttpClient,
	oauth::{AzureFacade, OAuth2Facade, TransportErrorMapper},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs the `client_credentials` grant.
	///
	/// A missing or blank secret fails before any request is built.
	pub(super) async fn acquire_application(&self) -> Result<AccessToken> {
		let mode = IdentityMode::Application;
		let secret =
			self.config.application.usable_secret().ok_or(ConfigError::MissingClientSecret)?;
		let facade: AzureFacade<C, M> = AzureFacade::for_mode(
			&self.config,
			mode,
			Some(secret),
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;
		let extra_params = self.token_request_params(mode);
		let issued =
			facade.exchange_client_credentials(self.strategy.as_ref(), &extra_params).await?;

		Ok(issued.token)
	}
}
