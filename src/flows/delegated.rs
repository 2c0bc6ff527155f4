//! Delegated-user identity: interactive Authorization Code + PKCE sign-in.
//!
//! The broker builds the authorize URL, hands it to the installed [`InteractivePrompt`], and
//! validates the redirect the prompt reports back before exchanging the code. The prompt runs
//! once per acquisition and is never retried by the broker.

mod prompt;
mod session;

pub use prompt::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, IdentityMode, UserInfo},
	error::ConfigError,
	flows::Broker,
	http::GraphHttpClient,
	oauth::{AzureFacade, OAuth2Facade, TransportErrorMapper},
	obs,
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + GraphHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs the interactive sign-in and the `authorization_code` exchange.
	pub(super) async fn acquire_delegated(&self) -> Result<AccessToken> {
		let mode = IdentityMode::DelegatedUser;
		let client_id = self.config.client_id(mode)?;
		let prompt = self.prompt.clone().ok_or(ConfigError::MissingPrompt)?;
		let facade: AzureFacade<C, M> = AzureFacade::for_mode(
			&self.config,
			mode,
			None,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;
		let session = AuthorizationSession::start(
			self.config.authorize_endpoint(mode)?,
			client_id,
			&self.config.delegated,
			self.strategy.as_ref(),
		);
		let redirect = prompt.authorize(session.request())?;
		let code = session.complete(&redirect)?;
		let extra_params = self.token_request_params(mode);
		let issued = facade
			.exchange_authorization_code(
				self.strategy.as_ref(),
				&code,
				session.pkce_verifier(),
				session.redirect_uri(),
				&extra_params,
			)
			.await?;
		let mut token = issued.token;
		let user = match issued.id_token.as_deref().map(UserInfo::from_id_token) {
			Some(Ok(user)) => Some(user),
			Some(Err(e)) => {
				obs::emit_id_token_unreadable(mode, &e.to_string());

				None
			},
			None => None,
		};

		obs::emit_welcome(mode, &user.clone().unwrap_or_default().welcome_message());

		if let Some(user) = user {
			token = token.with_user(user);
		}

		Ok(token)
	}
}
