//! Request signing contracts that attach broker-issued tokens to outbound requests.

// crates.io
use oauth2::{
	HttpRequest,
	http::header::{AUTHORIZATION, HeaderValue},
};
// self
use crate::{auth::AccessToken, error::RequestError};

/// Describes how to attach an [`AccessToken`] to an outbound request without constraining the
/// HTTP client type.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the provided request and injects authorization state derived from `token`.
	fn attach_token(&self, request: Request, token: &AccessToken) -> Result<Request, Error>;
}

/// Sets `Authorization: Bearer <token>` on [`HttpRequest`] values.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl RequestSignerExt<HttpRequest, RequestError> for BearerSigner {
	fn attach_token(
		&self,
		mut request: HttpRequest,
		token: &AccessToken,
	) -> Result<HttpRequest, RequestError> {
		let mut value = HeaderValue::from_str(&token.secret.bearer_header())?;

		value.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, value);

		Ok(request)
	}
}
