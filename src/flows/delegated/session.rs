// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::ClientId,
	config::DelegatedUserSettings,
	error::InteractionError,
	provider::ProviderStrategy,
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// What an [`InteractivePrompt`](super::InteractivePrompt) shows the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Fully-formed authorize URL the user must open.
	pub authorize_url: Url,
	/// Redirect URI the provider sends the user back to; the prompt reports the full URL the
	/// browser landed on.
	pub redirect_uri: Url,
}

/// One interactive sign-in attempt: the request plus the secrets needed to finish it.
#[derive(Clone)]
pub(crate) struct AuthorizationSession {
	request: AuthorizationRequest,
	state: String,
	pkce: PkcePair,
}
impl AuthorizationSession {
	pub(crate) fn start(
		authorize_endpoint: Url,
		client_id: &ClientId,
		settings: &DelegatedUserSettings,
		strategy: &dyn ProviderStrategy,
	) -> Self {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let authorize_url =
			build_authorize_url(authorize_endpoint, client_id, settings, strategy, &state, &pkce);

		Self {
			request: AuthorizationRequest {
				authorize_url,
				redirect_uri: settings.redirect_uri.clone(),
			},
			state,
			pkce,
		}
	}

	pub(crate) fn request(&self) -> &AuthorizationRequest {
		&self.request
	}

	pub(crate) fn redirect_uri(&self) -> &Url {
		&self.request.redirect_uri
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}

	/// Validates the redirect the prompt reported and extracts the authorization code.
	pub(crate) fn complete(&self, redirect: &str) -> Result<String, InteractionError> {
		let redirect = redirect.trim();

		if redirect.is_empty() {
			return Err(InteractionError::Cancelled);
		}

		let url = Url::parse(redirect).map_err(|source| InteractionError::InvalidRedirect {
			input: redirect.to_owned(),
			source,
		})?;
		let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

		if let Some(error) = params.get("error") {
			return Err(InteractionError::Denied {
				error: error.clone(),
				description: params
					.get("error_description")
					.cloned()
					.unwrap_or_else(|| "no description provided".into()),
			});
		}
		if params.get("state").map(String::as_str) != Some(self.state.as_str()) {
			return Err(InteractionError::StateMismatch);
		}

		params
			.get("code")
			.filter(|code| !code.is_empty())
			.cloned()
			.ok_or(InteractionError::MissingCode)
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("request", &self.request)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

fn build_authorize_url(
	mut url: Url,
	client_id: &ClientId,
	settings: &DelegatedUserSettings,
	strategy: &dyn ProviderStrategy,
	state: &str,
	pkce: &PkcePair,
) -> Url {
	let mut extra = BTreeMap::new();

	strategy.augment_authorize_request(&mut extra);

	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", settings.redirect_uri.as_str());

	for (key, value) in &extra {
		pairs.append_pair(key, value);
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());

	if let Some(prompt) = settings.prompt.as_param() {
		pairs.append_pair("prompt", prompt);
	}

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{config::PromptPolicy, provider::AzureAdStrategy};

	fn session(prompt: PromptPolicy) -> AuthorizationSession {
		let settings = DelegatedUserSettings { prompt, ..Default::default() };

		AuthorizationSession::start(
			Url::parse("https://login.microsoftonline.com/common/oauth2/authorize")
				.expect("Authorize URL fixture should parse."),
			&ClientId::new("user-client").expect("Client fixture should be valid."),
			&settings,
			&AzureAdStrategy::new("https://graph.windows.net"),
		)
	}

	fn query(url: &Url) -> HashMap<String, String> {
		url.query_pairs().into_owned().collect()
	}

	#[test]
	fn authorize_url_carries_pkce_resource_and_prompt() {
		let login = session(PromptPolicy::Login);
		let params = query(&login.request().authorize_url);

		assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(params.get("client_id").map(String::as_str), Some("user-client"));
		assert_eq!(params.get("redirect_uri").map(String::as_str), Some("https://localhost/"));
		assert_eq!(params.get("resource").map(String::as_str), Some("https://graph.windows.net"));
		assert_eq!(params.get("prompt").map(String::as_str), Some("login"));
		assert_eq!(params.get("code_challenge_method").map(String::as_str), Some("S256"));
		assert_eq!(
			params.get("code_challenge").map(String::as_str),
			Some(compute_pkce_challenge(login.pkce_verifier()).as_str())
		);
		assert_eq!(params.get("state").map(String::len), Some(STATE_LEN));

		let params = query(&session(PromptPolicy::Auto).request().authorize_url);

		assert!(!params.contains_key("prompt"));
	}

	#[test]
	fn redirect_is_validated_before_the_code_is_released() {
		let pending = session(PromptPolicy::Login);
		let state = query(&pending.request().authorize_url)
			.remove("state")
			.expect("State should be present.");
		let code = pending
			.complete(&format!("https://localhost/?code=xyz&state={state}"))
			.expect("Matching state should release the code.");

		assert_eq!(code, "xyz");
		assert!(matches!(
			pending.complete("https://localhost/?code=xyz&state=forged"),
			Err(InteractionError::StateMismatch)
		));
		assert!(matches!(
			pending.complete(&format!("https://localhost/?state={state}")),
			Err(InteractionError::MissingCode)
		));
		assert!(matches!(pending.complete("   "), Err(InteractionError::Cancelled)));
		assert!(matches!(
			pending.complete("not a url"),
			Err(InteractionError::InvalidRedirect { .. })
		));
	}

	#[test]
	fn provider_errors_surface_before_state_checks() {
		let err = session(PromptPolicy::Login)
			.complete("https://localhost/?error=access_denied&error_description=AADSTS65004")
			.expect_err("Provider error should fail the sign-in.");

		assert!(matches!(
			err,
			InteractionError::Denied { ref error, ref description }
				if error == "access_denied" && description == "AADSTS65004"
		));
	}

	#[test]
	fn pkce_challenge_matches_rfc_vector() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}
}
