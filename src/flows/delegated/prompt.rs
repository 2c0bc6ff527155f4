// std
use std::io::{self, BufRead, Write};
// self
use crate::{error::InteractionError, flows::AuthorizationRequest};

/// Blocking, single-shot interactive step of the delegated sign-in.
///
/// Implementations show [`AuthorizationRequest::authorize_url`] to the user and return the
/// full URL the browser was redirected to. Closures with the same signature implement the
/// trait, which keeps tests free of consoles and browsers.
pub trait InteractivePrompt
where
	Self: Send + Sync,
{
	/// Runs the sign-in and reports the redirect URL.
	fn authorize(&self, request: &AuthorizationRequest) -> Result<String, InteractionError>;
}
impl<F> InteractivePrompt for F
where
	F: Send + Sync + Fn(&AuthorizationRequest) -> Result<String, InteractionError>,
{
	fn authorize(&self, request: &AuthorizationRequest) -> Result<String, InteractionError> {
		self(request)
	}
}

/// Prompt that prints the authorize URL and reads the redirect URL from standard input.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsolePrompt;
impl InteractivePrompt for ConsolePrompt {
	fn authorize(&self, request: &AuthorizationRequest) -> Result<String, InteractionError> {
		let mut stdout = io::stdout().lock();

		writeln!(stdout, "\nSign in by opening the following URL in a browser:\n")?;
		writeln!(stdout, "  {}\n", request.authorize_url)?;
		writeln!(
			stdout,
			"After signing in, paste the full address you were redirected to (it starts with {}):",
			request.redirect_uri
		)?;
		stdout.flush()?;

		let mut line = String::new();

		if io::stdin().lock().read_line(&mut line)? == 0 {
			return Err(InteractionError::Cancelled);
		}

		Ok(line.trim().to_owned())
	}
}
