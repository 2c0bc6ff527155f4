//! Ordered, independently contained directory steps.
//!
//! A [`Walkthrough`] runs named steps over shared state. A failing step is logged with its
//! whole error chain and recorded, and the next step runs anyway, except when the failure was a
//! configuration or token-acquisition error: without a token every later request would fail the
//! same way, so the remaining steps are recorded as skipped. Cleanup steps always run, each
//! under the same containment.

// self
use crate::{_prelude::*, error, obs};

/// Boxed future returned by a step.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Step body. Named `async`-returning functions coerce to this type:
///
/// ```
/// use graph_broker::walkthrough::StepFuture;
///
/// fn bump(counter: &mut u32) -> StepFuture<'_> {
/// 	Box::pin(async move {
/// 		*counter += 1;
///
/// 		Ok(())
/// 	})
/// }
/// ```
pub type StepFn<S> = for<'a> fn(&'a mut S) -> StepFuture<'a>;

/// A named unit of work.
pub struct Step<S> {
	name: &'static str,
	run: StepFn<S>,
}
impl<S> Step<S> {
	/// Creates a step.
	pub fn new(name: &'static str, run: StepFn<S>) -> Self {
		Self { name, run }
	}

	/// Step label used in logs and reports.
	pub fn name(&self) -> &'static str {
		self.name
	}
}
impl<S> Debug for Step<S> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Step").field(&self.name).finish()
	}
}

/// Which list a step belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
	/// Regular step; skipped after an acquisition failure.
	Main,
	/// Cleanup step; always runs.
	Cleanup,
}

/// Outcome of one step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
	/// The step completed.
	Succeeded,
	/// The step failed; holds the rendered error chain.
	Failed(String),
	/// The step never ran because an earlier step could not obtain a token.
	Skipped,
}

/// Per-step record of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepReport {
	/// Step label.
	pub name: &'static str,
	/// Main or cleanup.
	pub phase: StepPhase,
	/// Outcome.
	pub status: StepStatus,
}

/// Result of [`Walkthrough::run`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WalkthroughReport {
	/// Steps in execution order, cleanup steps last.
	pub steps: Vec<StepReport>,
	/// Step whose acquisition failure skipped the rest, if any.
	pub aborted_by: Option<&'static str>,
}
impl WalkthroughReport {
	/// Number of steps that completed.
	pub fn succeeded(&self) -> usize {
		self.count(|status| matches!(status, StepStatus::Succeeded))
	}

	/// Number of steps that failed.
	pub fn failed(&self) -> usize {
		self.count(|status| matches!(status, StepStatus::Failed(_)))
	}

	/// Number of steps that were skipped.
	pub fn skipped(&self) -> usize {
		self.count(|status| matches!(status, StepStatus::Skipped))
	}

	/// Outcome of the step called `name`.
	pub fn status(&self, name: &str) -> Option<&StepStatus> {
		self.steps.iter().find(|step| step.name == name).map(|step| &step.status)
	}

	fn count(&self, predicate: impl Fn(&StepStatus) -> bool) -> usize {
		self.steps.iter().filter(|step| predicate(&step.status)).count()
	}
}
impl Display for WalkthroughReport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(
			f,
			"{} succeeded, {} failed, {} skipped",
			self.succeeded(),
			self.failed(),
			self.skipped()
		)
	}
}

/// Ordered steps plus cleanup steps over state `S`.
pub struct Walkthrough<S> {
	steps: Vec<Step<S>>,
	cleanup: Vec<Step<S>>,
}
impl<S> Walkthrough<S>
where
	S: Send,
{
	/// Creates an empty walkthrough.
	pub fn new() -> Self {
		Self { steps: Vec::new(), cleanup: Vec::new() }
	}

	/// Appends a main step.
	pub fn step(mut self, name: &'static str, run: StepFn<S>) -> Self {
		self.steps.push(Step::new(name, run));

		self
	}

	/// Appends a cleanup step.
	pub fn cleanup(mut self, name: &'static str, run: StepFn<S>) -> Self {
		self.cleanup.push(Step::new(name, run));

		self
	}

	/// Runs every step in order and reports what happened; never fails as a whole.
	pub async fn run(&self, state: &mut S) -> WalkthroughReport {
		let mut report = WalkthroughReport::default();

		for step in &self.steps {
			if report.aborted_by.is_some() {
				obs::emit_step_skipped(step.name);
				report.steps.push(StepReport {
					name: step.name,
					phase: StepPhase::Main,
					status: StepStatus::Skipped,
				});

				continue;
			}

			let (status, aborts) = run_contained(step, state).await;

			if aborts {
				report.aborted_by = Some(step.name);
			}

			report.steps.push(StepReport { name: step.name, phase: StepPhase::Main, status });
		}
		for step in &self.cleanup {
			let (status, _) = run_contained(step, state).await;

			report.steps.push(StepReport { name: step.name, phase: StepPhase::Cleanup, status });
		}

		report
	}
}
impl<S> Default for Walkthrough<S>
where
	S: Send,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<S> Debug for Walkthrough<S> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Walkthrough")
			.field("steps", &self.steps)
			.field("cleanup", &self.cleanup)
			.finish()
	}
}

async fn run_contained<S>(step: &Step<S>, state: &mut S) -> (StepStatus, bool) {
	match (step.run)(state).await {
		Ok(()) => {
			obs::emit_step(step.name, None);

			(StepStatus::Succeeded, false)
		},
		Err(e) => {
			let chain = error::message_chain(&e);

			obs::emit_step(step.name, Some(&chain));

			(StepStatus::Failed(chain), e.is_acquisition_failure())
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::IdentityMode,
		error::{AuthError, RequestError},
	};

	#[derive(Default)]
	struct Log(Vec<&'static str>);

	fn first(log: &mut Log) -> StepFuture<'_> {
		Box::pin(async move {
			log.0.push("first");

			Ok(())
		})
	}

	fn not_found(log: &mut Log) -> StepFuture<'_> {
		Box::pin(async move {
			log.0.push("not_found");

			Err(RequestError::Status {
				status: 404,
				code: Some("Request_ResourceNotFound".into()),
				message: "gone".into(),
				retry_after: None,
			}
			.into())
		})
	}

	fn rejected(log: &mut Log) -> StepFuture<'_> {
		Box::pin(async move {
			log.0.push("rejected");

			Err(AuthError::InvalidClient {
				mode: IdentityMode::DelegatedUser,
				reason: "bad secret".into(),
			}
			.into())
		})
	}

	fn last(log: &mut Log) -> StepFuture<'_> {
		Box::pin(async move {
			log.0.push("last");

			Ok(())
		})
	}

	fn cleanup(log: &mut Log) -> StepFuture<'_> {
		Box::pin(async move {
			log.0.push("cleanup");

			Ok(())
		})
	}

	#[tokio::test]
	async fn request_failures_are_contained() {
		let walkthrough = Walkthrough::<Log>::new()
			.step("first", first)
			.step("not found", not_found)
			.step("last", last)
			.cleanup("cleanup", cleanup);
		let mut log = Log::default();
		let report = walkthrough.run(&mut log).await;

		assert_eq!(log.0, ["first", "not_found", "last", "cleanup"]);
		assert_eq!((report.succeeded(), report.failed(), report.skipped()), (3, 1, 0));
		assert!(report.aborted_by.is_none());
		assert!(matches!(
			report.status("not found"),
			Some(StepStatus::Failed(message)) if message.contains("HTTP 404")
		));
	}

	#[tokio::test]
	async fn acquisition_failures_skip_to_cleanup() {
		let walkthrough = Walkthrough::<Log>::new()
			.step("first", first)
			.step("rejected", rejected)
			.step("last", last)
			.cleanup("cleanup", cleanup);
		let mut log = Log::default();
		let report = walkthrough.run(&mut log).await;

		assert_eq!(log.0, ["first", "rejected", "cleanup"]);
		assert_eq!(report.aborted_by, Some("rejected"));
		assert_eq!(report.status("last"), Some(&StepStatus::Skipped));
		assert_eq!(report.status("cleanup"), Some(&StepStatus::Succeeded));
		assert_eq!(report.to_string(), "2 succeeded, 1 failed, 1 skipped");
	}
}
