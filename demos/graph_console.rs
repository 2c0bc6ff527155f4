//! Console walkthrough against a real Azure AD tenant.
//!
//! Reads `GRAPH_*` settings from the environment (or a `.env` file), asks whether to run as the
//! application, the signed-in user, or both, and then walks the directory with the matching
//! identity. Each run creates a throwaway user and group and deletes them again at the end.
//!
//! ```sh
//! RUST_LOG=graph_broker=info cargo run --example graph_console
//! ```

// std
use std::io::{self, BufRead, Write};
// crates.io
use color_eyre::{Result, eyre::eyre};
use colored::Colorize;
use tracing_subscriber::EnvFilter;
// self
use graph_broker::{
	auth::IdentityMode,
	config::BrokerConfig,
	directory::{
		DirectoryClient, DirectoryObject, Group, NewGroup, NewUser, TenantDetail, User, UserUpdate,
	},
	error::{self, Error, InteractionError},
	ext::{NoRetry, RetryContext, RetryDecision, RetryPolicy},
	flows::{ConsolePrompt, ReqwestBroker},
	http::ReqwestHttpClient,
	walkthrough::{StepFuture, StepStatus, Walkthrough},
};

const SEARCH_LIMIT: u32 = 10;
const LIST_LIMIT: u32 = 5;
const APPLICATION_PAGE: u32 = 999;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Choice {
	Application,
	User,
	Both,
}
impl Choice {
	fn parse(input: &str) -> Option<Self> {
		match input.trim().to_ascii_lowercase().as_str() {
			"a" => Some(Self::Application),
			"u" => Some(Self::User),
			"b" => Some(Self::Both),
			_ => None,
		}
	}

	fn modes(self) -> &'static [IdentityMode] {
		match self {
			Self::Application => &[IdentityMode::Application],
			Self::User => &[IdentityMode::DelegatedUser],
			Self::Both => &IdentityMode::ALL,
		}
	}
}

struct Session {
	client: DirectoryClient<ReqwestHttpClient>,
	search: String,
	tenant: Option<TenantDetail>,
	me: Option<User>,
	found: Option<User>,
	new_user: Option<User>,
	new_group: Option<Group>,
}
impl Session {
	fn new(client: DirectoryClient<ReqwestHttpClient>, search: String) -> Self {
		Self {
			client,
			search,
			tenant: None,
			me: None,
			found: None,
			new_user: None,
			new_group: None,
		}
	}

	/// User the read-only relationship steps look at: the signed-in user when there is one.
	fn subject(&self) -> Option<&User> {
		self.me.as_ref().or(self.found.as_ref())
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	dotenvy::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("graph_broker=info")),
		)
		.init();

	let config = BrokerConfig::from_env()?;
	let broker = ReqwestBroker::new(config).with_prompt(ConsolePrompt);
	let answer = ask("Run as (a)pplication, (u)ser, or (b)oth?")?;
	let choice = Choice::parse(&answer).unwrap_or_else(|| {
		let warning = format!("Unrecognized choice `{answer}`; defaulting to user mode.");

		println!("{}", warning.yellow());

		Choice::User
	});

	for &mode in choice.modes() {
		if let Err(e) = acquire(&broker, mode, &NoRetry).await {
			report_error(&format!("Acquiring a {mode} token failed"), &e);
			pause()?;

			continue;
		}

		run_walkthrough(&broker, mode).await?;
	}

	Ok(())
}

async fn acquire(
	broker: &ReqwestBroker,
	mode: IdentityMode,
	policy: &dyn RetryPolicy,
) -> Result<(), Error> {
	let mut attempt = 0;

	loop {
		attempt += 1;

		match broker.token(mode).await {
			Ok(_) => return Ok(()),
			Err(e) => match policy.decide(&RetryContext::new(attempt, &e)) {
				RetryDecision::GiveUp => return Err(e),
				RetryDecision::Retry(directive) =>
					tokio::time::sleep(directive.recommended_backoff.unsigned_abs()).await,
			},
		}
	}
}

async fn run_walkthrough(broker: &ReqwestBroker, mode: IdentityMode) -> Result<()> {
	println!("\nStarting {mode} requests...\n");

	let search = ask("Search for a user by UPN, display name, first or last name:")?;
	let mut session = Session::new(broker.client(mode)?, search);
	let mut walkthrough = Walkthrough::new().step("tenant details", tenant_details);

	if mode.is_interactive() {
		walkthrough = walkthrough.step("signed-in user", signed_in_user);
	}

	let report = walkthrough
		.step("people picker", people_picker)
		.step("group and role membership", membership)
		.step("manager and direct reports", reporting_line)
		.step("list users", list_users)
		.step("create user", create_user)
		.step("update user", update_user)
		.step("assign manager", assign_manager)
		.step("create group", create_group)
		.step("find group", find_group)
		.step("add user to group", add_member)
		.step("list group members", list_group_members)
		.step("remove user from group", remove_member)
		.step("directory roles", directory_roles)
		.step("service principals", service_principals)
		.step("applications", applications)
		.cleanup("delete user", delete_user)
		.cleanup("delete group", delete_group)
		.run(&mut session)
		.await;

	for step in &report.steps {
		if let StepStatus::Failed(message) = &step.status {
			println!("{}", format!("{}: {message}", step.name).red());
		}
	}

	println!("\nWalkthrough as {mode} finished: {report}.");

	Ok(())
}

fn tenant_details(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let tenant = session.client.tenant_details().await?.into_iter().next();

		if let Some(tenant) = &tenant {
			println!("Tenant: {}", tenant.display_name.as_deref().unwrap_or(&tenant.object_id));

			for domain in &tenant.verified_domains {
				let marker = if domain.default { " (default)" } else { "" };

				println!("  verified domain {}{marker}", domain.name);
			}
		}

		session.tenant = tenant;

		Ok(())
	})
}

fn signed_in_user(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let me = session.client.me().await?;

		println!("Signed in as {} ({})", me.label(), upn(&me));

		session.me = Some(me);

		Ok(())
	})
}

fn people_picker(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let page = session.client.search_users(&session.search, SEARCH_LIMIT).await?;
		let users = session.client.collect_all(page).await?;

		if users.is_empty() {
			println!("No user starts with `{}`.", session.search);
		}
		for user in &users {
			println!("  found {} ({})", user.label(), upn(user));
		}

		session.found = users.into_iter().next();

		Ok(())
	})
}

fn membership(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(user) = session.subject() else {
			println!("No user to inspect; skipping membership.");

			return Ok(());
		};
		let page = session.client.member_of(&user.object_id).await?;

		for object in session.client.collect_all(page).await? {
			println!("  {} is a member of {} ({})", user.label(), object.label(), object.kind());
		}

		Ok(())
	})
}

fn reporting_line(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(user) = session.subject() else {
			return Ok(());
		};

		match session.client.manager(&user.object_id).await? {
			Some(manager) => println!("  {} reports to {}", user.label(), describe(&manager)),
			None => println!("  {} has no manager.", user.label()),
		}

		let page = session.client.direct_reports(&user.object_id).await?;

		for report in session.client.collect_all(page).await? {
			println!("  direct report {}", describe(&report));
		}

		Ok(())
	})
}

fn list_users(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let page = session.client.users(LIST_LIMIT).await?;

		for user in &page.value {
			println!("  {}", user.label());
		}

		Ok(())
	})
}

fn create_user(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(domain) =
			session.tenant.as_ref().and_then(TenantDetail::default_domain).map(|d| d.name.clone())
		else {
			println!("No default domain known; skipping user creation.");

			return Ok(());
		};
		let first = ask("First name for the new user:").map_err(InteractionError::Prompt)?;
		let last = ask("Last name for the new user:").map_err(InteractionError::Prompt)?;
		let user = session.client.create_user(&NewUser::member(&first, &last, &domain)).await?;

		println!("Created user {} ({})", user.label(), upn(&user));

		session.new_user = Some(user);

		Ok(())
	})
}

fn update_user(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(user) = &session.new_user else {
			return Ok(());
		};
		let update = UserUpdate {
			job_title: Some("Sample user".into()),
			department: Some("Engineering".into()),
			..Default::default()
		};

		session.client.update_user(&user.object_id, &update).await
	})
}

fn assign_manager(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let (Some(user), Some(manager)) = (&session.new_user, session.subject()) else {
			return Ok(());
		};

		session.client.set_manager(&user.object_id, &manager.object_id).await?;

		if let Some(assigned) = session.client.manager(&user.object_id).await? {
			println!("  {} now reports to {}", user.label(), describe(&assigned));
		}

		Ok(())
	})
}

fn create_group(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let group = session.client.create_group(&NewGroup::security("Best Group ever")).await?;

		println!("Created group {}", group.display_name.as_deref().unwrap_or(&group.object_id));

		session.new_group = Some(group);

		Ok(())
	})
}

fn find_group(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(name) = session.new_group.as_ref().and_then(|g| g.display_name.clone()) else {
			return Ok(());
		};
		let groups = session.client.search_groups(&name).await?.value;

		for group in &groups {
			println!(
				"  found group {} {}",
				group.display_name.as_deref().unwrap_or(&group.object_id),
				group.description.as_deref().unwrap_or_default()
			);
		}

		Ok(())
	})
}

fn add_member(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let (Some(group), Some(user)) = (&session.new_group, &session.new_user) else {
			return Ok(());
		};

		session.client.add_group_member(&group.object_id, &user.object_id).await
	})
}

fn list_group_members(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(group) = &session.new_group else {
			return Ok(());
		};
		let page = session.client.group_members(&group.object_id).await?;

		for member in session.client.collect_all(page).await? {
			println!("  member {}", describe(&member));
		}

		Ok(())
	})
}

fn remove_member(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let (Some(group), Some(user)) = (&session.new_group, &session.new_user) else {
			return Ok(());
		};

		session.client.remove_group_member(&group.object_id, &user.object_id).await
	})
}

fn directory_roles(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let page = session.client.directory_roles().await?;

		for role in session.client.collect_all(page).await? {
			println!(
				"  role {} {} {}",
				role.display_name.as_deref().unwrap_or_default(),
				role.description.as_deref().unwrap_or_default(),
				role.object_id
			);
		}

		Ok(())
	})
}

fn service_principals(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let page = session.client.service_principals().await?;

		for principal in session.client.collect_all(page).await? {
			println!(
				"  service principal {} {}",
				principal.app_id.as_deref().unwrap_or_default(),
				principal.display_name.as_deref().unwrap_or_default()
			);
		}

		Ok(())
	})
}

fn applications(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let page = session.client.applications(APPLICATION_PAGE).await?;

		for app in session.client.collect_all(page).await? {
			println!(
				"  application {} {}",
				app.app_id.as_deref().unwrap_or_default(),
				app.display_name.as_deref().unwrap_or_default()
			);
		}

		Ok(())
	})
}

fn delete_user(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(user) = session.new_user.take() else {
			return Ok(());
		};

		session.client.delete_user(&user.object_id).await?;

		println!("Deleted user {}", user.label());

		Ok(())
	})
}

fn delete_group(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		let Some(group) = session.new_group.take() else {
			return Ok(());
		};

		session.client.delete_group(&group.object_id).await?;

		println!("Deleted group {}", group.display_name.as_deref().unwrap_or(&group.object_id));

		Ok(())
	})
}

fn upn(user: &User) -> &str {
	user.user_principal_name.as_deref().unwrap_or("no UPN")
}

fn describe(object: &DirectoryObject) -> String {
	match &object.user_principal_name {
		Some(upn) => format!("{} ({upn})", object.label()),
		None => format!("{} ({})", object.label(), object.kind()),
	}
}

fn ask(question: &str) -> io::Result<String> {
	let mut stdout = io::stdout().lock();

	writeln!(stdout, "\n{question}")?;
	stdout.flush()?;

	let mut line = String::new();

	io::stdin().lock().read_line(&mut line)?;

	Ok(line.trim().to_owned())
}

fn pause() -> Result<()> {
	ask("Press Enter to continue.").map(drop).map_err(|e| eyre!(e))
}

fn report_error(context: &str, e: &Error) {
	eprintln!("{}", format!("{context}: {}", error::message_chain(e)).red());
}
