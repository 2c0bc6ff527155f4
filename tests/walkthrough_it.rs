mod common;

// crates.io
use httpmock::prelude::*;
// self
use common::*;
use graph_broker::{
	auth::IdentityMode,
	directory::{DirectoryClient, TenantDetail},
	http::ReqwestHttpClient,
	walkthrough::{StepFuture, StepStatus, Walkthrough},
};

struct Session {
	client: DirectoryClient<ReqwestHttpClient>,
	tenant: Option<TenantDetail>,
	cleaned_up: bool,
}

fn tenant_details(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		session.tenant = session.client.tenant_details().await?.into_iter().next();

		Ok(())
	})
}

fn signed_in_user(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		session.client.me().await?;

		Ok(())
	})
}

fn list_users(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		session.client.users(5).await?;

		Ok(())
	})
}

fn cleanup(session: &mut Session) -> StepFuture<'_> {
	Box::pin(async move {
		session.cleaned_up = true;

		Ok(())
	})
}

fn walkthrough() -> Walkthrough<Session> {
	Walkthrough::new()
		.step("tenant details", tenant_details)
		.step("signed-in user", signed_in_user)
		.step("list users", list_users)
		.cleanup("cleanup", cleanup)
}

#[tokio::test]
async fn directory_failures_do_not_stop_later_steps() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"abc123"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("{SERVICE_ROOT_PATH}/tenantDetails"));
			then.status(200).header("content-type", "application/json").body(
				r#"{"value":[{"objectId":"contoso-tenant","displayName":"Contoso","verifiedDomains":[{"name":"contoso.com","default":true}]}]}"#,
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("{SERVICE_ROOT_PATH}/me"));
			then.status(400).header("content-type", "application/json").body(
				r#"{"odata.error":{"code":"Request_BadRequest","message":{"value":"/me needs a user."}}}"#,
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("{SERVICE_ROOT_PATH}/users"));
			then.status(200).header("content-type", "application/json").body(r#"{"value":[]}"#);
		})
		.await;

	let mut session = Session {
		client: broker.client(IdentityMode::Application).expect("Client creation should not fail."),
		tenant: None,
		cleaned_up: false,
	};
	let report = walkthrough().run(&mut session).await;

	assert_eq!((report.succeeded(), report.failed(), report.skipped()), (3, 1, 0));
	assert!(matches!(
		report.status("signed-in user"),
		Some(StepStatus::Failed(message)) if message.contains("/me needs a user")
	));
	assert_eq!(
		session.tenant.as_ref().and_then(TenantDetail::default_domain).map(|d| d.name.as_str()),
		Some("contoso.com")
	);
	assert!(session.cleaned_up);
}

#[tokio::test]
async fn acquisition_failure_skips_remaining_steps_but_not_cleanup() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(APP_TOKEN_PATH);
			then.status(401).body("Unauthorized");
		})
		.await;
	let mut session = Session {
		client: broker.client(IdentityMode::Application).expect("Client creation should not fail."),
		tenant: None,
		cleaned_up: false,
	};
	let report = walkthrough().run(&mut session).await;

	assert_eq!(report.aborted_by, Some("tenant details"));
	assert_eq!(report.status("signed-in user"), Some(&StepStatus::Skipped));
	assert_eq!(report.status("list users"), Some(&StepStatus::Skipped));
	assert_eq!(report.status("cleanup"), Some(&StepStatus::Succeeded));
	assert!(session.cleaned_up);

	token.assert_calls_async(1).await;
}
