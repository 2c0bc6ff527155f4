//! Thin REST client for the directory service, bound to one identity mode.
//!
//! A [`DirectoryClient`] never holds a token itself: every request asks its [`TokenProvider`]
//! (normally the broker) for one, so the first request triggers acquisition and later ones hit
//! the cache. Requests are plain JSON over the shared [`GraphHttpClient`] transport with the
//! `api-version` query parameter appended.

pub mod model;

pub use model::*;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE, HeaderValue},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, IdentityMode},
	error::RequestError,
	ext::{BearerSigner, RequestSignerExt},
	http::{self, GraphHttpClient, ResponseMetadataSlot},
	obs::{self, FlowOutcome},
};

const JSON: &str = "application/json";
const USERS: &str = "users";
const GROUPS: &str = "groups";
const DIRECTORY_OBJECTS: &str = "directoryObjects";

/// Boxed future returned by [`TokenProvider::token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Source of bearer tokens for a [`DirectoryClient`].
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Identity mode the tokens belong to.
	fn mode(&self) -> IdentityMode;

	/// Returns a token, acquiring one if necessary.
	fn token(&self) -> TokenFuture<'_>;
}

/// One page of a collection response.
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
	/// Items on this page.
	pub value: Vec<T>,
	/// Continuation link, relative to the service root.
	#[serde(default, rename = "odata.nextLink")]
	pub next_link: Option<String>,
}

/// Directory client bound to one identity mode.
pub struct DirectoryClient<C>
where
	C: ?Sized + GraphHttpClient,
{
	mode: IdentityMode,
	service_root: Url,
	api_version: String,
	provider: Arc<dyn TokenProvider>,
	http_client: Arc<C>,
}
impl<C> DirectoryClient<C>
where
	C: ?Sized + GraphHttpClient,
{
	/// Creates a client; no request is made until the first call.
	pub fn new(
		mode: IdentityMode,
		service_root: Url,
		api_version: impl Into<String>,
		provider: Arc<dyn TokenProvider>,
		http_client: Arc<C>,
	) -> Self {
		Self { mode, service_root, api_version: api_version.into(), provider, http_client }
	}

	/// Identity mode requests are made as.
	pub fn mode(&self) -> IdentityMode {
		self.mode
	}

	/// `{resource}/{tenant}/`.
	pub fn service_root(&self) -> &Url {
		&self.service_root
	}

	/// `GET {path}` decoded as `T`.
	pub async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let url = self.endpoint(path, query)?;

		self.send_json(Method::GET, url, None).await
	}

	/// `GET {path}` decoded as a collection page.
	pub async fn list<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<Page<T>>
	where
		T: DeserializeOwned,
	{
		self.get(path, query).await
	}

	/// Follows `page.next_link`; `None` when the collection is exhausted.
	pub async fn next_page<T>(&self, page: &Page<T>) -> Result<Option<Page<T>>>
	where
		T: DeserializeOwned,
	{
		let Some(link) = page.next_link.as_deref() else {
			return Ok(None);
		};
		let mut url = self.resolve(link)?;

		if !url.query_pairs().any(|(key, _)| key == "api-version") {
			url.query_pairs_mut().append_pair("api-version", &self.api_version);
		}

		self.send_json(Method::GET, url, None).await.map(Some)
	}

	/// Collects `first` and every page after it.
	pub async fn collect_all<T>(&self, first: Page<T>) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		let mut items = Vec::new();
		let mut next = Some(first);

		while let Some(page) = next {
			next = self.next_page(&page).await?;

			items.extend(page.value);
		}

		Ok(items)
	}

	/// `POST {path}` with a JSON body, decoding the created object.
	pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		let url = self.endpoint(path, &[])?;
		let body = serde_json::to_vec(body).map_err(RequestError::Encode)?;

		self.send_json(Method::POST, url, Some(body)).await
	}

	/// `PATCH {path}` with a JSON body; the directory answers `204 No Content`.
	pub async fn patch<B>(&self, path: &str, body: &B) -> Result<()>
	where
		B: ?Sized + Serialize,
	{
		let url = self.endpoint(path, &[])?;
		let body = serde_json::to_vec(body).map_err(RequestError::Encode)?;

		self.send(Method::PATCH, url, Some(body)).await.map(drop)
	}

	/// `DELETE {path}`.
	pub async fn delete(&self, path: &str) -> Result<()> {
		let url = self.endpoint(path, &[])?;

		self.send(Method::DELETE, url, None).await.map(drop)
	}

	/// Tenant details of the directory the client is bound to.
	pub async fn tenant_details(&self) -> Result<Vec<TenantDetail>> {
		self.list("tenantDetails", &[]).await.map(|page| page.value)
	}

	/// The signed-in user (delegated-user mode only).
	pub async fn me(&self) -> Result<User> {
		self.get("me", &[]).await
	}

	/// First `top` users ordered by display name.
	pub async fn users(&self, top: u32) -> Result<Page<User>> {
		let top = top.to_string();

		self.list(USERS, &[("$top", top.as_str()), ("$orderby", "displayName")]).await
	}

	/// People picker: users whose UPN, display name, given name, or surname starts with
	/// `prefix`.
	pub async fn search_users(&self, prefix: &str, top: u32) -> Result<Page<User>> {
		let filter = people_picker_filter(prefix);
		let top = top.to_string();

		self.list(USERS, &[("$filter", filter.as_str()), ("$top", top.as_str())]).await
	}

	/// Groups whose display name starts with `prefix`.
	pub async fn search_groups(&self, prefix: &str) -> Result<Page<Group>> {
		let filter = format!("startswith(displayName,'{}')", escape_literal(prefix));

		self.list(GROUPS, &[("$filter", filter.as_str())]).await
	}

	/// Creates a user.
	pub async fn create_user(&self, user: &NewUser) -> Result<User> {
		self.post(USERS, user).await
	}

	/// Applies a partial update to a user.
	pub async fn update_user(&self, object_id: &str, update: &UserUpdate) -> Result<()> {
		self.patch(&object_path(USERS, object_id), update).await
	}

	/// Deletes a user.
	pub async fn delete_user(&self, object_id: &str) -> Result<()> {
		self.delete(&object_path(USERS, object_id)).await
	}

	/// Creates a security group.
	pub async fn create_group(&self, group: &NewGroup) -> Result<Group> {
		self.post(GROUPS, group).await
	}

	/// Deletes a group.
	pub async fn delete_group(&self, object_id: &str) -> Result<()> {
		self.delete(&object_path(GROUPS, object_id)).await
	}

	/// Adds a directory object to a group's members.
	pub async fn add_group_member(&self, group_id: &str, member_id: &str) -> Result<()> {
		let path = format!("{}/$links/members", object_path(GROUPS, group_id));

		self.link(Method::POST, &path, member_id).await
	}

	/// Removes a directory object from a group's members.
	pub async fn remove_group_member(&self, group_id: &str, member_id: &str) -> Result<()> {
		self.delete(&format!("{}/$links/members/{member_id}", object_path(GROUPS, group_id))).await
	}

	/// Direct members of a group.
	pub async fn group_members(&self, group_id: &str) -> Result<Page<DirectoryObject>> {
		self.list(&format!("{}/members", object_path(GROUPS, group_id)), &[]).await
	}

	/// Groups and directory roles the user is a direct member of.
	pub async fn member_of(&self, object_id: &str) -> Result<Page<DirectoryObject>> {
		self.list(&format!("{}/memberOf", object_path(USERS, object_id)), &[]).await
	}

	/// The user's manager; `None` when no manager is assigned.
	pub async fn manager(&self, user_id: &str) -> Result<Option<DirectoryObject>> {
		match self.get(&format!("{}/manager", object_path(USERS, user_id)), &[]).await {
			Ok(manager) => Ok(Some(manager)),
			Err(Error::Request(RequestError::Status { status: 404, .. })) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Makes `manager_id` the manager of `user_id`.
	pub async fn set_manager(&self, user_id: &str, manager_id: &str) -> Result<()> {
		let path = format!("{}/$links/manager", object_path(USERS, user_id));

		self.link(Method::PUT, &path, manager_id).await
	}

	/// Users and contacts reporting to `user_id`.
	pub async fn direct_reports(&self, user_id: &str) -> Result<Page<DirectoryObject>> {
		self.list(&format!("{}/directReports", object_path(USERS, user_id)), &[]).await
	}

	/// Directory roles activated in the tenant.
	pub async fn directory_roles(&self) -> Result<Page<DirectoryRole>> {
		self.list("directoryRoles", &[]).await
	}

	/// Service principals in the tenant.
	pub async fn service_principals(&self) -> Result<Page<ServicePrincipal>> {
		self.list("servicePrincipals", &[]).await
	}

	/// Application registrations, `top` per page.
	pub async fn applications(&self, top: u32) -> Result<Page<Application>> {
		let top = top.to_string();

		self.list("applications", &[("$top", top.as_str())]).await
	}

	/// Writes a `$links` navigation pointing at directory object `target_id`.
	async fn link(&self, method: Method, path: &str, target_id: &str) -> Result<()> {
		let body = ObjectLink { url: self.resolve(&object_path(DIRECTORY_OBJECTS, target_id))? };
		let url = self.endpoint(path, &[])?;
		let body = serde_json::to_vec(&body).map_err(RequestError::Encode)?;

		self.send(method, url, Some(body)).await.map(drop)
	}

	fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, RequestError> {
		let mut url = self.resolve(path)?;

		{
			let mut pairs = url.query_pairs_mut();

			for (key, value) in query {
				pairs.append_pair(key, value);
			}

			pairs.append_pair("api-version", &self.api_version);
		}

		Ok(url)
	}

	fn resolve(&self, path: &str) -> Result<Url, RequestError> {
		self.service_root
			.join(path.trim_start_matches('/'))
			.map_err(|source| RequestError::InvalidPath { path: path.to_owned(), source })
	}

	async fn send_json<T>(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.send(method, url, body).await?;
		let de = &mut serde_json::Deserializer::from_slice(response.body());

		serde_path_to_error::deserialize(de)
			.map_err(|source| RequestError::Decode { source }.into())
	}

	async fn send(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<HttpResponse> {
		let token = self.provider.token().await?;
		let result = self.dispatch(method, url, body, &token).await;

		match &result {
			Ok(_) => obs::record_directory_request(self.mode, FlowOutcome::Success),
			Err(_) => obs::record_directory_request(self.mode, FlowOutcome::Failure),
		}

		result.map_err(Error::from)
	}

	async fn dispatch(
		&self,
		method: Method,
		url: Url,
		body: Option<Vec<u8>>,
		token: &AccessToken,
	) -> Result<HttpResponse, RequestError> {
		let has_body = body.is_some();
		let mut request = HttpRequest::new(body.unwrap_or_default());

		*request.method_mut() = method;
		*request.uri_mut() = url.as_str().parse().map_err(|e| RequestError::Build(From::from(e)))?;

		request.headers_mut().insert(ACCEPT, HeaderValue::from_static(JSON));

		if has_body {
			request.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
		}

		let request = BearerSigner.attach_token(request, token)?;
		let handle = self.http_client.with_metadata(ResponseMetadataSlot::default());
		let response = handle.call(request).await.map_err(RequestError::transport)?;
		let status = response.status();

		if status.is_success() {
			return Ok(response);
		}

		Err(status_error(&response))
	}
}
impl<C> Clone for DirectoryClient<C>
where
	C: ?Sized + GraphHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			mode: self.mode,
			service_root: self.service_root.clone(),
			api_version: self.api_version.clone(),
			provider: self.provider.clone(),
			http_client: self.http_client.clone(),
		}
	}
}
impl<C> Debug for DirectoryClient<C>
where
	C: ?Sized + GraphHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DirectoryClient")
			.field("mode", &self.mode)
			.field("service_root", &self.service_root.as_str())
			.field("api_version", &self.api_version)
			.finish()
	}
}

#[derive(Serialize)]
struct ObjectLink {
	url: Url,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
	#[serde(rename = "odata.error")]
	error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	message: Option<ErrorMessage>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
	Localized { value: String },
	Plain(String),
}

fn status_error(response: &HttpResponse) -> RequestError {
	let status = response.status().as_u16();
	let retry_after = http::parse_retry_after(response.headers());
	let (code, message) = match serde_json::from_slice::<ErrorEnvelope>(response.body()) {
		Ok(ErrorEnvelope { error: ErrorBody { code, message } }) => {
			let message = match message {
				Some(ErrorMessage::Localized { value } | ErrorMessage::Plain(value)) => value,
				None => response.status().canonical_reason().unwrap_or("no message").to_owned(),
			};

			(code, message)
		},
		Err(_) => (None, body_preview(response.body())),
	};

	RequestError::Status { status, code, message, retry_after }
}

fn body_preview(body: &[u8]) -> String {
	const LIMIT: usize = 256;

	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.is_empty() {
		return "empty response body".into();
	}

	text.chars().take(LIMIT).collect()
}

fn object_path(collection: &str, object_id: &str) -> String {
	format!("{collection}/{object_id}")
}

fn escape_literal(value: &str) -> String {
	value.replace('\'', "''")
}

fn people_picker_filter(prefix: &str) -> String {
	let prefix = escape_literal(prefix);

	["userPrincipalName", "displayName", "givenName", "surname"]
		.iter()
		.map(|field| format!("startswith({field},'{prefix}')"))
		.collect::<Vec<_>>()
		.join(" or ")
}
