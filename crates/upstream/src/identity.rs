//! Identity provider client.
//!
//! Only the administrative surface is used: service-account clients for
//! reconciliation, and users with their groups for role mapping. Interactive
//! authentication happens in the gateway, never here.

use crate::error::{Upstream, UpstreamError, UpstreamResult};
use crate::retry::{RetryPolicy, decode_json, reject_unsuccessful};
use crate::schema::keycloak::{
    ClientRepresentation, CredentialRepresentation, GroupRepresentation, TokenResponse,
    UserRepresentation,
};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Seconds before expiry at which a cached token is considered stale.
const TOKEN_REFRESH_MARGIN_SECS: u64 = 30;

/// Users requested per page of the user listing.
const USER_PAGE_SIZE: usize = 100;

/// Upper bound on user listing pages per call.
const MAX_USER_PAGES: usize = 10_000;

/// A service-account client as seen on the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceClient {
    /// Internal id assigned by the identity provider.
    pub idp_id: String,
    /// The public client id (credential name).
    pub client_id: String,
    /// Normalized scopes.
    pub scopes: Vec<String>,
    pub enabled: bool,
}

/// Desired state of a remote client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpec {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub enabled: bool,
    pub description: Option<String>,
}

/// A user known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpUser {
    pub id: String,
    pub username: String,
    pub enabled: bool,
}

/// Administrative API of the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Check that the provider is reachable and our credentials work.
    async fn probe(&self) -> UpstreamResult<()>;

    /// List clients with service accounts enabled, except the client this
    /// control plane authenticates as.
    async fn list_service_clients(&self) -> UpstreamResult<Vec<ServiceClient>>;

    /// Create a client, returning its internal id.
    async fn create_client(&self, spec: &ClientSpec) -> UpstreamResult<String>;

    /// Push scopes and enabled flag to an existing client.
    async fn update_client(&self, idp_id: &str, spec: &ClientSpec) -> UpstreamResult<()>;

    async fn delete_client(&self, idp_id: &str) -> UpstreamResult<()>;

    /// Generate a new client secret and return it.
    async fn regenerate_secret(&self, idp_id: &str) -> UpstreamResult<String>;

    async fn list_users(&self) -> UpstreamResult<Vec<IdpUser>>;

    /// Group names (not paths) of a user.
    async fn list_user_groups(&self, user_id: &str) -> UpstreamResult<Vec<String>>;
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Keycloak implementation of [`IdentityProvider`].
pub struct KeycloakClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    base_url: String,
    realm: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl KeycloakClient {
    pub fn new(
        base_url: &str,
        realm: &str,
        client_id: &str,
        client_secret: &str,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> UpstreamResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| UpstreamError::Config(e.to_string()))?;
        Ok(Self {
            http,
            retry,
            base_url: base_url.trim_end_matches('/').to_string(),
            realm: realm.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}/admin/realms/{}/{}", self.base_url, self.realm, path)
    }

    async fn access_token(&self) -> UpstreamResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.access_token.clone());
        }

        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.realm
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .retry
            .send(Upstream::IdentityProvider, || {
                self.http.post(&url).form(&form).send()
            })
            .await?;
        let response = reject_unsuccessful(Upstream::IdentityProvider, response).await?;
        let token: TokenResponse = decode_json(Upstream::IdentityProvider, response).await?;

        let lifetime = token.expires_in.saturating_sub(TOKEN_REFRESH_MARGIN_SECS);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + Duration::from_secs(lifetime),
        });
        tracing::debug!(expires_in = token.expires_in, "identity provider token refreshed");
        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Send an authorized admin request. A 401 refreshes the token and
    /// retries exactly once.
    async fn send_authorized<F>(&self, build: F) -> UpstreamResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut refreshed = false;
        loop {
            let token = self.access_token().await?;
            let response = self
                .retry
                .send(Upstream::IdentityProvider, || {
                    build(&self.http).bearer_auth(&token).send()
                })
                .await?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                tracing::debug!("identity provider rejected cached token, refreshing");
                self.invalidate_token().await;
                refreshed = true;
                continue;
            }
            return reject_unsuccessful(Upstream::IdentityProvider, response).await;
        }
    }

    fn representation(spec: &ClientSpec, idp_id: Option<&str>) -> ClientRepresentation {
        ClientRepresentation {
            id: idp_id.map(str::to_string),
            client_id: spec.client_id.clone(),
            enabled: spec.enabled,
            service_accounts_enabled: true,
            public_client: false,
            default_client_scopes: spec.scopes.clone(),
            description: spec.description.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn probe(&self) -> UpstreamResult<()> {
        self.access_token().await.map(|_| ())
    }

    async fn list_service_clients(&self) -> UpstreamResult<Vec<ServiceClient>> {
        let url = self.admin_url("clients");
        let response = self.send_authorized(|http| http.get(&url)).await?;
        let clients: Vec<ClientRepresentation> =
            decode_json(Upstream::IdentityProvider, response).await?;

        clients
            .into_iter()
            .filter(|c| c.service_accounts_enabled && c.client_id != self.client_id)
            .map(|c| {
                let idp_id = c.id.ok_or_else(|| {
                    UpstreamError::invalid(
                        Upstream::IdentityProvider,
                        format!("client {} has no id", c.client_id),
                    )
                })?;
                let mut scopes = c.default_client_scopes;
                scopes.sort();
                scopes.dedup();
                Ok(ServiceClient {
                    idp_id,
                    client_id: c.client_id,
                    scopes,
                    enabled: c.enabled,
                })
            })
            .collect()
    }

    async fn create_client(&self, spec: &ClientSpec) -> UpstreamResult<String> {
        let url = self.admin_url("clients");
        let body = Self::representation(spec, None);
        let response = self
            .send_authorized(|http| http.post(&url).json(&body))
            .await?;

        // 201 Created with the new client's URL in Location.
        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                UpstreamError::invalid(
                    Upstream::IdentityProvider,
                    "client creation response has no Location header",
                )
            })
    }

    async fn update_client(&self, idp_id: &str, spec: &ClientSpec) -> UpstreamResult<()> {
        let url = self.admin_url(&format!("clients/{idp_id}"));
        let body = Self::representation(spec, Some(idp_id));
        self.send_authorized(|http| http.put(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_client(&self, idp_id: &str) -> UpstreamResult<()> {
        let url = self.admin_url(&format!("clients/{idp_id}"));
        self.send_authorized(|http| http.delete(&url)).await?;
        Ok(())
    }

    async fn regenerate_secret(&self, idp_id: &str) -> UpstreamResult<String> {
        let url = self.admin_url(&format!("clients/{idp_id}/client-secret"));
        let response = self.send_authorized(|http| http.post(&url)).await?;
        let credential: CredentialRepresentation =
            decode_json(Upstream::IdentityProvider, response).await?;
        Ok(credential.value)
    }

    async fn list_users(&self) -> UpstreamResult<Vec<IdpUser>> {
        let url = self.admin_url("users");
        let mut users = Vec::new();

        for _ in 0..MAX_USER_PAGES {
            let query = [
                ("first", users.len().to_string()),
                ("max", USER_PAGE_SIZE.to_string()),
            ];
            let response = self
                .send_authorized(|http| http.get(&url).query(&query))
                .await?;
            let page: Vec<UserRepresentation> =
                decode_json(Upstream::IdentityProvider, response).await?;
            let received = page.len();
            users.extend(page.into_iter().map(|u| IdpUser {
                id: u.id,
                username: u.username,
                enabled: u.enabled,
            }));

            if received < USER_PAGE_SIZE {
                return Ok(users);
            }
        }

        Err(UpstreamError::invalid(
            Upstream::IdentityProvider,
            format!("user listing exceeded {MAX_USER_PAGES} pages"),
        ))
    }

    async fn list_user_groups(&self, user_id: &str) -> UpstreamResult<Vec<String>> {
        let url = self.admin_url(&format!("users/{user_id}/groups"));
        let response = self.send_authorized(|http| http.get(&url)).await?;
        let groups: Vec<GroupRepresentation> =
            decode_json(Upstream::IdentityProvider, response).await?;
        Ok(groups.into_iter().map(|g| g.name).collect())
    }
}
