//! Client registry: registration, lookup and deletion of client
//! applications.
//!
//! Every lookup doubles as an integrity check. A client whose lease ran
//! out, or whose owner no longer exists, is deleted on the spot and
//! reported as not found.

use std::collections::BTreeSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;
use crate::oauth2::OAuth2State;
use crate::oauth2::claims::PrincipalKind;
use crate::oauth2::password::{generate_secret, hash_secret, verify_secret};
use crate::oauth2::scopes::{CLIENTS_CREATE, CLIENTS_DELETE};
use crate::store::{
    ClientApplication, Expiring, PAGE_SIZE, Page, ResponseType, StoreError, UserAccount,
};
use crate::validation::client::{
    MAX_CLIENT_DESCRIPTION_LEN, MAX_CLIENT_NAME_LEN, is_valid_client_description,
    is_valid_client_name, is_valid_redirect_uri, is_valid_scope,
};

/// Registration request, as submitted by the owner.
#[derive(Clone, Debug)]
pub struct NewClient {
    pub name: String,
    pub description: String,
    pub response_type: String,
    pub redirect_uri: String,
    pub scope: Vec<String>,
}

/// Result of a registration. `secret` is shown exactly once.
#[derive(Clone, Debug)]
pub struct RegisteredClient {
    pub id: String,
    pub secret: String,
}

pub struct ClientRegistry<'a> {
    state: &'a OAuth2State,
}

impl<'a> ClientRegistry<'a> {
    pub(crate) fn new(state: &'a OAuth2State) -> Self {
        Self { state }
    }

    #[tracing::instrument(skip_all, fields(owner = %owner.id, name = %request.name))]
    pub async fn create(
        &self,
        owner: &UserAccount,
        request: NewClient,
    ) -> Result<RegisteredClient, AuthError> {
        if !owner.has_realms(&[CLIENTS_CREATE]) {
            return Err(AuthError::Unauthorized(format!(
                "registering clients requires the `{CLIENTS_CREATE}` realm"
            )));
        }
        let response_type: ResponseType = request
            .response_type
            .parse()
            .map_err(|_| AuthError::InvalidResponseType)?;
        if !is_valid_redirect_uri(&request.redirect_uri) {
            return Err(AuthError::InvalidRedirectUri);
        }
        let scope: BTreeSet<String> = request.scope.into_iter().collect();
        if !is_valid_scope(response_type, &scope) {
            return Err(AuthError::InvalidScope(format!(
                "scope is not allowed for `{response_type}` clients"
            )));
        }
        if !is_valid_client_name(&request.name) {
            return Err(AuthError::InvalidRequest(format!(
                "client name must be 1 to {MAX_CLIENT_NAME_LEN} characters"
            )));
        }
        if !is_valid_client_description(&request.description) {
            return Err(AuthError::InvalidRequest(format!(
                "client description must be at most {MAX_CLIENT_DESCRIPTION_LEN} characters"
            )));
        }

        let repo = &self.state.repo;
        if let Some(existing) = repo.find_client_by_name(&request.name).await? {
            if !existing.is_expired() {
                return Err(AuthError::DuplicateName(request.name));
            }
            // A lapsed lease frees the name.
            repo.delete_client(&existing.id).await?;
        }

        let secret = generate_secret()?;
        let client = ClientApplication {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            description: request.description,
            response_type,
            redirect_uri: request.redirect_uri,
            scope,
            owner: owner.id.clone(),
            secret_hash: hash_secret(&secret)?,
            created_at: OffsetDateTime::now_utc(),
            ttl: self.state.settings.client_lifetime,
        };
        let name = client.name.clone();
        let id = match repo.create_client(client).await {
            Ok(id) => id,
            Err(StoreError::Conflict(_)) => return Err(AuthError::DuplicateName(name)),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(client_id = %id, "client registered");
        Ok(RegisteredClient { id, secret })
    }

    /// Live client by id. Expired or orphaned clients are deleted and
    /// reported as not found.
    pub async fn find_by_id(&self, id: &str) -> Result<ClientApplication, AuthError> {
        let client = self.state.repo.find_client(id).await?;
        self.ensure_live(client).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<ClientApplication, AuthError> {
        let client = self.state.repo.find_client_by_name(name).await?;
        self.ensure_live(client).await
    }

    async fn ensure_live(
        &self,
        client: Option<ClientApplication>,
    ) -> Result<ClientApplication, AuthError> {
        let Some(client) = client else {
            return Err(AuthError::NotFound("client"));
        };
        let repo = &self.state.repo;
        if client.is_expired_at(OffsetDateTime::now_utc()) {
            repo.delete_client(&client.id).await?;
            tracing::info!(client_id = %client.id, "client lease expired, client removed");
            return Err(AuthError::NotFound("client"));
        }
        if repo.find_user(&client.owner).await?.is_none() {
            repo.delete_client(&client.id).await?;
            tracing::warn!(
                client_id = %client.id,
                owner = %client.owner,
                "client owner no longer exists, client removed"
            );
            return Err(AuthError::NotFound("client"));
        }
        Ok(client)
    }

    /// Allowed for the owner or for holders of the `clients.delete` realm.
    #[tracing::instrument(skip_all, fields(%client_id, caller = %caller.id))]
    pub async fn delete(&self, client_id: &str, caller: &UserAccount) -> Result<(), AuthError> {
        let client = self.find_by_id(client_id).await?;
        if client.owner != caller.id && !caller.has_realms(&[CLIENTS_DELETE]) {
            return Err(AuthError::Unauthorized(
                "only the owner or a `clients.delete` realm holder may delete this client"
                    .to_string(),
            ));
        }
        self.state.repo.delete_client(&client.id).await?;
        tracing::info!("client deleted");
        Ok(())
    }

    /// Page of live clients. Expired and orphaned clients are removed across
    /// the whole collection first, so `total` and the page agree.
    pub async fn list(&self, page: u64) -> Result<Page<ClientApplication>, AuthError> {
        self.remove_dead_clients().await?;
        let repo = &self.state.repo;
        let items = repo
            .list_clients(page.saturating_mul(PAGE_SIZE), PAGE_SIZE)
            .await?;
        let total = repo.count_clients().await?;
        Ok(Page { items, page, total })
    }

    async fn remove_dead_clients(&self) -> Result<u64, AuthError> {
        let repo = &self.state.repo;
        let mut offset = 0;
        let mut removed = 0;
        loop {
            let batch = repo.list_clients(offset, PAGE_SIZE).await?;
            let fetched = batch.len() as u64;
            for client in batch {
                match self.ensure_live(Some(client)).await {
                    Ok(_) => offset += 1,
                    // Deleted rows shift the rest of the listing back.
                    Err(AuthError::NotFound(_)) => removed += 1,
                    Err(e) => return Err(e),
                }
            }
            if fetched < PAGE_SIZE {
                break;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "dead clients removed while listing");
        }
        Ok(removed)
    }

    /// Exchange a client id and secret for a signed client assertion whose
    /// fingerprint is the current secret hash.
    #[tracing::instrument(skip(self, secret))]
    pub async fn issue_assertion(&self, id: &str, secret: &str) -> Result<String, AuthError> {
        let client = match self.find_by_id(id).await {
            Ok(client) => client,
            Err(AuthError::NotFound(_)) => {
                return Err(AuthError::InvalidClient(
                    "unknown client or wrong secret".to_string(),
                ));
            }
            Err(e) => return Err(e),
        };
        if !verify_secret(secret, &client.secret_hash) {
            return Err(AuthError::InvalidClient(
                "unknown client or wrong secret".to_string(),
            ));
        }
        self.state.codec.issue(
            &client.id,
            PrincipalKind::Client,
            &client.secret_hash,
            self.state.settings.session_lifetime,
        )
    }
}
