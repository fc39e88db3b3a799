//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;
use base64::Engine;
use oauth2_authority::api;
use oauth2_authority::config::OAuth2Config;
use oauth2_authority::notify::Notifier;
use oauth2_authority::oauth2::clients::{NewClient, RegisteredClient};
use oauth2_authority::oauth2::session::SignUp;
use oauth2_authority::oauth2::{ClaimsCodec, OAuth2State};
use oauth2_authority::store::{
    ClientApplication, MemoryRepository, PendingUserAccount, Repository, StoreError, StoreResult,
    Token, TokenKind, UserAccount,
};
use time::OffsetDateTime;

pub const JWT_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct-horse-9battery";
pub const REDIRECT_URI: &str = "https://app.example.org/callback";

/// Remembers every verification it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn reference_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, to)| to == email)
            .map(|(reference, _)| reference.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification(&self, reference: &str, email: &str) -> bool {
        if self.fail.load(Ordering::SeqCst) {
            return false;
        }
        self.sent
            .lock()
            .unwrap()
            .push((reference.to_string(), email.to_string()));
        true
    }
}

/// [`MemoryRepository`] that can be told to refuse refresh tokens or to
/// stall token reads. Token reads always yield once, so concurrent
/// redemptions interleave between lookup and delete.
#[derive(Default)]
pub struct FlakyRepository {
    pub inner: MemoryRepository,
    fail_refresh_tokens: AtomicBool,
    token_read_delay_ms: AtomicU64,
}

impl FlakyRepository {
    pub fn fail_refresh_tokens(&self, fail: bool) {
        self.fail_refresh_tokens.store(fail, Ordering::SeqCst);
    }

    pub fn delay_token_reads(&self, delay: Duration) {
        self.token_read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for FlakyRepository {
    async fn create_user(&self, user: UserAccount) -> StoreResult<String> {
        self.inner.create_user(user).await
    }
    async fn find_user(&self, id: &str) -> StoreResult<Option<UserAccount>> {
        self.inner.find_user(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserAccount>> {
        self.inner.find_user_by_email(email).await
    }
    async fn update_user(&self, user: &UserAccount) -> StoreResult<u64> {
        self.inner.update_user(user).await
    }
    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        self.inner.delete_user(id).await
    }
    async fn list_users(&self, offset: u64, limit: u64) -> StoreResult<Vec<UserAccount>> {
        self.inner.list_users(offset, limit).await
    }
    async fn count_users(&self) -> StoreResult<u64> {
        self.inner.count_users().await
    }
    async fn create_pending(&self, pending: PendingUserAccount) -> StoreResult<String> {
        self.inner.create_pending(pending).await
    }
    async fn find_pending(&self, id: &str) -> StoreResult<Option<PendingUserAccount>> {
        self.inner.find_pending(id).await
    }
    async fn find_pending_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<PendingUserAccount>> {
        self.inner.find_pending_by_email(email).await
    }
    async fn delete_pending(&self, id: &str) -> StoreResult<()> {
        self.inner.delete_pending(id).await
    }
    async fn create_client(&self, client: ClientApplication) -> StoreResult<String> {
        self.inner.create_client(client).await
    }
    async fn find_client(&self, id: &str) -> StoreResult<Option<ClientApplication>> {
        self.inner.find_client(id).await
    }
    async fn find_client_by_name(&self, name: &str) -> StoreResult<Option<ClientApplication>> {
        self.inner.find_client_by_name(name).await
    }
    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        self.inner.delete_client(id).await
    }
    async fn list_clients(&self, offset: u64, limit: u64) -> StoreResult<Vec<ClientApplication>> {
        self.inner.list_clients(offset, limit).await
    }
    async fn count_clients(&self) -> StoreResult<u64> {
        self.inner.count_clients().await
    }
    async fn create_token(&self, kind: TokenKind, token: Token) -> StoreResult<String> {
        if kind == TokenKind::RefreshToken && self.fail_refresh_tokens.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("refresh token table unavailable".to_string()));
        }
        self.inner.create_token(kind, token).await
    }
    async fn find_token(&self, kind: TokenKind, id: &str) -> StoreResult<Option<Token>> {
        let delay = self.token_read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let found = self.inner.find_token(kind, id).await;
        tokio::task::yield_now().await;
        found
    }
    async fn delete_token(&self, kind: TokenKind, id: &str) -> StoreResult<()> {
        self.inner.delete_token(kind, id).await
    }
    async fn purge_expired(&self, now: OffsetDateTime) -> StoreResult<u64> {
        self.inner.purge_expired(now).await
    }
}

pub struct Harness {
    pub state: OAuth2State,
    pub repo: Arc<FlakyRepository>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness() -> Harness {
    harness_with(OAuth2Config::default())
}

pub fn harness_with(settings: OAuth2Config) -> Harness {
    let repo = Arc::new(FlakyRepository::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let codec = ClaimsCodec::new(JWT_SECRET).unwrap();
    let state = OAuth2State::new(repo.clone(), notifier.clone(), codec, settings);
    Harness {
        state,
        repo,
        notifier,
    }
}

pub fn sign_up_request(email: &str) -> SignUp {
    SignUp {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
    }
}

pub fn basic(id: &str, secret: &str) -> (HeaderName, HeaderValue) {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{id}:{secret}"));
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    )
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

/// Query parameters of a redirect `Location`, from the query or fragment.
pub fn redirect_params(location: &str, in_fragment: bool) -> Vec<(String, String)> {
    let url = url::Url::parse(location).unwrap();
    let raw = if in_fragment {
        url.fragment().unwrap_or_default().to_string()
    } else {
        url.query().unwrap_or_default().to_string()
    };
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

pub fn param(params: &[(String, String)], name: &str) -> Option<String> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

impl Harness {
    pub fn server(&self) -> TestServer {
        self.server_with_timeout(Duration::from_secs(5))
    }

    pub fn server_with_timeout(&self, request_timeout: Duration) -> TestServer {
        TestServer::new(api::app(self.state.clone(), request_timeout)).unwrap()
    }

    /// Signs up, verifies and optionally grants realms.
    pub async fn create_user(&self, email: &str, realms: &[&str]) -> UserAccount {
        let sessions = self.state.sessions();
        sessions.sign_up(sign_up_request(email)).await.unwrap();
        let reference = self.notifier.reference_for(email).unwrap();
        let user = sessions.verify_email(&reference).await.unwrap();
        if realms.is_empty() {
            return user;
        }
        sessions
            .update_realms(&user.id, realms.iter().map(|r| r.to_string()).collect())
            .await
            .unwrap()
    }

    pub async fn sign_in(&self, email: &str) -> String {
        self.state
            .sessions()
            .sign_in(email, PASSWORD)
            .await
            .unwrap()
            .assertion
    }

    pub async fn register_client(
        &self,
        owner: &UserAccount,
        name: &str,
        response_type: &str,
        scope: &[&str],
    ) -> RegisteredClient {
        self.state
            .clients()
            .create(
                owner,
                NewClient {
                    name: name.to_string(),
                    description: "integration test client".to_string(),
                    response_type: response_type.to_string(),
                    redirect_uri: REDIRECT_URI.to_string(),
                    scope: scope.iter().map(|s| s.to_string()).collect(),
                },
            )
            .await
            .unwrap()
    }

    /// Moves a token's creation time `seconds` into the past.
    pub async fn age_token(&self, kind: TokenKind, id: &str, seconds: i64) {
        let mut token = self.repo.find_token(kind, id).await.unwrap().unwrap();
        self.repo.delete_token(kind, id).await.unwrap();
        token.created_at -= time::Duration::seconds(seconds);
        self.repo.create_token(kind, token).await.unwrap();
    }

    pub async fn age_client(&self, id: &str, seconds: i64) {
        let mut client = self.repo.find_client(id).await.unwrap().unwrap();
        self.repo.delete_client(id).await.unwrap();
        client.created_at -= time::Duration::seconds(seconds);
        self.repo.create_client(client).await.unwrap();
    }

    pub async fn age_pending(&self, id: &str, seconds: i64) {
        let mut pending = self.repo.find_pending(id).await.unwrap().unwrap();
        self.repo.delete_pending(id).await.unwrap();
        pending.created_at -= time::Duration::seconds(seconds);
        self.repo.create_pending(pending).await.unwrap();
    }

    /// A `code` grant for `user`, returned as the code value.
    pub async fn authorization_code(&self, user: &UserAccount, client_id: &str) -> String {
        let location = self
            .state
            .authorization()
            .authorize(
                user,
                &oauth2_authority::oauth2::authorize::AuthorizeRequest {
                    response_type: "code".to_string(),
                    client_id: client_id.to_string(),
                    redirect_uri: REDIRECT_URI.to_string(),
                    state: "xyz".to_string(),
                    scope: None,
                },
            )
            .await
            .unwrap();
        param(&redirect_params(&location, false), "code").unwrap()
    }
}
