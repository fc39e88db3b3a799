//! Session issuer: sign-up with email verification, sign-in, and the
//! account maintenance operations that rotate or edit a user record.

use std::collections::BTreeSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;
use crate::oauth2::OAuth2State;
use crate::oauth2::claims::PrincipalKind;
use crate::oauth2::password::{generate_secret, hash_secret, verify_decoy, verify_secret};
use crate::oauth2::scopes::{ADMIN_REALMS, USERS_DELETE, is_known_realm};
use crate::store::{Expiring, PAGE_SIZE, Page, PendingUserAccount, StoreError, UserAccount};
use crate::validation::account::{
    MAX_NAME_LEN, MIN_NAME_LEN, check_password, is_valid_email, is_valid_person_name,
};

#[derive(Clone, Debug)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// A signed user assertion and its lifetime in seconds.
#[derive(Clone, Debug)]
pub struct Session {
    pub assertion: String,
    pub expires_in: i64,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_names(first_name: &str, last_name: &str) -> Result<(), AuthError> {
    if is_valid_person_name(first_name) && is_valid_person_name(last_name) {
        Ok(())
    } else {
        Err(AuthError::InvalidRequest(format!(
            "first and last name must be {MIN_NAME_LEN} to {MAX_NAME_LEN} characters"
        )))
    }
}

pub struct SessionIssuer<'a> {
    state: &'a OAuth2State,
}

impl<'a> SessionIssuer<'a> {
    pub(crate) fn new(state: &'a OAuth2State) -> Self {
        Self { state }
    }

    /// Store a pending account and send its verification reference.
    /// Returns the reference.
    #[tracing::instrument(skip_all, fields(email = %request.email))]
    pub async fn sign_up(&self, request: SignUp) -> Result<String, AuthError> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        check_password(&request.password).map_err(AuthError::WeakPassword)?;
        check_names(&request.first_name, &request.last_name)?;

        let repo = &self.state.repo;
        if repo.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }
        if let Some(pending) = repo.find_pending_by_email(&email).await? {
            if !pending.is_expired() {
                return Err(AuthError::VerificationAlreadySent);
            }
            repo.delete_pending(&pending.id).await?;
        }

        let now = OffsetDateTime::now_utc();
        let pending = PendingUserAccount {
            id: generate_secret()?,
            email: email.clone(),
            user: UserAccount {
                // Assigned on verification.
                id: String::new(),
                email: email.clone(),
                password_hash: hash_secret(&request.password)?,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                realms: BTreeSet::new(),
                created_at: now,
            },
            created_at: now,
            ttl: self.state.settings.pending_lifetime,
        };
        let reference = match repo.create_pending(pending).await {
            Ok(id) => id,
            Err(StoreError::Conflict(_)) => return Err(AuthError::VerificationAlreadySent),
            Err(e) => return Err(e.into()),
        };

        if !self.state.notifier.send_verification(&reference, &email).await {
            repo.delete_pending(&reference).await?;
            tracing::warn!("verification could not be sent, pending sign-up rolled back");
            return Err(AuthError::internal("verification email could not be sent"));
        }
        tracing::info!("sign-up awaiting verification");
        Ok(reference)
    }

    /// Turn a pending sign-up into an account. Works once per reference.
    #[tracing::instrument(skip_all)]
    pub async fn verify_email(&self, reference: &str) -> Result<UserAccount, AuthError> {
        let repo = &self.state.repo;
        let Some(pending) = repo.find_pending(reference).await? else {
            return Err(AuthError::NotFound("verification reference"));
        };
        let now = OffsetDateTime::now_utc();
        if pending.is_expired_at(now) {
            repo.delete_pending(&pending.id).await?;
            return Err(AuthError::NotFound("verification reference"));
        }

        let mut user = pending.user;
        user.id = Uuid::new_v4().to_string();
        user.email = pending.email;
        user.created_at = now;
        if self
            .state
            .settings
            .admin_emails
            .iter()
            .any(|admin| normalize_email(admin) == user.email)
        {
            user.realms = ADMIN_REALMS.iter().map(|r| r.to_string()).collect();
            tracing::info!(user_id = %user.id, "administrator account bootstrapped");
        }

        match repo.create_user(user.clone()).await {
            Ok(_) => {}
            Err(StoreError::Conflict(_)) => {
                repo.delete_pending(&pending.id).await?;
                return Err(AuthError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        }
        repo.delete_pending(&pending.id).await?;
        tracing::info!(user_id = %user.id, "email verified, account created");
        Ok(user)
    }

    /// Check a password and issue a short-lived user assertion carrying the
    /// current password hash as its fingerprint.
    #[tracing::instrument(skip_all)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.state.repo.find_user_by_email(&email).await? else {
            verify_decoy(password);
            return Err(AuthError::IncorrectCredentials);
        };
        if !verify_secret(password, &user.password_hash) {
            return Err(AuthError::IncorrectCredentials);
        }
        tracing::info!(user_id = %user.id, "signed in");
        self.session_for(&user)
    }

    fn session_for(&self, user: &UserAccount) -> Result<Session, AuthError> {
        let expires_in = self.state.settings.session_lifetime;
        let assertion = self.state.codec.issue(
            &user.id,
            PrincipalKind::User,
            &user.password_hash,
            expires_in,
        )?;
        Ok(Session {
            assertion,
            expires_in,
        })
    }

    async fn save(&self, user: &UserAccount) -> Result<(), AuthError> {
        if self.state.repo.update_user(user).await? == 0 {
            return Err(AuthError::NotFound("user"));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(user_id = %user.id))]
    pub async fn update_profile(
        &self,
        user: &UserAccount,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserAccount, AuthError> {
        check_names(first_name, last_name)?;
        let mut updated = user.clone();
        updated.first_name = first_name.trim().to_string();
        updated.last_name = last_name.trim().to_string();
        self.save(&updated).await?;
        Ok(updated)
    }

    /// Rotate the password hash. Every assertion issued before the change
    /// stops verifying; the returned session is the only valid one.
    #[tracing::instrument(skip_all, fields(user_id = %user.id))]
    pub async fn change_password(
        &self,
        user: &UserAccount,
        current: &str,
        new: &str,
    ) -> Result<Session, AuthError> {
        if !verify_secret(current, &user.password_hash) {
            return Err(AuthError::IncorrectCredentials);
        }
        check_password(new).map_err(AuthError::WeakPassword)?;
        let mut updated = user.clone();
        updated.password_hash = hash_secret(new)?;
        self.save(&updated).await?;
        tracing::info!("password changed");
        self.session_for(&updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_realms(
        &self,
        target_id: &str,
        realms: Vec<String>,
    ) -> Result<UserAccount, AuthError> {
        if let Some(unknown) = realms.iter().find(|r| !is_known_realm(r)) {
            return Err(AuthError::InvalidRequest(format!("unknown realm `{unknown}`")));
        }
        let Some(mut user) = self.state.repo.find_user(target_id).await? else {
            return Err(AuthError::NotFound("user"));
        };
        user.realms = realms.into_iter().collect();
        self.save(&user).await?;
        tracing::info!("realms updated");
        Ok(user)
    }

    /// Remove another account. Its clients and tokens stop resolving and
    /// are cleaned up the next time they are used.
    #[tracing::instrument(skip_all, fields(caller = %caller.id, %target_id))]
    pub async fn delete_user(&self, caller: &UserAccount, target_id: &str) -> Result<(), AuthError> {
        if !caller.has_realms(&[USERS_DELETE]) {
            return Err(AuthError::Unauthorized(format!(
                "deleting accounts requires the `{USERS_DELETE}` realm"
            )));
        }
        if caller.id == target_id {
            return Err(AuthError::InvalidRequest(
                "an account cannot delete itself".to_string(),
            ));
        }
        let repo = &self.state.repo;
        if repo.find_user(target_id).await?.is_none() {
            return Err(AuthError::NotFound("user"));
        }
        repo.delete_user(target_id).await?;
        tracing::info!("user deleted");
        Ok(())
    }

    pub async fn list_users(&self, page: u64) -> Result<Page<UserAccount>, AuthError> {
        let repo = &self.state.repo;
        let items = repo
            .list_users(page.saturating_mul(PAGE_SIZE), PAGE_SIZE)
            .await?;
        let total = repo.count_users().await?;
        Ok(Page { items, page, total })
    }
}
