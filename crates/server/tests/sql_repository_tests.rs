//! The SeaORM repository against an in-memory SQLite database.

use std::collections::BTreeSet;
use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use oauth2_authority::store::{
    ClientApplication, PendingUserAccount, Repository, ResponseType, SqlRepository, StoreError,
    Token, TokenKind, UserAccount,
};
use sea_orm::Database;
use time::OffsetDateTime;
use time::macros::datetime;

async fn repository() -> SqlRepository {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    SqlRepository::new(Arc::new(db))
}

fn realms(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn user(id: &str, email: &str, created_at: OffsetDateTime) -> UserAccount {
    UserAccount {
        id: id.to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$stub".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        realms: BTreeSet::new(),
        created_at,
    }
}

fn client(
    id: &str,
    name: &str,
    owner: &str,
    created_at: OffsetDateTime,
    ttl: i64,
) -> ClientApplication {
    ClientApplication {
        id: id.to_string(),
        name: name.to_string(),
        description: "test client".to_string(),
        response_type: ResponseType::Code,
        redirect_uri: "https://app.example.org/callback".to_string(),
        scope: realms(&["email", "public"]),
        owner: owner.to_string(),
        secret_hash: "$argon2id$secret".to_string(),
        created_at,
        ttl,
    }
}

fn token(id: &str, created_at: OffsetDateTime, ttl: i64) -> Token {
    Token {
        id: id.to_string(),
        client_id: "client-1".to_string(),
        user_id: "user-1".to_string(),
        created_at,
        ttl,
    }
}

const NOW: OffsetDateTime = datetime!(2026-10-18 12:00 UTC);

#[tokio::test]
async fn users_round_trip_with_their_realms() {
    let repo = repository().await;
    let mut ada = user("user-1", "ada@example.org", NOW);
    ada.realms = realms(&["clients.create", "users.read"]);

    assert_eq!(repo.create_user(ada.clone()).await.unwrap(), "user-1");
    assert_eq!(repo.find_user("user-1").await.unwrap(), Some(ada.clone()));
    assert_eq!(
        repo.find_user_by_email("ada@example.org").await.unwrap(),
        Some(ada.clone())
    );
    assert!(repo.find_user("missing").await.unwrap().is_none());

    ada.first_name = "Augusta".to_string();
    ada.realms.clear();
    assert_eq!(repo.update_user(&ada).await.unwrap(), 1);
    let stored = repo.find_user("user-1").await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Augusta");
    assert!(stored.realms.is_empty());

    let ghost = user("ghost", "ghost@example.org", NOW);
    assert_eq!(repo.update_user(&ghost).await.unwrap(), 0);

    repo.delete_user("user-1").await.unwrap();
    assert!(repo.find_user("user-1").await.unwrap().is_none());
    // Deleting twice is not an error.
    repo.delete_user("user-1").await.unwrap();
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let repo = repository().await;
    repo.create_user(user("user-1", "ada@example.org", NOW))
        .await
        .unwrap();

    let err = repo
        .create_user(user("user-2", "ada@example.org", NOW))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn pending_sign_ups_round_trip() {
    let repo = repository().await;
    let pending = PendingUserAccount {
        id: "reference-1".to_string(),
        email: "ada@example.org".to_string(),
        user: user("", "ada@example.org", NOW),
        created_at: NOW,
        ttl: 600,
    };

    repo.create_pending(pending.clone()).await.unwrap();
    assert_eq!(
        repo.find_pending("reference-1").await.unwrap(),
        Some(pending.clone())
    );
    assert_eq!(
        repo.find_pending_by_email("ada@example.org")
            .await
            .unwrap()
            .map(|p| p.id),
        Some("reference-1".to_string())
    );

    repo.delete_pending("reference-1").await.unwrap();
    assert!(repo.find_pending("reference-1").await.unwrap().is_none());
}

#[tokio::test]
async fn clients_round_trip_and_names_are_unique() {
    let repo = repository().await;
    let app = client("client-1", "app", "user-1", NOW, 7_890_000);

    repo.create_client(app.clone()).await.unwrap();
    assert_eq!(repo.find_client("client-1").await.unwrap(), Some(app.clone()));
    assert_eq!(
        repo.find_client_by_name("app").await.unwrap(),
        Some(app.clone())
    );

    let err = repo
        .create_client(client("client-2", "app", "user-1", NOW, 7_890_000))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    repo.delete_client("client-1").await.unwrap();
    assert!(repo.find_client_by_name("app").await.unwrap().is_none());
}

#[tokio::test]
async fn token_kinds_live_in_separate_tables() {
    let repo = repository().await;
    let shared = token("same-id", NOW, 60);

    repo.create_token(TokenKind::AccessToken, shared.clone())
        .await
        .unwrap();
    repo.create_token(TokenKind::RefreshToken, shared.clone())
        .await
        .unwrap();

    assert!(
        repo.find_token(TokenKind::AuthorizationCode, "same-id")
            .await
            .unwrap()
            .is_none()
    );
    repo.delete_token(TokenKind::AccessToken, "same-id")
        .await
        .unwrap();
    assert!(
        repo.find_token(TokenKind::AccessToken, "same-id")
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(
        repo.find_token(TokenKind::RefreshToken, "same-id")
            .await
            .unwrap(),
        Some(shared)
    );
}

#[tokio::test]
async fn listings_are_ordered_and_paged() {
    let repo = repository().await;
    for i in 0..12i64 {
        let created_at = NOW + time::Duration::seconds(i);
        repo.create_user(user(
            &format!("user-{i:02}"),
            &format!("user{i}@example.org"),
            created_at,
        ))
        .await
        .unwrap();
        repo.create_client(client(
            &format!("client-{i:02}"),
            &format!("app{i}"),
            "user-00",
            created_at,
            7_890_000,
        ))
        .await
        .unwrap();
    }

    assert_eq!(repo.count_users().await.unwrap(), 12);
    assert_eq!(repo.count_clients().await.unwrap(), 12);

    let first = repo.list_users(0, 10).await.unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].id, "user-00");
    let second = repo.list_users(10, 10).await.unwrap();
    assert_eq!(
        second.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
        vec!["user-10", "user-11"]
    );

    let clients = repo.list_clients(10, 10).await.unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0].id, "client-10");
}

#[tokio::test]
async fn purge_removes_only_expired_records() {
    let repo = repository().await;
    let old = NOW - time::Duration::hours(2);

    repo.create_token(TokenKind::AccessToken, token("stale", old, 3600))
        .await
        .unwrap();
    repo.create_token(TokenKind::AuthorizationCode, token("stale", old, 60))
        .await
        .unwrap();
    repo.create_token(TokenKind::RefreshToken, token("fresh", old, 86_400))
        .await
        .unwrap();
    repo.create_client(client("client-1", "old", "user-1", old, 60))
        .await
        .unwrap();
    repo.create_client(client("client-2", "current", "user-1", old, 7_890_000))
        .await
        .unwrap();

    assert_eq!(repo.purge_expired(NOW).await.unwrap(), 3);
    assert!(
        repo.find_token(TokenKind::RefreshToken, "fresh")
            .await
            .unwrap()
            .is_some()
    );
    assert!(repo.find_client("client-1").await.unwrap().is_none());
    assert!(repo.find_client("client-2").await.unwrap().is_some());
    assert_eq!(repo.purge_expired(NOW).await.unwrap(), 0);
}
