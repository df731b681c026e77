//! Database-backed account tests
//!
//! Run against a disposable PostgreSQL database named by `TEST_DATABASE_URL`;
//! every test returns early when the variable is unset.

use labtrack_common::{
    auth::{self, AuthContext},
    config::{AuthConfig, TenancyConfig},
    db::{migrations, models::User, DbPool, NewCenter, NewUser, Repository},
    errors::AppError,
};
use sea_orm::Database;
use uuid::Uuid;

async fn test_repo() -> Option<Repository> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };

    let conn = Database::connect(url).await.unwrap();
    migrations::bootstrap_shared_schema(&conn).await.unwrap();
    Some(Repository::new(DbPool::from_connection(conn)))
}

fn tag() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

async fn register(repo: &Repository, email: &str, password: &str, center_id: Option<Uuid>) -> User {
    repo.create_user(NewUser {
        email: email.to_string(),
        username: email.split('@').next().unwrap_or_default().to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: None,
        center_id,
        is_center_admin: false,
        password_hash: auth::hash_password(password, None).unwrap(),
    })
    .await
    .unwrap()
}

/// What the bearer-token extractor builds for a valid token
async fn context_for(repo: &Repository, token: &str) -> Option<AuthContext> {
    repo.find_active_session(&auth::hash_token(token))
        .await
        .unwrap()
        .map(|(session, user)| AuthContext {
            user,
            session_id: session.id,
        })
}

#[tokio::test]
async fn test_login_session_and_logout() {
    let Some(repo) = test_repo().await else { return };
    let config = AuthConfig::default();
    let email = format!("tech_{}@lab.test", tag());
    let user = register(&repo, &email, "s3cret-pass", None).await;

    // Login identifier is case-insensitive
    let outcome = auth::authenticate(&repo, &email.to_uppercase(), "s3cret-pass", &config)
        .await
        .unwrap();
    assert_eq!(outcome.user.id, user.id);
    assert!(outcome.expires_at > chrono::Utc::now());

    let ctx = context_for(&repo, &outcome.token).await.unwrap();
    assert_eq!(ctx.user_id(), user.id);
    assert!(repo.find_user(user.id).await.unwrap().unwrap().last_login.is_some());

    // Only the digest is stored
    assert!(context_for(&repo, &auth::hash_token(&outcome.token)).await.is_none());

    auth::logout(&repo, &ctx).await.unwrap();
    assert!(context_for(&repo, &outcome.token).await.is_none());
}

#[tokio::test]
async fn test_bad_credentials_are_rejected() {
    let Some(repo) = test_repo().await else { return };
    let config = AuthConfig::default();
    let email = format!("tech_{}@lab.test", tag());
    register(&repo, &email, "s3cret-pass", None).await;

    let err = auth::authenticate(&repo, &email, "wrong-pass", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    let err = auth::authenticate(&repo, &format!("nobody_{}@lab.test", tag()), "s3cret-pass", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn test_center_users_follow_affiliation() {
    let Some(repo) = test_repo().await else { return };
    let config = AuthConfig::default();
    let center = repo
        .create_center(
            NewCenter {
                name: format!("Accounts {}", tag()),
                ..Default::default()
            },
            &TenancyConfig::default(),
        )
        .await
        .unwrap();

    let member = register(&repo, &format!("a_{}@lab.test", tag()), "s3cret-pass", Some(center.id)).await;
    let colleague = register(&repo, &format!("b_{}@lab.test", tag()), "s3cret-pass", Some(center.id)).await;
    let outsider = register(&repo, &format!("c_{}@lab.test", tag()), "s3cret-pass", None).await;

    let outcome = auth::authenticate(&repo, &member.email, "s3cret-pass", &config)
        .await
        .unwrap();
    let ctx = context_for(&repo, &outcome.token).await.unwrap();

    let center_id = ctx.require_center().unwrap();
    assert_eq!(center_id, center.id);
    let ids: Vec<Uuid> = repo
        .list_users_by_center(center_id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert!(ids.contains(&member.id));
    assert!(ids.contains(&colleague.id));
    assert!(!ids.contains(&outsider.id));

    let outcome = auth::authenticate(&repo, &outsider.email, "s3cret-pass", &config)
        .await
        .unwrap();
    let ctx = context_for(&repo, &outcome.token).await.unwrap();
    assert!(matches!(ctx.require_center(), Err(AppError::NoCenter)));
}
