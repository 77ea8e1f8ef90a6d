//! Token manager lifecycle: slack-driven refresh, rotation persistence, and
//! the credential error taxonomy.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use support::connection;
use support::providers::{PlainTextCipher, ScriptedExchanger};
use support::stores::InMemoryConnections;
use tutorlane_core::TokenManager;
use tutorlane_domain::{CalendarProviderKind, RefreshedToken, SyncStatus, TutorlaneError};

fn manager_with(
    rows: Vec<tutorlane_domain::CalendarConnection>,
) -> (TokenManager, InMemoryConnections, Arc<ScriptedExchanger>) {
    let connections = InMemoryConnections::new(rows);
    let exchanger = Arc::new(ScriptedExchanger::default());
    let manager = TokenManager::new(
        Arc::new(connections.clone()),
        exchanger.clone(),
        Arc::new(PlainTextCipher),
    );
    (manager, connections, exchanger)
}

#[tokio::test]
async fn fresh_token_is_returned_without_an_exchange() {
    let conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    let (manager, _, exchanger) = manager_with(vec![conn.clone()]);

    let token = manager.ensure_fresh_access_token(&conn).await.unwrap();

    assert_eq!(token.as_deref(), Some("access-c1"));
    assert_eq!(exchanger.call_count(), 0);
}

#[tokio::test]
async fn expiring_token_is_refreshed_and_persisted_before_return() {
    let mut conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    conn.access_token_expires_at = Some(Utc::now() + Duration::seconds(45));
    let (manager, connections, exchanger) = manager_with(vec![conn.clone()]);

    let token = manager.ensure_fresh_access_token(&conn).await.unwrap();

    assert_eq!(token.as_deref(), Some("refreshed-access"));
    assert_eq!(exchanger.call_count(), 1);

    let stored = connections.get("c1").unwrap();
    assert_eq!(stored.access_token_enc, "enc:refreshed-access");
    assert!(stored.access_token_expires_at.unwrap() > Utc::now() + Duration::minutes(50));
    assert_eq!(stored.status, SyncStatus::Healthy);
    assert!(stored.last_error.is_none());
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted() {
    let mut conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    conn.access_token_expires_at = None;
    let (manager, connections, exchanger) = manager_with(vec![conn.clone()]);
    exchanger.push(Ok(RefreshedToken {
        access_token: "new-access".into(),
        expires_in: 3600,
        refresh_token: Some("new-refresh".into()),
    }));

    manager.ensure_fresh_access_token(&conn).await.unwrap();

    let stored = connections.get("c1").unwrap();
    assert_eq!(stored.refresh_token_enc.as_deref(), Some("enc:new-refresh"));
}

#[tokio::test]
async fn unrotated_refresh_token_is_kept() {
    let mut conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    conn.access_token_expires_at = None;
    let (manager, connections, _) = manager_with(vec![conn.clone()]);

    manager.ensure_fresh_access_token(&conn).await.unwrap();

    let stored = connections.get("c1").unwrap();
    assert_eq!(stored.refresh_token_enc.as_deref(), Some("enc:refresh-c1"));
}

#[tokio::test]
async fn missing_refresh_token_yields_none_without_an_exchange() {
    let mut conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    conn.access_token_expires_at = Some(Utc::now() - Duration::minutes(1));
    conn.refresh_token_enc = None;
    let (manager, _, exchanger) = manager_with(vec![conn.clone()]);

    let token = manager.ensure_fresh_access_token(&conn).await.unwrap();

    assert!(token.is_none());
    assert_eq!(exchanger.call_count(), 0);
}

#[tokio::test]
async fn refresh_rejection_marks_the_connection_error() {
    let mut conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    conn.access_token_expires_at = None;
    let (manager, connections, exchanger) = manager_with(vec![conn.clone()]);
    exchanger.push(Err(TutorlaneError::Auth("Token refresh failed (400 Bad Request)".into())));

    let token = manager.ensure_fresh_access_token(&conn).await.unwrap();

    assert!(token.is_none());
    let stored = connections.get("c1").unwrap();
    assert_eq!(stored.status, SyncStatus::Error);
    assert!(stored.last_error.unwrap().contains("400"));
}

#[tokio::test]
async fn transport_failure_during_refresh_propagates() {
    let mut conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    conn.access_token_expires_at = None;
    let (manager, connections, exchanger) = manager_with(vec![conn.clone()]);
    exchanger.push(Err(TutorlaneError::Network("connection reset by peer".into())));

    let result = manager.ensure_fresh_access_token(&conn).await;

    assert!(matches!(result, Err(TutorlaneError::Network(_))));
    assert_eq!(connections.get("c1").unwrap().status, SyncStatus::Error);
}

#[tokio::test]
async fn missing_expiry_is_treated_as_expired() {
    let mut conn = connection("c1", "tutor-1", CalendarProviderKind::Google, "t@gmail.com");
    conn.access_token_expires_at = None;
    let (manager, _, exchanger) = manager_with(vec![conn.clone()]);

    let token = manager.ensure_fresh_access_token(&conn).await.unwrap();

    assert_eq!(token.as_deref(), Some("refreshed-access"));
    assert_eq!(exchanger.call_count(), 1);
}

