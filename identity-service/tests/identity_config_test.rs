//! HTTP tests for listing, fetching and disconnecting linked identities.

mod common;

use axum::http::StatusCode;
use common::{build_request, TestApp};
use identity_service::models::UserAuthState;

const USER_ID: i64 = 42;

async fn app_with_user(has_usable_password: bool) -> TestApp {
    let app = TestApp::spawn().await.expect("Failed to spawn test app");
    app.identities
        .insert_user(UserAuthState::new(USER_ID, has_usable_password))
        .unwrap();
    app
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = app_with_user(true).await;

    let (status, _) = app.get("/users/me/identities", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = axum::http::Request::builder()
        .uri("/users/me/identities")
        .header("Authorization", "Bearer not-a-jwt")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = app.request(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_returns_every_identity_with_status() {
    let app = app_with_user(false).await;
    let social = app.identities.add_social_identity(USER_ID, "github").unwrap();
    let global = app.identities.add_global_identity(USER_ID, "google").unwrap();
    let org = app.identities.add_org_identity(USER_ID, 7, false).unwrap();

    let (status, body) = app.get("/users/me/identities", Some(USER_ID)).await;
    assert_eq!(status, StatusCode::OK);

    let items = body.as_array().expect("array body");
    assert_eq!(items.len(), 3);

    assert_eq!(items[0]["id"], social.to_string());
    assert_eq!(items[0]["category"], "social-identity");
    assert_eq!(items[0]["status"], "can_disconnect");

    assert_eq!(items[1]["id"], global.to_string());
    assert_eq!(items[1]["category"], "global-identity");
    assert_eq!(items[1]["status"], "needed_for_global_auth");

    assert_eq!(items[2]["id"], org.to_string());
    assert_eq!(items[2]["category"], "org-identity");
    assert_eq!(items[2]["status"], "needed_for_org_auth");
    assert_eq!(items[2]["organization"]["id"], 7);
}

#[tokio::test]
async fn get_single_identity() {
    let app = app_with_user(true).await;
    let global = app.identities.add_global_identity(USER_ID, "google").unwrap();

    let (status, body) = app
        .get(
            &format!("/users/me/identities/global-identity/{}", global),
            Some(USER_ID),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"]["key"], "google");
    assert_eq!(body["provider"]["name"], "Google");
    assert_eq!(body["status"], "can_disconnect");

    // Right id, wrong category
    let (status, _) = app
        .get(
            &format!("/users/me/identities/social-identity/{}", global),
            Some(USER_ID),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_category_or_id_is_not_found() {
    let app = app_with_user(true).await;
    let global = app.identities.add_global_identity(USER_ID, "google").unwrap();

    for uri in [
        format!("/users/me/identities/identity/{}", global),
        "/users/me/identities/global-identity/abc".to_string(),
    ] {
        let (status, _) = app.get(&uri, Some(USER_ID)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {}", uri);
        let (status, _) = app.delete(&uri, Some(USER_ID)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "DELETE {}", uri);
    }
}

#[tokio::test]
async fn delete_disconnectable_identity() {
    let app = app_with_user(true).await;
    let global = app.identities.add_global_identity(USER_ID, "google").unwrap();
    let uri = format!("/users/me/identities/global-identity/{}", global);

    let (status, _) = app.delete(&uri, Some(USER_ID)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri, Some(USER_ID)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&uri, Some(USER_ID)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_needed_identity_is_not_allowed() {
    let app = app_with_user(false).await;
    let global = app.identities.add_global_identity(USER_ID, "google").unwrap();
    let org = app.identities.add_org_identity(USER_ID, 7, false).unwrap();

    let (status, body) = app
        .delete(
            &format!("/users/me/identities/global-identity/{}", global),
            Some(USER_ID),
        )
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("needed_for_global_auth"));

    let (status, _) = app
        .delete(
            &format!("/users/me/identities/org-identity/{}", org),
            Some(USER_ID),
        )
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (_, body) = app.get("/users/me/identities", Some(USER_ID)).await;
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn cannot_touch_another_users_identity() {
    let app = app_with_user(true).await;
    app.identities
        .insert_user(UserAuthState::new(USER_ID + 1, true))
        .unwrap();
    let foreign = app
        .identities
        .add_social_identity(USER_ID + 1, "github")
        .unwrap();
    let uri = format!("/users/me/identities/social-identity/{}", foreign);

    let (status, _) = app.delete(&uri, Some(USER_ID)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&uri, Some(USER_ID + 1)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn parallel_deletes_leave_one_login_method() {
    let app = app_with_user(false).await;
    let first = app.identities.add_global_identity(USER_ID, "google").unwrap();
    let second = app.identities.add_global_identity(USER_ID, "github").unwrap();

    let (a, b) = tokio::join!(
        app.request(build_request(
            "DELETE",
            &format!("/users/me/identities/global-identity/{}", first),
            Some(USER_ID),
            None,
        )),
        app.request(build_request(
            "DELETE",
            &format!("/users/me/identities/global-identity/{}", second),
            Some(USER_ID),
            None,
        )),
    );

    let statuses = [a.0, b.0];
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::NO_CONTENT)
            .count(),
        1
    );
    assert!(statuses.contains(&StatusCode::METHOD_NOT_ALLOWED));

    let (_, body) = app.get("/users/me/identities", Some(USER_ID)).await;
    let items = body.as_array().expect("array body");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "needed_for_global_auth");
}
