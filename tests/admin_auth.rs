mod common;

use axum::http::StatusCode;
use common::{admin_login, register, Client, TestApp, PRIMARY_PASSWORD, PRIMARY_USERNAME};
use serde_json::json;

async fn primary(app: &TestApp) -> Client {
    let mut client = app.client();
    let res = admin_login(&mut client, PRIMARY_USERNAME, PRIMARY_PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK);
    client
}

async fn create_sub_admin(client: &mut Client, username: &str, password: &str) -> i64 {
    let res = client
        .post(
            "/api/admin-auth/create-sub-admin",
            json!({ "username": username, "password": password, "permissions": ["/calculators"] }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    res.body["admin"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn primary_creates_a_sub_admin_who_can_log_in() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;

    let res = root
        .post(
            "/api/admin-auth/create-sub-admin",
            json!({ "username": "bob", "password": "abcdef" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["admin"]["role"], "sub_admin");
    assert_eq!(res.body["admin"]["permissions"], json!([]));

    let mut bob = app.client();
    let res = admin_login(&mut bob, "bob", "abcdef").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["admin"]["username"], "bob");

    let res = bob.get("/api/admin-auth/session").await;
    assert_eq!(res.body["authenticated"], true);
    assert_eq!(res.body["admin"]["role"], "sub_admin");
}

#[tokio::test]
async fn sub_admin_cannot_manage_admins() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;
    create_sub_admin(&mut root, "bob", "abcdef").await;
    let primary_id = root.get("/api/admin-auth/session").await.body["admin"]["id"]
        .as_i64()
        .unwrap();

    let mut bob = app.client();
    admin_login(&mut bob, "bob", "abcdef").await;

    let res = bob.delete(&format!("/api/admin-auth/admins/{primary_id}")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "Only admin can delete sub-admins");

    let res = bob.get("/api/admin-auth/admins").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = bob
        .post(
            "/api/admin-auth/create-sub-admin",
            json!({ "username": "carol", "password": "abcdef" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = bob
        .put(
            &format!("/api/admin-auth/admins/{primary_id}"),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn users_and_anonymous_callers_are_kept_out() {
    let app = TestApp::new().await;

    let mut anonymous = app.client();
    let res = anonymous.get("/api/admin-auth/admins").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let mut user = app.client();
    register(&mut user, "a@x.com", "secret1", "A").await;
    let res = user.get("/api/admin-auth/admins").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = user.get("/api/admin-auth/session").await;
    assert_eq!(res.body["authenticated"], false);
    assert_eq!(res.body["admin"], serde_json::Value::Null);

    let res = user
        .post(
            "/api/admin-auth/change-password",
            json!({ "currentPassword": "secret1", "newPassword": "secret2" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Not authenticated as admin");
}

#[tokio::test]
async fn admin_login_failures_share_one_message() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;
    let bob_id = create_sub_admin(&mut root, "bob", "abcdef").await;
    root.put(
        &format!("/api/admin-auth/admins/{bob_id}"),
        json!({ "is_active": false }),
    )
    .await;

    let mut client = app.client();
    let unknown = admin_login(&mut client, "nobody", "abcdef").await;
    let wrong = admin_login(&mut client, PRIMARY_USERNAME, "not-it").await;
    let inactive = admin_login(&mut client, "bob", "abcdef").await;

    for res in [&unknown, &wrong, &inactive] {
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "Incorrect username or password.");
    }
}

#[tokio::test]
async fn deactivation_ends_existing_sessions() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;
    let bob_id = create_sub_admin(&mut root, "bob", "abcdef").await;

    let mut bob = app.client();
    admin_login(&mut bob, "bob", "abcdef").await;
    assert_eq!(bob.get("/api/admin-auth/session").await.body["authenticated"], true);

    let res = root
        .put(
            &format!("/api/admin-auth/admins/{bob_id}"),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["admin"]["is_active"], false);

    assert_eq!(bob.get("/api/admin-auth/session").await.body["authenticated"], false);
}

#[tokio::test]
async fn management_guards_and_update_rules() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;
    let primary_id = root.get("/api/admin-auth/session").await.body["admin"]["id"]
        .as_i64()
        .unwrap();
    let bob_id = create_sub_admin(&mut root, "bob", "abcdef").await;
    create_sub_admin(&mut root, "carol", "abcdef").await;

    let res = root.delete(&format!("/api/admin-auth/admins/{primary_id}")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Cannot delete your own account");

    let res = root
        .put(
            &format!("/api/admin-auth/admins/{primary_id}"),
            json!({ "username": "root" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = root.put("/api/admin-auth/admins/9999", json!({ "is_active": false })).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let bob_uri = format!("/api/admin-auth/admins/{bob_id}");
    let res = root.put(&bob_uri, json!({ "password": "" })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "No fields to update");

    let res = root.put(&bob_uri, json!({ "username": "carol" })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Username already exists");

    let res = root.put(&bob_uri, json!({ "password": "abc" })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = root
        .put(
            &bob_uri,
            json!({ "username": "robert", "permissions": ["/", "/users"], "password": "newpass" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["admin"]["username"], "robert");
    assert_eq!(res.body["admin"]["permissions"], json!(["/", "/users"]));

    let res = admin_login(&mut app.client(), "robert", "newpass").await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn list_is_newest_first_and_hides_hashes() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;
    create_sub_admin(&mut root, "bob", "abcdef").await;
    create_sub_admin(&mut root, "carol", "abcdef").await;

    let res = root.get("/api/admin-auth/admins").await;
    assert_eq!(res.status, StatusCode::OK);
    let admins = res.body["admins"].as_array().unwrap();
    let names: Vec<_> = admins.iter().map(|a| a["username"].as_str().unwrap()).collect();
    assert_eq!(names, ["carol", "bob", PRIMARY_USERNAME]);
    assert!(admins.iter().all(|a| a.get("password_hash").is_none()));
}

#[tokio::test]
async fn delete_sub_admin() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;
    let bob_id = create_sub_admin(&mut root, "bob", "abcdef").await;

    let mut bob = app.client();
    admin_login(&mut bob, "bob", "abcdef").await;

    let uri = format!("/api/admin-auth/admins/{bob_id}");
    let res = root.delete(&uri).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Sub-admin \"bob\" deleted successfully");

    // Orphaned session stops resolving.
    assert_eq!(bob.get("/api/admin-auth/session").await.body["authenticated"], false);

    let res = root.delete(&uri).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_sub_admin_and_short_password() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;
    create_sub_admin(&mut root, "bob", "abcdef").await;

    let res = root
        .post(
            "/api/admin-auth/create-sub-admin",
            json!({ "username": "bob", "password": "abcdef" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Username already exists");

    let res = root
        .post(
            "/api/admin-auth/create-sub-admin",
            json!({ "username": "dave", "password": "abc" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn change_password() {
    let app = TestApp::new().await;
    let mut root = primary(&app).await;

    let res = root
        .post(
            "/api/admin-auth/change-password",
            json!({ "currentPassword": "wrong-one", "newPassword": "brand-new" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Current password is incorrect");

    let res = root
        .post(
            "/api/admin-auth/change-password",
            json!({ "currentPassword": PRIMARY_PASSWORD, "newPassword": "abc" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "New password must be at least 6 characters long");

    let res = root
        .post(
            "/api/admin-auth/change-password",
            json!({ "currentPassword": PRIMARY_PASSWORD, "newPassword": "brand-new" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // Still logged in on the same session.
    assert_eq!(root.get("/api/admin-auth/session").await.body["authenticated"], true);

    let res = admin_login(&mut app.client(), PRIMARY_USERNAME, PRIMARY_PASSWORD).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let res = admin_login(&mut app.client(), PRIMARY_USERNAME, "brand-new").await;
    assert_eq!(res.status, StatusCode::OK);
}
