mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use clinicore::middleware::tenant::TenantId;
use common::{TestRequest, TEST_TENANT, expect_status, send, setup_test_app, token_for};

fn admin_token(test: &common::TestApp) -> String {
    token_for(
        &test.jwt_config,
        Uuid::new_v4(),
        "admin@clinic-a.example",
        TEST_TENANT,
        &["*:*"],
    )
}

// ============ Authorization ============

#[tokio::test]
async fn test_list_roles_requires_token() {
    let test = setup_test_app();

    let response = send(&test.app, TestRequest::get("/roles")).await;
    expect_status(response, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
async fn test_list_roles_requires_permission() {
    let test = setup_test_app();
    let token = token_for(
        &test.jwt_config,
        Uuid::new_v4(),
        "nurse@clinic-a.example",
        TEST_TENANT,
        &["users:view"],
    );

    let response = send(&test.app, TestRequest::get("/roles").bearer(&token)).await;
    expect_status(response, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
async fn test_resource_wildcard_grant_allows_listing() {
    let test = setup_test_app();
    let token = token_for(
        &test.jwt_config,
        Uuid::new_v4(),
        "manager@clinic-a.example",
        TEST_TENANT,
        &["roles:*"],
    );

    let response = send(&test.app, TestRequest::get("/roles").bearer(&token)).await;
    expect_status(response, StatusCode::OK).await;
}

// ============ Listing and fetching ============

#[tokio::test]
async fn test_list_roles_ordered_by_name() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    test.store
        .insert_role(&tenant, "zeta", None, false, &["users:view"]);
    test.store
        .insert_role(&tenant, "alpha", None, false, &["users:view"]);
    let token = admin_token(&test);

    let response = send(&test.app, TestRequest::get("/roles").bearer(&token)).await;
    let body = expect_status(response, StatusCode::OK).await;

    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["admin", "alpha", "basic", "zeta"]);
}

#[tokio::test]
async fn test_get_role_by_id_and_missing_role() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    let role_id = test
        .store
        .insert_role(&tenant, "reception", None, false, &["users:view"]);
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::get(&format!("/roles/{role_id}")).bearer(&token),
    )
    .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["name"], "reception");
    assert!(body.get("permissions").is_none());

    let response = send(
        &test.app,
        TestRequest::get(&format!("/roles/{}", Uuid::new_v4())).bearer(&token),
    )
    .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn test_get_role_with_permissions_lists_grants() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    let role_id = test.store.insert_role(
        &tenant,
        "reception",
        None,
        false,
        &["users:view", "user_roles:view"],
    );
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::get(&format!("/roles/{role_id}/permissions")).bearer(&token),
    )
    .await;
    let body = expect_status(response, StatusCode::OK).await;

    let grants: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(grants, vec!["user_roles:view", "users:view"]);
}

// ============ Create or update ============

#[tokio::test]
async fn test_create_role_and_duplicate_name_conflict() {
    let test = setup_test_app();
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::post("/roles")
            .bearer(&token)
            .json(json!({ "name": "lab", "description": "Laboratory staff" })),
    )
    .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert!(Uuid::parse_str(body.as_str().unwrap()).is_ok());

    let response = send(
        &test.app,
        TestRequest::post("/roles")
            .bearer(&token)
            .json(json!({ "name": "lab" })),
    )
    .await;
    expect_status(response, StatusCode::CONFLICT).await;
}

#[tokio::test]
async fn test_create_or_update_is_idempotent() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    let token = admin_token(&test);

    let role_id = test
        .store
        .insert_role(&tenant, "lab", None, false, &["users:view"]);

    let payload = json!({
        "id": role_id,
        "name": "lab",
        "description": "Laboratory staff"
    });

    for _ in 0..2 {
        let response = send(
            &test.app,
            TestRequest::post("/roles").bearer(&token).json(payload.clone()),
        )
        .await;
        let body = expect_status(response, StatusCode::OK).await;
        assert_eq!(body.as_str().unwrap(), role_id.to_string());
    }

    // The permission mapping survives the upsert untouched.
    assert_eq!(
        test.store.role_grants(&tenant, role_id).unwrap(),
        vec!["users:view".to_string()]
    );
}

#[tokio::test]
async fn test_update_missing_role_is_not_found() {
    let test = setup_test_app();
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::post("/roles")
            .bearer(&token)
            .json(json!({ "id": Uuid::new_v4(), "name": "ghost" })),
    )
    .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn test_rename_protected_role_conflicts() {
    let test = setup_test_app();
    let token = admin_token(&test);

    let response = send(&test.app, TestRequest::get("/roles").bearer(&token)).await;
    let body = expect_status(response, StatusCode::OK).await;
    let admin_id = body
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "admin")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &test.app,
        TestRequest::post("/roles")
            .bearer(&token)
            .json(json!({ "id": admin_id, "name": "superuser" })),
    )
    .await;
    expect_status(response, StatusCode::CONFLICT).await;
}

// ============ Permission updates ============

#[tokio::test]
async fn test_update_permissions_replaces_mapping() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    let role_id = test.store.insert_role(
        &tenant,
        "reception",
        None,
        false,
        &["users:view", "users:update"],
    );
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::put(&format!("/roles/{role_id}/permissions"))
            .bearer(&token)
            .json(json!({ "role_id": role_id, "permissions": ["roles:view"] })),
    )
    .await;
    expect_status(response, StatusCode::OK).await;

    // Full replacement, not a merge.
    assert_eq!(
        test.store.role_grants(&tenant, role_id).unwrap(),
        vec!["roles:view".to_string()]
    );
}

#[tokio::test]
async fn test_update_permissions_id_mismatch_never_reaches_service() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    let role_id = test
        .store
        .insert_role(&tenant, "reception", None, false, &["users:view"]);
    let token = admin_token(&test);

    test.role_calls.store(0, Ordering::SeqCst);

    let response = send(
        &test.app,
        TestRequest::put(&format!("/roles/{role_id}/permissions"))
            .bearer(&token)
            .json(json!({ "role_id": Uuid::new_v4(), "permissions": ["roles:view"] })),
    )
    .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    assert_eq!(test.role_calls.load(Ordering::SeqCst), 0);
    // No state change either.
    assert_eq!(
        test.store.role_grants(&tenant, role_id).unwrap(),
        vec!["users:view".to_string()]
    );
}

#[tokio::test]
async fn test_update_permissions_rejects_unknown_grant() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    let role_id = test
        .store
        .insert_role(&tenant, "reception", None, false, &["users:view"]);
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::put(&format!("/roles/{role_id}/permissions"))
            .bearer(&token)
            .json(json!({ "role_id": role_id, "permissions": ["invoices:view"] })),
    )
    .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;

    assert_eq!(
        test.store.role_grants(&tenant, role_id).unwrap(),
        vec!["users:view".to_string()]
    );
}

#[tokio::test]
async fn test_admin_role_permissions_are_immutable() {
    let test = setup_test_app();
    let token = admin_token(&test);

    let response = send(&test.app, TestRequest::get("/roles").bearer(&token)).await;
    let body = expect_status(response, StatusCode::OK).await;
    let admin_id = body
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "admin")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &test.app,
        TestRequest::put(&format!("/roles/{admin_id}/permissions"))
            .bearer(&token)
            .json(json!({ "role_id": admin_id, "permissions": ["users:view"] })),
    )
    .await;
    expect_status(response, StatusCode::CONFLICT).await;
}

// ============ Delete ============

#[tokio::test]
async fn test_delete_role() {
    let test = setup_test_app();
    let tenant = TenantId::from(TEST_TENANT);
    let role_id = test
        .store
        .insert_role(&tenant, "temp", None, false, &[]);
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::delete(&format!("/roles/{role_id}")).bearer(&token),
    )
    .await;
    expect_status(response, StatusCode::OK).await;

    let response = send(
        &test.app,
        TestRequest::get(&format!("/roles/{role_id}")).bearer(&token),
    )
    .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn test_delete_protected_role_conflicts() {
    let test = setup_test_app();
    let token = admin_token(&test);

    let response = send(&test.app, TestRequest::get("/roles").bearer(&token)).await;
    let body = expect_status(response, StatusCode::OK).await;
    let basic_id = body
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "basic")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &test.app,
        TestRequest::delete(&format!("/roles/{basic_id}")).bearer(&token),
    )
    .await;
    expect_status(response, StatusCode::CONFLICT).await;
}

#[tokio::test]
async fn test_delete_missing_role_is_not_found() {
    let test = setup_test_app();
    let token = admin_token(&test);

    let response = send(
        &test.app,
        TestRequest::delete(&format!("/roles/{}", Uuid::new_v4())).bearer(&token),
    )
    .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}
