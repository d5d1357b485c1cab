// Each integration suite compiles its own copy of this module and uses a
// different subset of the helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use clinicore::config::cors::CorsConfig;
use clinicore::config::jwt::JwtConfig;
use clinicore::config::rate_limit::RateLimitConfig;
use clinicore::config::registration::RegistrationConfig;
use clinicore::memory::{InMemoryRoleService, InMemoryUserService, MemoryStore};
use clinicore::middleware::tenant::TenantId;
use clinicore::modules::roles::model::{CreateOrUpdateRoleRequest, RoleDto, UpdateRolePermissionsRequest};
use clinicore::modules::roles::service::RoleService;
use clinicore::modules::users::model::{
    AuthenticatedUser, CreateUserRequest, ForgotPasswordRequest, ResetPasswordRequest,
    ToggleUserStatusRequest, UserDetailsDto, UserRoleDto, UserRolesRequest,
};
use clinicore::modules::users::service::UserService;
use clinicore::router::init_router;
use clinicore::state::AppState;
use clinicore::utils::email::EmailSender;
use clinicore::utils::errors::AppError;
use clinicore::utils::jwt::create_access_token;

pub const TEST_TENANT: &str = "clinic-a";
pub const OTHER_TENANT: &str = "clinic-b";

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

/// Email double that records instead of delivering.
#[derive(Clone, Default)]
pub struct RecordingEmailSender {
    pub sent: Arc<Mutex<Vec<SentEmail>>>,
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        _html_body: &str,
    ) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to_email.to_string(),
            subject: subject.to_string(),
            text_body: text_body.to_string(),
        });
        Ok(())
    }
}

impl RecordingEmailSender {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<SentEmail> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Emails are dispatched off the request path; poll until they land.
    pub async fn wait_for(&self, n: usize) {
        for _ in 0..100 {
            if self.count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} emails, saw {}", n, self.count());
    }
}

/// Wraps a [`RoleService`] and counts every call that reaches it.
pub struct CountingRoleService {
    inner: InMemoryRoleService,
    pub calls: Arc<AtomicUsize>,
}

impl CountingRoleService {
    pub fn new(inner: InMemoryRoleService) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl RoleService for CountingRoleService {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<RoleDto>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(tenant).await
    }

    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<RoleDto, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(tenant, id).await
    }

    async fn get_with_permissions(
        &self,
        tenant: &TenantId,
        id: Uuid,
    ) -> Result<RoleDto, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_with_permissions(tenant, id).await
    }

    async fn update_permissions(
        &self,
        tenant: &TenantId,
        request: UpdateRolePermissionsRequest,
    ) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_permissions(tenant, request).await
    }

    async fn create_or_update(
        &self,
        tenant: &TenantId,
        request: CreateOrUpdateRoleRequest,
    ) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_or_update(tenant, request).await
    }

    async fn delete(&self, tenant: &TenantId, id: Uuid) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(tenant, id).await
    }
}

/// Wraps a [`UserService`] and counts every call that reaches it.
pub struct CountingUserService {
    inner: InMemoryUserService,
    pub calls: Arc<AtomicUsize>,
}

impl CountingUserService {
    pub fn new(inner: InMemoryUserService) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl UserService for CountingUserService {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<UserDetailsDto>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(tenant).await
    }

    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<UserDetailsDto, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(tenant, id).await
    }

    async fn get_roles(&self, tenant: &TenantId, id: Uuid) -> Result<Vec<UserRoleDto>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_roles(tenant, id).await
    }

    async fn assign_roles(
        &self,
        tenant: &TenantId,
        id: Uuid,
        request: UserRolesRequest,
    ) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.assign_roles(tenant, id, request).await
    }

    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateUserRequest,
        origin: &str,
    ) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create(tenant, request, origin).await
    }

    async fn toggle_status(
        &self,
        tenant: &TenantId,
        request: ToggleUserStatusRequest,
    ) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.toggle_status(tenant, request).await
    }

    async fn confirm_email(
        &self,
        tenant: &TenantId,
        user_id: Uuid,
        code: &str,
    ) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.confirm_email(tenant, user_id, code).await
    }

    async fn confirm_phone_number(&self, user_id: Uuid, code: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.confirm_phone_number(user_id, code).await
    }

    async fn forgot_password(
        &self,
        tenant: &TenantId,
        request: ForgotPasswordRequest,
        origin: &str,
    ) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.forgot_password(tenant, request, origin).await
    }

    async fn reset_password(&self, request: ResetPasswordRequest) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.reset_password(request).await
    }

    async fn authenticate(
        &self,
        tenant: &TenantId,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.authenticate(tenant, email, password).await
    }
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-signing-secret".to_string(),
        access_token_expiry: 3600,
        reset_token_expiry: 3600,
    }
}

pub struct TestApp {
    pub app: axum::Router,
    pub store: MemoryStore,
    pub emails: RecordingEmailSender,
    pub jwt_config: JwtConfig,
    pub role_calls: Arc<AtomicUsize>,
    pub user_calls: Arc<AtomicUsize>,
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with_registration(false)
}

pub fn setup_test_app_with_registration(self_registration_enabled: bool) -> TestApp {
    let store = MemoryStore::new();
    store.seed_tenant(&TenantId::from(TEST_TENANT));

    let emails = RecordingEmailSender::default();
    let jwt_config = test_jwt_config();

    let (users, user_calls) = CountingUserService::new(
        store.user_service(Arc::new(emails.clone()), jwt_config.clone()),
    );
    let (roles, role_calls) = CountingRoleService::new(store.role_service());

    let state = AppState {
        users: Arc::new(users),
        roles: Arc::new(roles),
        jwt_config: jwt_config.clone(),
        cors_config: CorsConfig::from_env(),
        rate_limit_config: RateLimitConfig::default(),
        registration_config: RegistrationConfig {
            self_registration_enabled,
        },
    };

    TestApp {
        app: init_router(state),
        store,
        emails,
        jwt_config,
        role_calls,
        user_calls,
    }
}

/// Cheap hash for seeded test users; production paths keep the default cost.
pub fn test_password_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

/// Mint a bearer token directly; the principal is whatever grants the test
/// needs, which keeps authorization tests independent of the login flow.
pub fn token_for(
    jwt_config: &JwtConfig,
    user_id: Uuid,
    email: &str,
    tenant: &str,
    grants: &[&str],
) -> String {
    create_access_token(
        user_id,
        email,
        tenant,
        grants.iter().map(|s| s.to_string()).collect(),
        jwt_config,
    )
    .unwrap()
}

pub struct TestRequest<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub token: Option<&'a str>,
    pub tenant_header: Option<&'a str>,
    pub body: Option<serde_json::Value>,
}

impl<'a> TestRequest<'a> {
    pub fn get(uri: &'a str) -> Self {
        Self {
            method: "GET",
            uri,
            token: None,
            tenant_header: None,
            body: None,
        }
    }

    pub fn post(uri: &'a str) -> Self {
        Self {
            method: "POST",
            uri,
            ..Self::get(uri)
        }
    }

    pub fn put(uri: &'a str) -> Self {
        Self {
            method: "PUT",
            uri,
            ..Self::get(uri)
        }
    }

    pub fn delete(uri: &'a str) -> Self {
        Self {
            method: "DELETE",
            uri,
            ..Self::get(uri)
        }
    }

    pub fn bearer(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    pub fn tenant(mut self, tenant: &'a str) -> Self {
        self.tenant_header = Some(tenant);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

pub async fn send(app: &axum::Router, req: TestRequest<'_>) -> Response<Body> {
    let mut builder = Request::builder().method(req.method).uri(req.uri);

    if let Some(token) = req.token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(tenant) = req.tenant_header {
        builder = builder.header("tenant", tenant);
    }

    let request = match req.body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "response body is not JSON: {:?}",
            String::from_utf8_lossy(&body)
        )
    })
}

pub async fn expect_status(response: Response<Body>, expected: StatusCode) -> serde_json::Value {
    let status = response.status();
    let body = body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {}", body);
    body
}
