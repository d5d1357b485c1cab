use std::sync::Arc;

use crate::config::cors::CorsConfig;
use crate::config::database::init_db_pool;
use crate::config::email::EmailConfig;
use crate::config::jwt::JwtConfig;
use crate::config::rate_limit::RateLimitConfig;
use crate::config::registration::RegistrationConfig;
use crate::memory::MemoryStore;
use crate::middleware::tenant::TenantId;
use crate::modules::roles::postgres::PgRoleService;
use crate::modules::roles::service::RoleService;
use crate::modules::users::postgres::PgUserService;
use crate::modules::users::service::UserService;
use crate::utils::email::SmtpEmailSender;

/// Shared application state. The identity services are injected as trait
/// handles so the dispatcher never depends on a concrete backend.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserService>,
    pub roles: Arc<dyn RoleService>,
    pub jwt_config: JwtConfig,
    pub cors_config: CorsConfig,
    pub rate_limit_config: RateLimitConfig,
    pub registration_config: RegistrationConfig,
}

/// Builds the state from the environment. `MEMORY_BACKEND=true` swaps the
/// PostgreSQL services for the in-memory backend (development only); the
/// default connects to `DATABASE_URL` and applies pending migrations.
pub async fn init_app_state() -> AppState {
    let jwt_config = JwtConfig::from_env();
    let email_sender = Arc::new(SmtpEmailSender::new(EmailConfig::from_env()));

    let memory_backend = std::env::var("MEMORY_BACKEND")
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false);

    let (users, roles): (Arc<dyn UserService>, Arc<dyn RoleService>) = if memory_backend {
        let store = MemoryStore::new();
        store.seed_tenant(&TenantId::from("root"));
        (
            Arc::new(store.user_service(email_sender, jwt_config.clone())),
            Arc::new(store.role_service()),
        )
    } else {
        let db = init_db_pool().await;
        sqlx::migrate!()
            .run(&db)
            .await
            .expect("Failed to run database migrations");
        (
            Arc::new(PgUserService::new(
                db.clone(),
                email_sender,
                jwt_config.clone(),
            )),
            Arc::new(PgRoleService::new(db)),
        )
    };

    AppState {
        users,
        roles,
        jwt_config,
        cors_config: CorsConfig::from_env(),
        rate_limit_config: RateLimitConfig::from_env(),
        registration_config: RegistrationConfig::from_env(),
    }
}
