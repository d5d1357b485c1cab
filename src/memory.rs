//! In-memory implementations of the identity services.
//!
//! Backs the integration test suite and the `MEMORY_BACKEND` development
//! mode. Semantics mirror the PostgreSQL implementations: tenant-scoped
//! lookups, upsert roles, full-replacement permission and role-set updates,
//! idempotent-safe confirmations and the uniform forgot-password response.
//!
//! A single `RwLock` over the store serializes writers, which gives the
//! same atomicity the Postgres backend gets from row locks.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::config::jwt::JwtConfig;
use crate::middleware::tenant::TenantId;
use crate::modules::roles::model::{
    ADMIN_ROLE, BASIC_ROLE, CreateOrUpdateRoleRequest, Role, RoleDto,
    UpdateRolePermissionsRequest,
};
use crate::modules::roles::service::RoleService;
use crate::modules::users::model::{
    AuthenticatedUser, CreateUserRequest, ForgotPasswordRequest, ResetPasswordRequest,
    ToggleUserStatusRequest, User, UserDetailsDto, UserRoleDto, UserRolesRequest,
    generate_confirmation_code,
};
use crate::modules::users::service::{FORGOT_PASSWORD_MESSAGE, UserService};
use crate::permissions;
use crate::utils::email::{EmailSender, confirmation_email, password_reset_email};
use crate::utils::errors::AppError;
use crate::utils::jwt::{create_reset_token, verify_reset_token};
use crate::utils::password::{hash_password, verify_password};

#[derive(Debug, Clone)]
struct MemoryRole {
    role: Role,
    permissions: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct TenantData {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, MemoryRole>,
    user_roles: HashMap<Uuid, HashSet<Uuid>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    tenants: HashMap<String, TenantData>,
}

/// Shared state behind both in-memory services.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the tenant with its protected admin and basic roles, like the
    /// seed migration does for the Postgres backend. Idempotent.
    pub fn seed_tenant(&self, tenant: &TenantId) {
        let mut inner = self.inner.write().unwrap();
        let data = inner.tenants.entry(tenant.0.clone()).or_default();

        if !data.roles.values().any(|r| r.role.name == ADMIN_ROLE) {
            let admin = new_role(
                tenant,
                ADMIN_ROLE,
                Some("Tenant administrator".to_string()),
                true,
            );
            data.roles.insert(
                admin.id,
                MemoryRole {
                    role: admin,
                    permissions: BTreeSet::from([permissions::ALL_WILDCARD.to_string()]),
                },
            );
        }

        if !data.roles.values().any(|r| r.role.name == BASIC_ROLE) {
            let basic = new_role(tenant, BASIC_ROLE, Some("Default role".to_string()), true);
            data.roles.insert(
                basic.id,
                MemoryRole {
                    role: basic,
                    permissions: permissions::BASIC_GRANTS
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
            );
        }
    }

    /// Test/seed helper: insert a role with explicit grants.
    pub fn insert_role(
        &self,
        tenant: &TenantId,
        name: &str,
        description: Option<String>,
        protected: bool,
        grants: &[&str],
    ) -> Uuid {
        let mut inner = self.inner.write().unwrap();
        let data = inner.tenants.entry(tenant.0.clone()).or_default();
        let role = new_role(tenant, name, description, protected);
        let id = role.id;
        data.roles.insert(
            id,
            MemoryRole {
                role,
                permissions: grants.iter().map(|s| s.to_string()).collect(),
            },
        );
        id
    }

    /// Test/seed helper: insert a user with a pre-computed password hash and
    /// the given roles (by name). The user starts active and confirmed.
    pub fn insert_user(
        &self,
        tenant: &TenantId,
        email: &str,
        username: &str,
        password_hash: &str,
        role_names: &[&str],
    ) -> Uuid {
        let mut inner = self.inner.write().unwrap();
        let data = inner.tenants.entry(tenant.0.clone()).or_default();

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: tenant.0.clone(),
            email: email.to_string(),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            phone_number: None,
            password_hash: password_hash.to_string(),
            active: true,
            email_confirmed: true,
            phone_number_confirmed: false,
            email_confirmation_code: None,
            phone_confirmation_code: None,
            created_at: now,
            updated_at: now,
        };
        let user_id = user.id;

        let role_ids: HashSet<Uuid> = data
            .roles
            .values()
            .filter(|r| role_names.contains(&r.role.name.as_str()))
            .map(|r| r.role.id)
            .collect();

        data.users.insert(user_id, user);
        data.user_roles.insert(user_id, role_ids);
        user_id
    }

    /// Test/seed helper: put an unconfirmed phone number with a pending
    /// confirmation code on the user.
    pub fn set_phone_number(&self, tenant: &TenantId, user_id: Uuid, phone: &str, code: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some(user) = inner
            .tenants
            .get_mut(tenant.as_str())
            .and_then(|data| data.users.get_mut(&user_id))
        {
            user.phone_number = Some(phone.to_string());
            user.phone_number_confirmed = false;
            user.phone_confirmation_code = Some(code.to_string());
        }
    }

    /// Test helper: a snapshot of the user record.
    pub fn user(&self, tenant: &TenantId, id: Uuid) -> Option<User> {
        let inner = self.inner.read().unwrap();
        inner.tenants.get(tenant.as_str())?.users.get(&id).cloned()
    }

    /// Test helper: the user's assigned role ids.
    pub fn user_role_ids(&self, tenant: &TenantId, user_id: Uuid) -> Vec<Uuid> {
        let inner = self.inner.read().unwrap();
        inner
            .tenants
            .get(tenant.as_str())
            .and_then(|data| data.user_roles.get(&user_id))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Test helper: the role's grant set.
    pub fn role_grants(&self, tenant: &TenantId, role_id: Uuid) -> Option<Vec<String>> {
        let inner = self.inner.read().unwrap();
        inner
            .tenants
            .get(tenant.as_str())?
            .roles
            .get(&role_id)
            .map(|r| r.permissions.iter().cloned().collect())
    }

    pub fn role_service(&self) -> InMemoryRoleService {
        InMemoryRoleService {
            store: self.clone(),
        }
    }

    pub fn user_service(
        &self,
        email_sender: Arc<dyn EmailSender>,
        jwt_config: JwtConfig,
    ) -> InMemoryUserService {
        InMemoryUserService {
            store: self.clone(),
            email_sender,
            jwt_config,
        }
    }
}

fn new_role(tenant: &TenantId, name: &str, description: Option<String>, protected: bool) -> Role {
    let now = Utc::now();
    Role {
        id: Uuid::new_v4(),
        tenant_id: tenant.0.clone(),
        name: name.to_string(),
        description,
        protected,
        created_at: now,
        updated_at: now,
    }
}

fn tenant_data<'a>(
    inner: &'a StoreInner,
    tenant: &TenantId,
) -> Result<&'a TenantData, AppError> {
    inner
        .tenants
        .get(tenant.as_str())
        .ok_or_else(|| AppError::not_found(anyhow!("Unknown tenant")))
}

fn tenant_data_mut<'a>(
    inner: &'a mut StoreInner,
    tenant: &TenantId,
) -> Result<&'a mut TenantData, AppError> {
    inner
        .tenants
        .get_mut(tenant.as_str())
        .ok_or_else(|| AppError::not_found(anyhow!("Unknown tenant")))
}

#[derive(Clone)]
pub struct InMemoryRoleService {
    store: MemoryStore,
}

#[async_trait]
impl RoleService for InMemoryRoleService {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<RoleDto>, AppError> {
        let inner = self.store.inner.read().unwrap();
        let data = tenant_data(&inner, tenant)?;

        let mut roles: Vec<Role> = data.roles.values().map(|r| r.role.clone()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(roles.into_iter().map(RoleDto::from_role).collect())
    }

    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<RoleDto, AppError> {
        let inner = self.store.inner.read().unwrap();
        let data = tenant_data(&inner, tenant)?;

        data.roles
            .get(&id)
            .map(|r| RoleDto::from_role(r.role.clone()))
            .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))
    }

    async fn get_with_permissions(
        &self,
        tenant: &TenantId,
        id: Uuid,
    ) -> Result<RoleDto, AppError> {
        let inner = self.store.inner.read().unwrap();
        let data = tenant_data(&inner, tenant)?;

        data.roles
            .get(&id)
            .map(|r| {
                RoleDto::from_role_with_permissions(
                    r.role.clone(),
                    r.permissions.iter().cloned().collect(),
                )
            })
            .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))
    }

    async fn update_permissions(
        &self,
        tenant: &TenantId,
        request: UpdateRolePermissionsRequest,
    ) -> Result<String, AppError> {
        for grant in &request.permissions {
            if !permissions::is_known(grant) {
                return Err(AppError::bad_request(anyhow!(
                    "Unknown permission: {}",
                    grant
                )));
            }
        }

        let mut inner = self.store.inner.write().unwrap();
        let data = tenant_data_mut(&mut inner, tenant)?;

        let entry = data
            .roles
            .get_mut(&request.role_id)
            .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;

        if entry.role.name == ADMIN_ROLE {
            return Err(AppError::conflict(anyhow!(
                "Permissions of the admin role cannot be modified"
            )));
        }

        entry.permissions = request.permissions.iter().cloned().collect();
        entry.role.updated_at = Utc::now();

        Ok(format!("Permissions of role {} updated.", entry.role.name))
    }

    async fn create_or_update(
        &self,
        tenant: &TenantId,
        request: CreateOrUpdateRoleRequest,
    ) -> Result<String, AppError> {
        let mut inner = self.store.inner.write().unwrap();
        let data = inner.tenants.entry(tenant.0.clone()).or_default();

        match request.id {
            Some(id) => {
                let duplicate = data
                    .roles
                    .values()
                    .any(|r| r.role.id != id && r.role.name == request.name);
                if duplicate {
                    return Err(AppError::conflict(anyhow!(
                        "A role with this name already exists"
                    )));
                }

                let entry = data
                    .roles
                    .get_mut(&id)
                    .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;

                if entry.role.protected && entry.role.name != request.name {
                    return Err(AppError::conflict(anyhow!(
                        "Protected role {} cannot be renamed",
                        entry.role.name
                    )));
                }

                entry.role.name = request.name;
                entry.role.description = request.description;
                entry.role.updated_at = Utc::now();

                Ok(id.to_string())
            }
            None => {
                if data.roles.values().any(|r| r.role.name == request.name) {
                    return Err(AppError::conflict(anyhow!(
                        "A role with this name already exists"
                    )));
                }

                let role = new_role(tenant, &request.name, request.description, false);
                let id = role.id;
                data.roles.insert(
                    id,
                    MemoryRole {
                        role,
                        permissions: BTreeSet::new(),
                    },
                );

                Ok(id.to_string())
            }
        }
    }

    async fn delete(&self, tenant: &TenantId, id: Uuid) -> Result<String, AppError> {
        let mut inner = self.store.inner.write().unwrap();
        let data = tenant_data_mut(&mut inner, tenant)?;

        let entry = data
            .roles
            .get(&id)
            .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;

        if entry.role.protected {
            return Err(AppError::conflict(anyhow!(
                "Protected role {} cannot be deleted",
                entry.role.name
            )));
        }

        let name = entry.role.name.clone();
        data.roles.remove(&id);
        for assigned in data.user_roles.values_mut() {
            assigned.remove(&id);
        }

        Ok(format!("Role {} deleted.", name))
    }
}

pub struct InMemoryUserService {
    store: MemoryStore,
    email_sender: Arc<dyn EmailSender>,
    jwt_config: JwtConfig,
}

#[async_trait]
impl UserService for InMemoryUserService {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<UserDetailsDto>, AppError> {
        let inner = self.store.inner.read().unwrap();
        let data = tenant_data(&inner, tenant)?;

        let mut users: Vec<User> = data.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));

        Ok(users.into_iter().map(UserDetailsDto::from_user).collect())
    }

    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<UserDetailsDto, AppError> {
        let inner = self.store.inner.read().unwrap();
        let data = tenant_data(&inner, tenant)?;

        data.users
            .get(&id)
            .cloned()
            .map(UserDetailsDto::from_user)
            .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    async fn get_roles(&self, tenant: &TenantId, id: Uuid) -> Result<Vec<UserRoleDto>, AppError> {
        let inner = self.store.inner.read().unwrap();
        let data = tenant_data(&inner, tenant)?;

        if !data.users.contains_key(&id) {
            return Err(AppError::not_found(anyhow!("User not found")));
        }

        let assigned = data.user_roles.get(&id).cloned().unwrap_or_default();
        let mut roles: Vec<UserRoleDto> = data
            .roles
            .values()
            .map(|r| UserRoleDto {
                role_id: r.role.id,
                role_name: r.role.name.clone(),
                enabled: assigned.contains(&r.role.id),
            })
            .collect();
        roles.sort_by(|a, b| a.role_name.cmp(&b.role_name));

        Ok(roles)
    }

    async fn assign_roles(
        &self,
        tenant: &TenantId,
        id: Uuid,
        request: UserRolesRequest,
    ) -> Result<String, AppError> {
        let mut inner = self.store.inner.write().unwrap();
        let data = tenant_data_mut(&mut inner, tenant)?;

        if !data.users.contains_key(&id) {
            return Err(AppError::not_found(anyhow!("User not found")));
        }

        let role_ids: HashSet<Uuid> = request.role_ids.into_iter().collect();
        if role_ids.iter().any(|rid| !data.roles.contains_key(rid)) {
            return Err(AppError::not_found(anyhow!("One or more roles not found")));
        }

        data.user_roles.insert(id, role_ids);

        Ok("User roles updated successfully.".to_string())
    }

    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateUserRequest,
        origin: &str,
    ) -> Result<String, AppError> {
        let password_hash = hash_password(&request.password)?;
        let confirmation_code = generate_confirmation_code();

        let user_id = {
            let mut inner = self.store.inner.write().unwrap();
            let data = inner.tenants.entry(tenant.0.clone()).or_default();

            let taken = data
                .users
                .values()
                .any(|u| u.email == request.email || u.username == request.username);
            if taken {
                return Err(AppError::conflict(anyhow!(
                    "A user with this email or username already exists"
                )));
            }

            let now = Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                tenant_id: tenant.0.clone(),
                email: request.email.clone(),
                username: request.username.clone(),
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                phone_number: request.phone_number.clone(),
                password_hash,
                active: true,
                email_confirmed: false,
                phone_number_confirmed: false,
                email_confirmation_code: Some(confirmation_code.clone()),
                phone_confirmation_code: None,
                created_at: now,
                updated_at: now,
            };
            let user_id = user.id;

            let basic: HashSet<Uuid> = data
                .roles
                .values()
                .filter(|r| r.role.name == BASIC_ROLE)
                .map(|r| r.role.id)
                .collect();

            data.users.insert(user_id, user);
            data.user_roles.insert(user_id, basic);
            user_id
        };

        let confirm_link = format!(
            "{origin}/users/confirm-email?tenant={}&userId={}&code={}",
            tenant, user_id, confirmation_code
        );
        let (subject, text, html) = confirmation_email(&request.first_name, &confirm_link);
        let email_sender = Arc::clone(&self.email_sender);
        let to = request.email.clone();
        tokio::spawn(async move {
            if let Err(e) = email_sender.send(&to, &subject, &text, &html).await {
                tracing::error!(error = %e.error, "failed to send confirmation email");
            }
        });

        Ok(user_id.to_string())
    }

    async fn toggle_status(
        &self,
        tenant: &TenantId,
        request: ToggleUserStatusRequest,
    ) -> Result<(), AppError> {
        let mut inner = self.store.inner.write().unwrap();
        let data = tenant_data_mut(&mut inner, tenant)?;

        let user = data
            .users
            .get_mut(&request.user_id)
            .ok_or_else(|| AppError::not_found(anyhow!("User not found")))?;

        user.active = request.activate;
        user.updated_at = Utc::now();

        Ok(())
    }

    async fn confirm_email(
        &self,
        tenant: &TenantId,
        user_id: Uuid,
        code: &str,
    ) -> Result<String, AppError> {
        let mut inner = self.store.inner.write().unwrap();
        let data = tenant_data_mut(&mut inner, tenant)?;

        let user = data
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found(anyhow!("User not found")))?;

        if user.email_confirmed {
            return Ok(format!("Email {} is already confirmed.", user.email));
        }

        if user.email_confirmation_code.as_deref() != Some(code) {
            return Err(AppError::bad_request(anyhow!("Invalid confirmation code")));
        }

        user.email_confirmed = true;
        user.email_confirmation_code = None;
        user.updated_at = Utc::now();

        Ok(format!("Email {} confirmed.", user.email))
    }

    async fn confirm_phone_number(&self, user_id: Uuid, code: &str) -> Result<String, AppError> {
        let mut inner = self.store.inner.write().unwrap();

        let user = inner
            .tenants
            .values_mut()
            .find_map(|data| data.users.get_mut(&user_id))
            .ok_or_else(|| AppError::not_found(anyhow!("User not found")))?;

        let phone_number = user
            .phone_number
            .clone()
            .ok_or_else(|| AppError::bad_request(anyhow!("No phone number on record")))?;

        if user.phone_number_confirmed {
            return Ok(format!(
                "Phone number {} is already confirmed.",
                phone_number
            ));
        }

        if user.phone_confirmation_code.as_deref() != Some(code) {
            return Err(AppError::bad_request(anyhow!("Invalid confirmation code")));
        }

        user.phone_number_confirmed = true;
        user.phone_confirmation_code = None;
        user.updated_at = Utc::now();

        Ok(format!("Phone number {} confirmed.", phone_number))
    }

    async fn forgot_password(
        &self,
        tenant: &TenantId,
        request: ForgotPasswordRequest,
        origin: &str,
    ) -> Result<String, AppError> {
        let user = {
            let inner = self.store.inner.read().unwrap();
            inner.tenants.get(tenant.as_str()).and_then(|data| {
                data.users
                    .values()
                    .find(|u| u.email == request.email)
                    .cloned()
            })
        };

        // The response never varies with account existence; the email is
        // dispatched off the request path for the same reason.
        if let Some(user) = user {
            let token = create_reset_token(user.id, &user.email, &self.jwt_config)?;
            let reset_link = format!("{origin}/users/reset-password?token={token}");
            let (subject, text, html) = password_reset_email(&user.first_name, &reset_link);
            let email_sender = Arc::clone(&self.email_sender);
            tokio::spawn(async move {
                if let Err(e) = email_sender.send(&user.email, &subject, &text, &html).await {
                    tracing::error!(error = %e.error, "failed to send password reset email");
                }
            });
        } else {
            tracing::debug!(tenant = %tenant, "password reset requested for unknown email");
        }

        Ok(FORGOT_PASSWORD_MESSAGE.to_string())
    }

    async fn reset_password(&self, request: ResetPasswordRequest) -> Result<String, AppError> {
        let claims = verify_reset_token(&request.token, &self.jwt_config)?;
        let user_id = Uuid::parse_str(&claims.user_id)
            .map_err(|_| AppError::bad_request(anyhow!("Invalid or expired reset token")))?;

        let password_hash = hash_password(&request.password)?;

        let mut inner = self.store.inner.write().unwrap();

        let user = inner
            .tenants
            .values_mut()
            .find_map(|data| data.users.get_mut(&user_id))
            .filter(|u| u.email == claims.email)
            .ok_or_else(|| AppError::bad_request(anyhow!("Invalid or expired reset token")))?;

        user.password_hash = password_hash;
        user.updated_at = Utc::now();

        Ok("Password has been reset successfully.".to_string())
    }

    async fn authenticate(
        &self,
        tenant: &TenantId,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AppError> {
        let (user, permissions) = {
            let inner = self.store.inner.read().unwrap();
            let data = tenant_data(&inner, tenant)
                .map_err(|_| AppError::unauthorized(anyhow!("Invalid credentials")))?;

            let user = data
                .users
                .values()
                .find(|u| u.email == email)
                .cloned()
                .ok_or_else(|| AppError::unauthorized(anyhow!("Invalid credentials")))?;

            let assigned = data.user_roles.get(&user.id).cloned().unwrap_or_default();
            let mut permissions: Vec<String> = data
                .roles
                .values()
                .filter(|r| assigned.contains(&r.role.id))
                .flat_map(|r| r.permissions.iter().cloned())
                .collect();
            permissions.sort();
            permissions.dedup();

            (user, permissions)
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::unauthorized(anyhow!("Invalid credentials")));
        }

        if !user.active {
            return Err(AppError::unauthorized(anyhow!(
                "User account is deactivated"
            )));
        }

        Ok(AuthenticatedUser {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            permissions,
        })
    }
}
