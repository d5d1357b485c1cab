use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::modules::roles::model::{
    CreateOrUpdateRoleRequest, RoleDto, UpdateRolePermissionsRequest,
};
use crate::modules::tokens::controller::ErrorResponse;
use crate::modules::tokens::model::{TokenRequest, TokenResponse};
use crate::modules::users::model::{
    CreateUserRequest, ForgotPasswordRequest, ResetPasswordRequest, ToggleUserStatusRequest,
    UserDetailsDto, UserRoleDto, UserRolesRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::tokens::controller::create_token,
        crate::modules::roles::controller::get_roles,
        crate::modules::roles::controller::get_role_by_id,
        crate::modules::roles::controller::get_role_with_permissions,
        crate::modules::roles::controller::update_role_permissions,
        crate::modules::roles::controller::create_or_update_role,
        crate::modules::roles::controller::delete_role,
        crate::modules::users::controller::get_users,
        crate::modules::users::controller::get_user_by_id,
        crate::modules::users::controller::get_user_roles,
        crate::modules::users::controller::assign_user_roles,
        crate::modules::users::controller::create_user,
        crate::modules::users::controller::self_register,
        crate::modules::users::controller::toggle_user_status,
        crate::modules::users::controller::confirm_email,
        crate::modules::users::controller::confirm_phone_number,
        crate::modules::users::controller::forgot_password,
        crate::modules::users::controller::reset_password,
    ),
    components(
        schemas(
            RoleDto,
            CreateOrUpdateRoleRequest,
            UpdateRolePermissionsRequest,
            UserDetailsDto,
            UserRoleDto,
            CreateUserRequest,
            UserRolesRequest,
            ToggleUserStatusRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            TokenRequest,
            TokenResponse,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Tokens", description = "Access token issuance"),
        (name = "Roles", description = "Role and permission management"),
        (name = "Users", description = "User management and account flows")
    ),
    info(
        title = "Clinicore Identity API",
        version = "0.1.0",
        description = "Identity administration for the Clinicore multi-tenant clinic management platform.",
        contact(
            name = "API Support",
            email = "support@clinicore.health"
        ),
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
