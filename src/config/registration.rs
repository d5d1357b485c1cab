use std::env;

/// Policy for the anonymous `/users/self-register` endpoint.
///
/// Self-registration is an explicit opt-in: when disabled the endpoint
/// answers 403 without touching the identity service.
#[derive(Clone, Debug)]
pub struct RegistrationConfig {
    pub self_registration_enabled: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            self_registration_enabled: false,
        }
    }
}

impl RegistrationConfig {
    pub fn from_env() -> Self {
        Self {
            self_registration_enabled: env::var("SELF_REGISTRATION_ENABLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}
