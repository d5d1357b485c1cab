//! Configuration modules for the Clinicore API.
//!
//! Each submodule handles one aspect of configuration, loaded from
//! environment variables with development-friendly defaults.
//!
//! # Modules
//!
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`database`]: PostgreSQL connection pool initialization
//! - [`email`]: Email/SMTP configuration for confirmation and reset mail
//! - [`jwt`]: JWT authentication configuration
//! - [`rate_limit`]: Rate limiting for the anonymous identity endpoints
//! - [`registration`]: Anonymous self-registration policy

pub mod cors;
pub mod database;
pub mod email;
pub mod jwt;
pub mod rate_limit;
pub mod registration;
