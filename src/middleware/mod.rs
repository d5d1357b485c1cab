//! Authentication, authorization and tenant-resolution middleware.
//!
//! - [`auth`]: JWT principal extraction and the permission evaluator
//! - [`tenant`]: Tenant context resolution from the `tenant` header

pub mod auth;
pub mod tenant;
