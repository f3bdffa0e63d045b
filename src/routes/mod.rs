//! Router Module Index
//!
//! Routes are grouped by the access they require, and access control is attached to each
//! group as a layer in `create_router`, never inside handlers.

/// Routes open to anonymous clients.
pub mod public;

/// Routes that need a valid token, any role.
pub mod authenticated;

/// Routes behind the role gate (`admin_routes`: admin or superadmin, `superadmin_routes`:
/// superadmin only).
pub mod admin;
