//! HTTP handlers, grouped by resource.
//!
//! Access control never happens here: role checks live in the `require_role` layer the
//! router puts in front of each protected group, and handlers only read the resolved
//! principal through `CurrentUser` / `AuthUser` when they need it.

pub mod categories;
pub mod dashboard;
pub mod gallery;
pub mod messages;
pub mod publications;
pub mod session;
pub mod system;
pub mod uploads;
pub mod users;
