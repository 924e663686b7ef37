/// Router Module Index
///
/// Routes are split by how they are protected. Authentication is applied as a layer on the
/// authenticated and admin routers; the per-route right is checked inside each handler.

/// Unauthenticated routes (health check).
pub mod public;

/// Email, policy and dashboard routes. Require a resolved `AuthUser`.
pub mod authenticated;

/// User management, nested under `/admin`. Require `getUsers` / `manageUsers`.
pub mod admin;
