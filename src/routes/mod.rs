/// Router Module Index
///
/// Splits the HTTP surface by access level. Each group gets its guard as a layer in
/// `create_router`, so an endpoint's protection is decided by the file it lives in.

/// Routes open to anonymous clients.
pub mod public;

/// Routes behind the session check (`USER` or `ADMIN`).
pub mod authenticated;

/// Routes restricted to `ADMIN`.
pub mod admin;
