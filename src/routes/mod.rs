/// Router Module Index
///
/// Routes are grouped by how the route gate treats them. The gate itself is
/// applied once, around the whole router, in `create_router`.

/// Routes outside the admin root. The gate never looks at their session.
pub mod public;

/// Login page and the public auth API. Under the admin root but passed
/// through by the gate.
pub mod auth;

/// Everything else under the admin root. Requires a session, and the
/// route's permission where the gate's table names one.
pub mod admin;
