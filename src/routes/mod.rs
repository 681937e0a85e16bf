/// Router Module Index
///
/// Splits the routing table by access level. Authorization is attached to a
/// whole module as a layer in `create_router`, never per handler.

/// Routes open to every client: all reads, author/genre creation, and login.
pub mod public;

/// Routes behind the bearer-token middleware: the mutating `/books` methods.
pub mod authenticated;
