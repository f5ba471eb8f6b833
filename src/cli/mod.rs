//! # CLI Module
//!
//! Command implementations for the `spotcli` binary. Every command receives a
//! [`TokenManager`](crate::management::TokenManager) built from the process
//! configuration and reports problems through the crate's output macros,
//! exiting non-zero on failure.
//!
//! ## Commands
//!
//! - [`auth`] - Runs the authorization-code flow and stores the token
//! - [`refresh`] - Exchanges the stored refresh token for a new access token
//! - [`token`] - Prints a valid access token, authorizing or refreshing first if needed
//! - [`status`] - Shows the stored token's location and expiry without network access
//! - [`whoami`] - Fetches the current user's profile with a valid token
//!
//! ## Usage Patterns
//!
//! ```bash
//! spotcli auth                      # Authorize once
//! spotcli status                    # Inspect the stored token
//! spotcli whoami                    # Check that the token works
//! curl -H "Authorization: Bearer $(spotcli token)" https://api.spotify.com/v1/me
//! ```

mod auth;
mod status;
mod token;
mod whoami;

pub use auth::auth;
pub use auth::refresh;
pub use status::status;
pub use token::token;
pub use whoami::whoami;
