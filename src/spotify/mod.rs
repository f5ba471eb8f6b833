//! Spotify accounts service and Web API client functions.
//!
//! - [`auth`] talks to the accounts service: it builds the authorization URL
//!   and exchanges authorization codes and refresh tokens at the token endpoint.
//! - [`user`] is a Web API consumer that authenticates with a token obtained
//!   through [`TokenManager`](crate::management::TokenManager).

pub mod auth;
pub mod user;
