mod auth;
mod store;

pub use auth::TokenManager;
pub use auth::TokenState;
pub use store::CredentialStore;
pub use store::StoreError;
