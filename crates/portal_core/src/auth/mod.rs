//! Authentication: registered apps, id tokens, the auth cache and redirect login.

pub mod app;
pub mod cache;
pub mod container;
pub mod error;
pub mod token;

pub use app::{normalize_resource, AuthApp};
pub use cache::{AuthCache, AuthNonce, AUTH_CACHE_KEY};
pub use container::{AuthContainer, AUTH_APPS_TOPIC};
pub use error::AuthError;
pub use token::{AuthToken, AuthUser};
