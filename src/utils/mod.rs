pub mod auth;
pub mod form;

pub use auth::{create_token, hash_password, verify_password, verify_token, Claims};
pub use form::FormFields;
