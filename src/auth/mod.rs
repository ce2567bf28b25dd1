pub mod handlers;
pub mod token;

pub use token::{mint_token, refresh_token, verify_token, Claims};
