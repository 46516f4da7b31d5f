mod default;
pub mod error;
pub mod source;

pub use default::{default_client, DEFAULT_UA};
