mod handler;
pub mod model;

pub use handler::{create_message, list_messages};
