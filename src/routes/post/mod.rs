mod handler;
pub mod model;

pub use handler::{create_post, list_posts};
