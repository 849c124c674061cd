mod handler;

pub use handler::{approve_community, list_pending, reject_community};
