pub mod admin;
pub mod community;
pub mod message;
pub mod notification;
pub mod post;
pub mod user;
