pub mod admin;
pub mod auth;
pub mod event;
pub mod middleware;
pub mod notification;
pub mod post;
pub mod registration;
pub mod user;
