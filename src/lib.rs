pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod service;
pub mod store;
