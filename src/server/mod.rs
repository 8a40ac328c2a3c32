mod handlers;

pub mod config;
pub mod factory;
pub mod listeners;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod restful;
pub mod router;
