pub mod acl;
pub mod cmd;
pub mod config;
pub mod db;
pub mod dirs;
pub mod events;
pub mod imghdr;
pub mod logs;
pub mod server;
pub mod time;
pub mod types;
