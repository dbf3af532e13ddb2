pub mod config;
pub mod mailroom;
pub mod notify;
pub mod retention;
pub mod scan_access;
pub mod shared;
pub mod web_server;
pub mod webhook;
