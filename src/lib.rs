pub mod api;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod fetcher;
pub mod newsletter;
pub mod processor;
pub mod scheduler;
pub mod topics;
pub mod types;
