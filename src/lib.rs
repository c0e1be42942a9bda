// Library exports for Vetigram
// This allows integration tests and external code to use Vetigram modules

pub mod ai;
pub mod auth;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod likes;
pub mod media;
pub mod posts;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod users;
