pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod install;
pub mod presentation;
