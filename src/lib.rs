pub mod asset;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod store;
