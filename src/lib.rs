pub mod address;
pub mod app;
pub mod bootstrap;
pub mod config;
pub mod fault;
pub mod link;
pub mod observability;
pub mod protocol;
pub mod runtime;
pub mod shutdown;
pub mod tasks;
