pub mod cli;
pub mod config;
pub mod graphql_client;
pub mod logging;
