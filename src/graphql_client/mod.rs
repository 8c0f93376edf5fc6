pub mod budget;
pub mod context;
pub mod cost;
pub mod credentials;
pub mod decode;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod registry;
pub mod response;
pub mod transport;
pub mod types;
pub mod version;
