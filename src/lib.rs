pub mod classifier;
pub mod configuration;
pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_server;
