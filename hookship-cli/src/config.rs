//! Configuration module
//!
//! Handles CLI configuration: where the deployer and the update authority live.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the deployer service
    pub deployer_url: String,

    /// URL of the update authority, required for manual deploys
    pub update_url: Option<String>,
}
