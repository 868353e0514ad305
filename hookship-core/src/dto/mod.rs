//! Data Transfer Objects
//!
//! Wire types exchanged between the webhook sender, the deployer, the CLI
//! and the update authority.

pub mod deploy;
pub mod run;
pub mod webhook;
