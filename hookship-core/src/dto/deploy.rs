//! Deploy RPC DTOs

use serde::{Deserialize, Serialize};

use crate::domain::deploy::DeployInstruction;

/// Request sent to the update authority, one instruction per call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub service_name: String,
    pub image_name: String,
}

impl From<&DeployInstruction> for DeployRequest {
    fn from(instruction: &DeployInstruction) -> Self {
        Self {
            service_name: instruction.service_name().to_string(),
            image_name: instruction.image().render(),
        }
    }
}

/// Acknowledgement returned by the update authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub accepted: bool,
    #[serde(default)]
    pub detail: String,
}
