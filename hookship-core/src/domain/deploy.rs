//! Deploy instruction domain type

use serde::Serialize;

use crate::domain::image::ImageRef;
use crate::domain::repository::RepositoryRef;

/// Instruction handed to the update authority: run `image` for `service_name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployInstruction {
    service_name: String,
    image: ImageRef,
}

impl DeployInstruction {
    pub fn new(service_name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            service_name: service_name.into(),
            image,
        }
    }

    /// Instruction for the service named after the repository
    pub fn for_repository(repository: &RepositoryRef, image: ImageRef) -> Self {
        Self::new(repository.name(), image)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_targets_repository_service() {
        let repo = RepositoryRef::new("svc-a", "https://src/svc-a").unwrap();
        let instruction =
            DeployInstruction::for_repository(&repo, ImageRef::new("acme", "svc-a", "7"));

        assert_eq!(instruction.service_name(), "svc-a");
        assert_eq!(instruction.image().to_string(), "acme/svc-a:7");
    }
}
