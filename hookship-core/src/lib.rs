//! Hookship Core
//!
//! Core types and abstractions for the Hookship deployment pipeline.
//!
//! This crate contains:
//! - Domain types: repositories, image references, deploy instructions and
//!   the pipeline run state machine
//! - DTOs: wire types for the webhook ingress and the deploy RPC
//! - Errors: the pipeline error taxonomy shared by every stage

pub mod domain;
pub mod dto;
pub mod error;

pub use error::PipelineError;
