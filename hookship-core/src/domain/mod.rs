//! Core domain types
//!
//! These types describe one deployment: the repository that changed, the
//! image built from it, the instruction handed to the update authority and
//! the state machine a run walks through.

pub mod deploy;
pub mod image;
pub mod repository;
pub mod run;
