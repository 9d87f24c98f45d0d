pub mod assembler;
pub mod collaborators;
pub mod error;
pub mod floor;
pub mod matcher;
pub mod orchestrator;
pub mod resolver;
