// Library exports for the `mirage` binary, the linter, tests and benchmarks

// ===== Configuration and registration =====
pub mod config;
pub mod error;
pub mod resource;

// ===== Request pipeline =====
pub mod behaviour;
pub mod engine;
pub mod negotiation;
pub mod openapi;
pub mod request;
pub mod response;
pub mod rows;
pub mod scripting;

// ===== Transport =====
pub mod server;

pub use engine::MockEngine;
pub use server::{MirageBuilder, RunningServer};
