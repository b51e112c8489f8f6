//! Domain layer
//!
//! Contains the core models: blueprints, execution plans and resource locks.

pub mod blueprint;
pub mod locking;
