//! Model artifact provisioning
//!
//! Decides where the weights file should live and makes sure the bytes exist
//! there before the engine tries to load them.

pub mod fetch;
pub mod paths;
