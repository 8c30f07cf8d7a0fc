//! Block Runtime - runtime contract for low-code application blocks
//!
//! This crate hosts a tree of UI blocks and provides the services they share:
//! a method registry for imperative cross-block calls, an event dispatcher
//! feeding host action pipelines, deferred effects that run after a render
//! commit, and list state kept aligned with its rendered items.

pub mod blocks;
pub mod config;
pub mod core;
pub mod runtime;
mod tests;

// Re-export commonly used types
pub use blocks::{BlockCatalog, BlockType};
pub use config::RuntimeConfig;
pub use core::block::{Block, BlockDescriptor, BlockError, Interaction, Selection};
pub use core::event::{ActionCall, ActionResolver, ActionSpec, Event};
pub use core::registry::{ArgShape, Method, RegistryError};
pub use core::surface::{HeadlessSurface, Surface};
pub use core::{BlockId, InstanceId, Properties};
pub use runtime::{BlockMethods, BlockRuntime, BlockUpdate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
