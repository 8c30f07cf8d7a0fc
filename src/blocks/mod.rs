//! Block types and the catalog that creates them
//!
//! The catalog maps a descriptor's `type` to a factory producing a fresh
//! [`Block`] for every mounted instance. The built-in types are:
//! - `Box`: plain container
//! - `List`: item-template container with engine-provided list methods
//! - `TextArea`: labelled multi-line text input
//! - `ConfirmModal`: confirmation dialog opened through its `open` method

pub mod confirm_modal;
pub mod container;
pub mod label;
pub mod list;
pub mod text_area;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::block::{Block, BlockDescriptor};
use crate::core::registry::RegistryError;

pub use confirm_modal::ConfirmModalBlock;
pub use container::ContainerBlock;
pub use list::ListBlock;
pub use text_area::TextAreaBlock;

/// Block type enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    Box,
    List,
    TextArea,
    ConfirmModal,
    /// Custom user-defined blocks
    Custom(String),
}

impl BlockType {
    /// The type name used in descriptors
    pub fn name(&self) -> &str {
        match self {
            BlockType::Box => "Box",
            BlockType::List => "List",
            BlockType::TextArea => "TextArea",
            BlockType::ConfirmModal => "ConfirmModal",
            BlockType::Custom(name) => name,
        }
    }

    /// Parse a descriptor type name; unknown names become `Custom`
    pub fn from_name(name: &str) -> Self {
        match name {
            "Box" => BlockType::Box,
            "List" => BlockType::List,
            "TextArea" => BlockType::TextArea,
            "ConfirmModal" => BlockType::ConfirmModal,
            other => BlockType::Custom(other.to_string()),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, BlockType::Custom(_))
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Creates one block instance for a descriptor
pub type BlockFactory = Arc<dyn Fn(&BlockDescriptor) -> Arc<dyn Block> + Send + Sync>;

fn factory<B: Block + 'static>(make: fn() -> B) -> BlockFactory {
    Arc::new(move |_: &BlockDescriptor| Arc::new(make()) as Arc<dyn Block>)
}

/// Catalog of block types available for mounting
///
/// Uses `Arc<RwLock<HashMap>>` so clones share one table; lookups take the
/// read lock only long enough to clone the factory out.
#[derive(Clone)]
pub struct BlockCatalog {
    factories: Arc<RwLock<HashMap<String, BlockFactory>>>,
}

impl BlockCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a catalog holding the built-in block types
    pub fn with_builtin() -> Self {
        let catalog = Self::new();
        {
            let mut factories = catalog.factories.write();
            let builtin: [(BlockType, BlockFactory); 4] = [
                (BlockType::Box, factory(|| ContainerBlock)),
                (BlockType::List, factory(|| ListBlock)),
                (BlockType::TextArea, factory(|| TextAreaBlock)),
                (BlockType::ConfirmModal, factory(ConfirmModalBlock::new)),
            ];
            for (block_type, factory) in builtin {
                factories.insert(block_type.name().to_string(), factory);
            }
        }
        catalog
    }

    /// Register a block type
    ///
    /// # Arguments
    /// * `type_name` - The name descriptors use in their `type` field
    /// * `factory` - Called once per mounted instance
    ///
    /// # Returns
    /// * `Ok(())` if registration succeeds
    /// * `Err(RegistryError::DuplicateBlockType)` if the name is taken
    pub fn register<F>(&self, type_name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&BlockDescriptor) -> Arc<dyn Block> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(RegistryError::ValidationError(
                "Block type name cannot be empty".to_string(),
            ));
        }

        let mut factories = self.factories.write();
        if factories.contains_key(&type_name) {
            return Err(RegistryError::DuplicateBlockType(type_name));
        }
        factories.insert(type_name, Arc::new(factory));
        Ok(())
    }

    /// Instantiate the block for a descriptor
    pub fn create(&self, descriptor: &BlockDescriptor) -> Result<Arc<dyn Block>, RegistryError> {
        let factory = self
            .factories
            .read()
            .get(&descriptor.block_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownBlockType(descriptor.block_type.clone()))?;
        Ok(factory(descriptor))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.read().contains_key(type_name)
    }

    pub fn count(&self) -> usize {
        self.factories.read().len()
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BlockCatalog {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let catalog = BlockCatalog::with_builtin();
        assert_eq!(catalog.count(), 4);
        assert_eq!(
            catalog.type_names(),
            vec!["Box", "ConfirmModal", "List", "TextArea"]
        );
        let block = catalog.create(&BlockDescriptor::new("l", "List")).unwrap();
        assert_eq!(block.block_type(), BlockType::List);
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let catalog = BlockCatalog::with_builtin();
        let result = catalog.register("Box", |_| Arc::new(ContainerBlock) as Arc<dyn Block>);
        assert!(matches!(result, Err(RegistryError::DuplicateBlockType(name)) if name == "Box"));
    }

    #[test]
    fn test_unknown_type() {
        let catalog = BlockCatalog::new();
        assert!(matches!(
            catalog.create(&BlockDescriptor::new("x", "Box")),
            Err(RegistryError::UnknownBlockType(_))
        ));
    }

    #[test]
    fn test_custom_type_registration() {
        let catalog = BlockCatalog::new();
        catalog
            .register("Panel", |_| Arc::new(ContainerBlock) as Arc<dyn Block>)
            .unwrap();
        assert!(catalog.contains("Panel"));
        assert!(catalog.register("", |_| Arc::new(ContainerBlock) as Arc<dyn Block>).is_err());
    }

    #[test]
    fn test_block_type_names() {
        assert_eq!(BlockType::from_name("TextArea"), BlockType::TextArea);
        assert_eq!(
            BlockType::from_name("Chart"),
            BlockType::Custom("Chart".to_string())
        );
        assert!(!BlockType::from_name("Chart").is_builtin());
        assert_eq!(BlockType::ConfirmModal.to_string(), "ConfirmModal");
    }

    #[test]
    fn test_catalog_clones_share_table() {
        let catalog = BlockCatalog::new();
        let clone = catalog.clone();
        clone
            .register("Panel", |_| Arc::new(ContainerBlock) as Arc<dyn Block>)
            .unwrap();
        assert!(catalog.contains("Panel"));
    }
}
