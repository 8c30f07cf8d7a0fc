//! Tree validation
//!
//! Checks a descriptor tree before it is mounted: block ids, known block
//! types, list templates, and event configuration. Produces a
//! `TreeValidationResult` with per-block errors and warnings.

use std::collections::HashSet;

use crate::blocks::text_area::TextAreaProperties;
use crate::blocks::{BlockCatalog, BlockType};
use crate::core::block::{BlockDescriptor, ContentKind};
use crate::core::BlockId;

// ── Result types ────────────────────────────────────────────────────────────

/// A single validation issue with optional location and suggestion.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Block id where the problem was found (if it has one).
    pub block_id: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Optional suggestion for how to fix it.
    pub suggestion: Option<String>,
}

/// Overall validation result.
#[derive(Debug, Clone)]
pub struct TreeValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl TreeValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_error(&mut self, block_id: Option<&str>, message: impl Into<String>, suggestion: Option<&str>) {
        self.valid = false;
        self.errors.push(ValidationIssue {
            block_id: block_id.map(|s| s.to_string()),
            message: message.into(),
            suggestion: suggestion.map(|s| s.to_string()),
        });
    }

    fn add_warning(&mut self, block_id: Option<&str>, message: impl Into<String>, suggestion: Option<&str>) {
        self.warnings.push(ValidationIssue {
            block_id: block_id.map(|s| s.to_string()),
            message: message.into(),
            suggestion: suggestion.map(|s| s.to_string()),
        });
    }

    /// One line per error, for error messages
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| match &issue.block_id {
                Some(id) => format!("[{}] {}", id, issue.message),
                None => issue.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Validator ───────────────────────────────────────────────────────────────

/// Validates a descriptor tree against a catalog and the blocks already mounted.
pub struct TreeValidator;

impl TreeValidator {
    /// Run every check
    ///
    /// # Arguments
    /// * `root` - The tree about to be mounted
    /// * `catalog` - Block types available for mounting
    /// * `mounted` - Ids of blocks already in the runtime
    pub fn validate(
        root: &BlockDescriptor,
        catalog: &BlockCatalog,
        mounted: &HashSet<BlockId>,
    ) -> TreeValidationResult {
        let mut result = TreeValidationResult::ok();
        let mut seen = HashSet::new();
        Self::check_node(root, catalog, mounted, &mut seen, false, &mut result);
        result
    }

    /// Check one descriptor and recurse into its children
    ///
    /// Ids inside a list template are scoped per item, so each template gets
    /// its own `seen` set and mounted ids do not collide with them.
    fn check_node(
        descriptor: &BlockDescriptor,
        catalog: &BlockCatalog,
        mounted: &HashSet<BlockId>,
        seen: &mut HashSet<BlockId>,
        in_template: bool,
        result: &mut TreeValidationResult,
    ) {
        let id = descriptor.block_id.as_str();
        let at = (!id.is_empty()).then_some(id);

        if descriptor.block_id.is_empty() {
            result.add_error(
                None,
                format!("{} block has an empty id", descriptor.block_type),
                Some("Give every block a unique blockId"),
            );
        } else if !seen.insert(descriptor.block_id.clone()) {
            result.add_error(at, "Duplicate block id", Some("Block ids must be unique"));
        } else if !in_template && mounted.contains(&descriptor.block_id) {
            result.add_error(
                at,
                "A block with this id is already mounted",
                Some("Unmount the existing block first or pick another id"),
            );
        }

        Self::check_events(descriptor, result);

        if in_template && descriptor.value.is_some() {
            result.add_warning(
                at,
                "Initial value of a list template child is ignored; each item supplies it",
                Some("Set the value on the list item instead"),
            );
        }

        if BlockType::from_name(&descriptor.block_type) == BlockType::TextArea
            && descriptor.properties.contains("rows")
            && descriptor.properties.contains("autoSize")
        {
            let rows_apply = descriptor
                .properties
                .deserialize::<TextAreaProperties>()
                .map(|options| options.rows.unwrap_or(0) > 0)
                .unwrap_or(false);
            if rows_apply {
                result.add_warning(
                    at,
                    "Both rows and autoSize are set; rows wins",
                    Some("Remove one of the two properties"),
                );
            }
        }

        let kind = match catalog.create(descriptor) {
            Ok(block) => block.content_kind(),
            Err(_) => {
                let suggestion = Self::suggest_type(&descriptor.block_type, catalog);
                result.add_error(
                    at,
                    format!("Unknown block type '{}'", descriptor.block_type),
                    Some(&suggestion),
                );
                ContentKind::Children
            }
        };

        match kind {
            ContentKind::ItemTemplate => {
                if in_template {
                    result.add_error(
                        at,
                        "A list template cannot contain another list",
                        Some("Move the inner list out of the template"),
                    );
                }
                if let Some(value) = &descriptor.value {
                    if !value.is_array() && !value.is_null() {
                        result.add_warning(
                            at,
                            "Initial list value is not an array; the list starts empty",
                            None,
                        );
                    }
                }
                let mut scope = HashSet::new();
                for child in &descriptor.blocks {
                    Self::check_node(child, catalog, mounted, &mut scope, true, result);
                }
            }
            ContentKind::Children => {
                for child in &descriptor.blocks {
                    Self::check_node(child, catalog, mounted, seen, in_template, result);
                }
            }
        }
    }

    fn check_events(descriptor: &BlockDescriptor, result: &mut TreeValidationResult) {
        let at = Some(descriptor.block_id.as_str()).filter(|id| !id.is_empty());
        let mut names: Vec<&String> = descriptor.events.keys().collect();
        names.sort();
        for name in names {
            if descriptor.events[name].is_empty() {
                result.add_warning(
                    at,
                    format!("Event '{}' has no actions", name),
                    Some("Add actions or remove the event"),
                );
            }
        }
    }

    fn suggest_type(name: &str, catalog: &BlockCatalog) -> String {
        let known = catalog.type_names();
        match known.iter().find(|k| k.eq_ignore_ascii_case(name)) {
            Some(k) => format!("Did you mean '{}'?", k),
            None => format!("Known types: {}", known.join(", ")),
        }
    }
}
