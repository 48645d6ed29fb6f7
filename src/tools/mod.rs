//! Tool system modules and re-exports.

// === Modules ===

pub mod catalog;
pub mod describe;
pub mod families;
pub mod family;
pub mod fetch_description;
pub mod registry;
pub mod responses;
pub mod spec;
pub mod validation;

// === Re-exports ===

pub use spec::{ToolCapability, ToolContext, ToolError, ToolHandler};

pub use registry::{Route, ToolRegistry, ToolRegistryBuilder};

pub use family::{FamilyValidation, FamilyValidator, OperationTableValidator, ToolFamily};

pub use validation::{ModeConfig, ModeToolValidator, ToolValidator};

pub use describe::describe;
pub use fetch_description::FetchToolDescriptionTool;
