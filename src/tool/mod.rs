//! Tool calling: tool trait, schemas, argument validation, and the toolkit.

pub mod arguments;
pub mod tool;
pub mod toolkit;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use tool::{FnTool, Tool, ToolContext};
pub use toolkit::{ToolGroup, Toolkit, BASIC_GROUP};
pub use types::{ParameterBuilder, ToolParameters, ToolResponse, ToolSchema};
pub use validation::validate_arguments;
