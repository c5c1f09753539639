pub mod emails;
pub mod executor;
pub mod host;
pub mod knowledge;
pub mod registry;
pub mod schema;

pub use emails::{extract_emails, ExtractEmailsTool};
pub use executor::{ToolCallResult, ToolExecutor};
pub use host::{check_host, CheckHostTool, HostCheck};
pub use knowledge::KnowledgeLookupTool;
pub use registry::{RegistryError, Tool, ToolError, ToolOutput, ToolRegistry};
pub use schema::{parse_args, schema_for_args};
