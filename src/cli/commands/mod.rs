//! One module per subcommand.

pub mod archive;
pub mod audit_cmd;
pub mod completions;
pub mod list;
pub mod rotate;
pub mod upgrade;
pub mod version;
