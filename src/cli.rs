//! CLI domain: parse, route, output and presentation only.
//! Engine work happens in `WorkRepository`; the route table resolves
//! arguments and formats results.

mod output;
mod parse;
mod presentation;
mod route;
mod state;

pub use output::map_error;
pub use parse::{BranchCommands, Cli, Commands, Strategy};
pub use route::RunContext;
pub use state::{RepositoryEntry, WorkspaceState};
