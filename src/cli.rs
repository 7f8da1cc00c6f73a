//! CLI domain: parse, route, and presentation only.
//! No relay logic; the route table dispatches to the observability context.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands};
pub use presentation::{format_config_toml, format_health_summary, format_live_line};
pub use route::RunContext;
