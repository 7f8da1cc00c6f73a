//! Integration tests for the logrelay observability core

mod cli_binary;
mod config_integration;
mod observability_context;
mod relay_socket;
