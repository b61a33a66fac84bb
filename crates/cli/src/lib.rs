//! `fret` command-line front-end: argument parsing, application state,
//! command handlers and text rendering of the dashboards.

pub mod args;
pub mod commands;
pub mod render;
pub mod state;
