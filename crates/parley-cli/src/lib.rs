//! Terminal front end for Parley agents
//!
//! The same chat loop drives either an agent built in-process from a
//! configuration file or a `parley-server` reached over HTTP.

pub mod client;
pub mod repl;
