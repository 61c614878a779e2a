//! Sessions, parallel runs, and serialization for Planardl.
//!
//! This crate provides:
//! - [`Session`] - Compiling units and running them over subject files
//! - [`GrammarRegistry`] - Grammar parsers by name
//! - [`SessionConfig`] - Engine configuration and worker count
//! - [`serialize`] - `MessagePack` encoding of fact graphs and [`MsgPackSink`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod grammar;
pub mod serialize;
pub mod session;

pub use config::SessionConfig;
pub use grammar::GrammarRegistry;
pub use serialize::MsgPackSink;
pub use session::{CompiledUnit, Session, SubjectFile};
