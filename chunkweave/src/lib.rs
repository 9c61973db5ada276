//! chunkweave: dependency-ordered chunked code generation.
//!
//! A request is planned into files and a tree of chunks, scaffolded with
//! placeholders, filled leaf by leaf in dependency order through a
//! [`generation::Generator`], and assembled into finished files.

pub mod generation;
pub mod logging;
pub mod pipeline;
pub mod scan;
