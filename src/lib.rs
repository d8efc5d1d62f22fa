//! Contract-driven API shapes: patterns, matching, example generation and
//! backward-compatibility checks between two versions of a contract.
pub mod cli;
pub mod compatibility;
pub mod document;
pub mod error;
pub mod feature;
pub mod http;
pub mod logging;
pub mod path_de;
pub mod pattern;
pub mod resolver;
pub mod result;
pub mod stub;
pub mod value;
