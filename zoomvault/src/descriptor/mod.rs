//! Pyramid descriptor discovery and parsing.
//!
//! [`TileInfoResolver::resolve`] fetches an asset page, locates the embedded
//! tile service reference ([`find_descriptor_url`]), then fetches and parses
//! the `TileInfo` XML ([`parse_descriptor`]).

mod discovery;
pub(crate) mod parser;
mod resolver;
mod types;

pub use discovery::{find_descriptor_url, ImageLocation};
pub use parser::parse_descriptor;
pub use resolver::{ResolvedImage, TileInfoResolver};
pub use types::{PyramidLevel, TileInfo};
