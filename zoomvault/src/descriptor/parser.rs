//! Pyramid descriptor XML parsing.
//!
//! ```text
//! <TileInfo tile_width="512" tile_height="512" full_pyramid_depth="4"
//!           timestamp="1588091245" tiler_version_number="2">
//!   <pyramid_level num_tiles_x="1" num_tiles_y="1" inverse_scale="8"
//!                  empty_pels_x="192" empty_pels_y="262"/>
//!   ...
//! </TileInfo>
//! ```

use std::str::FromStr;

use roxmltree::{Document, Node};

use super::types::{PyramidLevel, TileInfo};
use crate::error::FormatError;

const ROOT_ELEMENT: &str = "TileInfo";

/// Parses a descriptor document into a [`TileInfo`].
///
/// Missing attributes default to 0. Every element child of the root is one
/// pyramid level, in document order.
///
/// # Errors
///
/// - [`FormatError::InvalidXml`] if the document is not well-formed
/// - [`FormatError::MissingRoot`] if the root element is not `TileInfo`
/// - [`FormatError::InvalidAttribute`] if an attribute is not a number
/// - [`FormatError::EmptyPyramid`] if no level is declared
pub fn parse_descriptor(xml: &str, origin: &str) -> Result<TileInfo, FormatError> {
    let doc = Document::parse(xml).map_err(|e| FormatError::InvalidXml(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(FormatError::MissingRoot {
            found: root.tag_name().name().to_string(),
        });
    }

    let tile_width: u32 = attribute(root, "tile_width")?;
    let tile_height: u32 = attribute(root, "tile_height")?;

    let pyramid_levels = root
        .children()
        .filter(Node::is_element)
        .map(|node| {
            Ok(PyramidLevel::new(
                attribute(node, "num_tiles_x")?,
                attribute(node, "num_tiles_y")?,
                attribute(node, "inverse_scale")?,
                attribute(node, "empty_pels_x")?,
                attribute(node, "empty_pels_y")?,
                tile_width,
                tile_height,
            ))
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    let top = pyramid_levels.last().ok_or(FormatError::EmptyPyramid)?;

    Ok(TileInfo {
        width: top.width,
        height: top.height,
        tile_size: tile_width,
        tile_height,
        num_tiles: pyramid_levels.iter().map(PyramidLevel::tile_count).sum(),
        max_zoom_level: (pyramid_levels.len() - 1) as u32,
        origin: origin.to_string(),
        full_pyramid_depth: attribute(root, "full_pyramid_depth")?,
        timestamp: attribute(root, "timestamp")?,
        tiler_version_number: attribute(root, "tiler_version_number")?,
        pyramid_levels,
    })
}

fn attribute<T>(node: Node<'_, '_>, name: &str) -> Result<T, FormatError>
where
    T: FromStr + Default,
{
    match node.attribute(name) {
        None => Ok(T::default()),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| FormatError::InvalidAttribute {
                name: name.to_string(),
                value: raw.to_string(),
            }),
    }
}
