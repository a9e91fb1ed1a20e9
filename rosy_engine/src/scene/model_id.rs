/// Level-editor model identifiers.
///
/// A model id names a node inside an asset: `asset/path:node:child`. The
/// first segment is the asset path, the rest is the node name path from a
/// root node down. Segments are separated by `:` and none may be empty.

use std::fmt;
use crate::engine_bail;
use crate::error::Result;

pub const MODEL_ID_DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    pub asset_path: String,
    pub node_path: Vec<String>,
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.asset_path)?;
        for segment in &self.node_path {
            write!(f, "{}{}", MODEL_ID_DELIMITER, segment)?;
        }
        Ok(())
    }
}

/// Split `id` into its asset path and node path
///
/// # Errors
///
/// `Error::MalformedAsset` (logged) if any segment is empty.
pub fn parse_model_id(id: &str) -> Result<ModelId> {
    let mut segments = id.split(MODEL_ID_DELIMITER);
    let asset_path = segments.next().unwrap_or_default();
    if asset_path.is_empty() {
        engine_bail!("rosy::scene", MalformedAsset => "model id '{}' has an empty asset path", id);
    }

    let mut node_path = Vec::new();
    for (position, segment) in segments.enumerate() {
        if segment.is_empty() {
            engine_bail!("rosy::scene", MalformedAsset =>
                "model id '{}' has an empty segment at position {}", id, position + 1);
        }
        node_path.push(segment.to_string());
    }

    Ok(ModelId {
        asset_path: asset_path.to_string(),
        node_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_full_id() {
        let id = parse_model_id("assets/level.rsy:world:mobs:mob_a").unwrap();
        assert_eq!(id.asset_path, "assets/level.rsy");
        assert_eq!(id.node_path, vec!["world", "mobs", "mob_a"]);
    }

    #[test]
    fn test_parse_asset_only() {
        let id = parse_model_id("assets/level.rsy").unwrap();
        assert!(id.node_path.is_empty());
    }

    #[test]
    fn test_display_round_trips() {
        let text = "a.rsy:root:child";
        assert_eq!(parse_model_id(text).unwrap().to_string(), text);
    }

    #[test]
    fn test_empty_segments_are_errors() {
        for bad in ["", ":root", "a.rsy::child", "a.rsy:root:"] {
            assert!(
                matches!(parse_model_id(bad), Err(Error::MalformedAsset(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }
}
