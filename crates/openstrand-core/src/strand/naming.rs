//! Layer name parsing.
//!
//! Regular and attached strands are named `S_K` (set number, intra-set
//! index). Masked strands join their components: `S1_K1_S2_K2`.

use crate::error::{StrandError, StrandResult};

/// Split `S_K` into its set number and index.
pub fn parse_layer_name(name: &str) -> Option<(i32, u32)> {
    let (set, index) = name.split_once('_')?;
    if index.contains('_') {
        return None;
    }
    Some((set.parse().ok()?, index.parse().ok()?))
}

/// Split a masked layer name into its two component names.
pub fn parse_masked_layer_name(name: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some((format!("{}_{}", parts[0], parts[1]), format!("{}_{}", parts[2], parts[3])))
}

/// Name of the masked strand over `first` and `second`.
pub fn masked_layer_name(first: &str, second: &str) -> String {
    format!("{first}_{second}")
}

/// Check a layer name against the naming scheme of its variant.
pub fn validate_layer_name(name: &str, masked: bool) -> StrandResult<()> {
    let valid = if masked {
        parse_masked_layer_name(name)
            .map(|(a, b)| parse_layer_name(&a).is_some() && parse_layer_name(&b).is_some())
            .unwrap_or(false)
    } else {
        parse_layer_name(name).map(|(_, k)| k >= 1).unwrap_or(false)
    };
    if valid {
        Ok(())
    } else {
        Err(StrandError::InvalidLayerName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layer_name() {
        assert_eq!(parse_layer_name("3_2"), Some((3, 2)));
        assert_eq!(parse_layer_name("3"), None);
        assert_eq!(parse_layer_name("a_1"), None);
        assert_eq!(parse_layer_name("1_2_3_4"), None);
    }

    #[test]
    fn test_parse_masked_layer_name() {
        assert_eq!(
            parse_masked_layer_name("1_1_2_1"),
            Some(("1_1".to_string(), "2_1".to_string()))
        );
        assert_eq!(parse_masked_layer_name("1_1"), None);
    }

    #[test]
    fn test_validate_layer_name() {
        assert!(validate_layer_name("1_1", false).is_ok());
        assert!(validate_layer_name("1_0", false).is_err());
        assert!(validate_layer_name("1_1_2_1", true).is_ok());
        assert!(matches!(
            validate_layer_name("x", false),
            Err(StrandError::InvalidLayerName(_))
        ));
    }
}
