use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters preceding the dotted version in a version marker object
const VERSION_PREFIX_LEN: usize = 12;

/// Object key of the encrypted configuration backup for a private address
pub fn backup_object_key(private_address: &str) -> String {
    format!("CloudN_{private_address}_save_cloudx_config.enc")
}

/// Object key of the version marker paired with a backup
pub fn version_object_key(private_address: &str) -> String {
    format!("CloudN_{private_address}_save_cloudx_version.txt")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version file is empty")]
    Empty,

    #[error("version file is not valid UTF-8")]
    NotUtf8,

    #[error("could not decode version from {0:?}")]
    Malformed(String),
}

/// Parse the target software version out of a version marker object.
///
/// The marker holds a fixed-width label followed by `major.minor.build`;
/// the build component is dropped.
pub fn parse_target_version(content: &[u8]) -> Result<String, VersionParseError> {
    if content.is_empty() {
        return Err(VersionParseError::Empty);
    }
    let text = std::str::from_utf8(content).map_err(|_| VersionParseError::NotUtf8)?;
    // Label width counts characters, not bytes
    let (offset, _) = text
        .char_indices()
        .nth(VERSION_PREFIX_LEN)
        .ok_or_else(|| VersionParseError::Malformed(text.to_string()))?;
    let tail = &text[offset..];

    let mut parts: Vec<&str> = tail.split('.').collect();
    parts.pop();
    let version = parts.join(".").trim().to_string();

    if version.is_empty() {
        return Err(VersionParseError::Malformed(text.to_string()));
    }
    Ok(version)
}

/// A configuration backup the restore is driven from. Read-only to recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupArtifact {
    /// Key of the encrypted backup object
    pub object_key: String,

    /// Key of the companion version marker
    pub version_key: String,

    /// Version the new instance must be bootstrapped to
    pub target_version: String,

    /// Seconds since the backup was last written
    pub age_seconds: u64,
}

impl BackupArtifact {
    pub fn for_address(private_address: &str, target_version: String, age_seconds: u64) -> Self {
        Self {
            object_key: backup_object_key(private_address),
            version_key: version_object_key(private_address),
            target_version,
            age_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys() {
        assert_eq!(
            backup_object_key("10.0.0.5"),
            "CloudN_10.0.0.5_save_cloudx_config.enc"
        );
        assert_eq!(
            version_object_key("10.0.0.5"),
            "CloudN_10.0.0.5_save_cloudx_version.txt"
        );
    }

    #[test]
    fn test_parse_version_drops_build() {
        let version = parse_target_version(b"Version:    7.1.1234\n").unwrap();
        assert_eq!(version, "7.1");
    }

    #[test]
    fn test_parse_version_keeps_longer_prefix() {
        let version = parse_target_version(b"Version:    6.4.2.567").unwrap();
        assert_eq!(version, "6.4.2");
    }

    #[test]
    fn test_parse_version_multibyte_label() {
        let marker = "Versión:    7.1.1234\n";
        assert_eq!(marker.chars().count() - "7.1.1234\n".len(), 12);
        assert_eq!(parse_target_version(marker.as_bytes()).unwrap(), "7.1");
    }

    #[test]
    fn test_parse_version_empty() {
        assert_eq!(parse_target_version(b""), Err(VersionParseError::Empty));
    }

    #[test]
    fn test_parse_version_too_short() {
        assert!(matches!(
            parse_target_version(b"Version:"),
            Err(VersionParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_version_without_dots() {
        assert!(matches!(
            parse_target_version(b"Version:    unknown"),
            Err(VersionParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_version_not_utf8() {
        assert_eq!(
            parse_target_version(&[0xff, 0xfe, 0xfd]),
            Err(VersionParseError::NotUtf8)
        );
    }

    #[test]
    fn test_artifact_for_address() {
        let artifact = BackupArtifact::for_address("10.0.0.5", "7.1".to_string(), 3600);
        assert_eq!(artifact.age_seconds, 3600);
        assert_eq!(artifact.object_key, "CloudN_10.0.0.5_save_cloudx_config.enc");
    }
}
