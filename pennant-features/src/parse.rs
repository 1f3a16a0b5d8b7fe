// Feature document parsing

use crate::error::{FlagError, Result};
use crate::flag::{AssignmentStrategy, Feature, FeatureDefinition};
use serde::Deserialize;
use std::path::Path;

/// Supported feature document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigurationFormat {
    #[default]
    Json,
    Toml,
}

impl ConfigurationFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ConfigurationFormat::Json),
            "toml" => Some(ConfigurationFormat::Toml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ConfigurationFormat::Json => "json",
            ConfigurationFormat::Toml => "toml",
        }
    }

    /// Detect the format from the last segment of a path or URL.
    ///
    /// Query strings and fragments are ignored, so
    /// `https://cdn.example.com/features.toml?v=3` is TOML.
    pub fn detect(location: &str) -> Option<Self> {
        let trimmed = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location);
        let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
        Path::new(last)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::str::FromStr for ConfigurationFormat {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| FlagError::UnsupportedFormat(s.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Wrapped { features: Vec<FeatureDefinition> },
    Bare(Vec<FeatureDefinition>),
}

/// Parse feature definitions without resolving them.
pub fn parse_definitions(data: &[u8], format: ConfigurationFormat) -> Result<Vec<FeatureDefinition>> {
    let document = match format {
        ConfigurationFormat::Json => serde_json::from_slice::<Document>(data)
            .map_err(|e| FlagError::Parse(format!("JSON parse error: {}", e)))?,
        ConfigurationFormat::Toml => {
            let content = std::str::from_utf8(data)
                .map_err(|e| FlagError::Parse(format!("TOML is not UTF-8: {}", e)))?;
            toml::from_str::<Document>(content)
                .map_err(|e| FlagError::Parse(format!("TOML parse error: {}", e)))?
        }
    };

    Ok(match document {
        Document::Wrapped { features } => features,
        Document::Bare(features) => features,
    })
}

/// Parse and resolve every feature of a document.
///
/// One invalid definition rejects the whole document, so a half-read
/// configuration never replaces a good one.
pub fn parse_features(
    data: &[u8],
    format: ConfigurationFormat,
    strategy: &AssignmentStrategy,
) -> Result<Vec<Feature>> {
    parse_definitions(data, format)?
        .into_iter()
        .map(|definition| Feature::from_definition(definition, strategy))
        .collect()
}

/// Read and parse a document from disk, detecting its format from the extension.
pub fn load_file(path: impl AsRef<Path>, strategy: &AssignmentStrategy) -> Result<Vec<Feature>> {
    let path = path.as_ref();
    let format = path
        .to_str()
        .and_then(ConfigurationFormat::detect)
        .unwrap_or_default();
    let data = std::fs::read(path)?;
    parse_features(&data, format, strategy)
}

/// Serialize features to the JSON document shape used by the cache.
pub fn to_json(features: &[Feature]) -> Result<Vec<u8>> {
    #[derive(serde::Serialize)]
    struct Out<'a> {
        features: &'a [Feature],
    }

    serde_json::to_vec_pretty(&Out { features })
        .map_err(|e| FlagError::Parse(format!("JSON serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::{FeatureType, TestKind};

    #[test]
    fn test_parse_wrapped_json() {
        let json = br#"{"features": [{"name": "dark_mode", "enabled": true}]}"#;
        let features = parse_features(json, ConfigurationFormat::Json, &AssignmentStrategy::Random)
            .unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name().as_str(), "dark_mode");
        assert!(features[0].is_enabled(false));
    }

    #[test]
    fn test_parse_bare_json() {
        let json = br#"[{"name": "a"}, {"name": "b", "test-variations": ["x", "y", "z"]}]"#;
        let features = parse_features(json, ConfigurationFormat::Json, &AssignmentStrategy::Random)
            .unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(
            features[1].feature_type(),
            FeatureType::FeatureTest(TestKind::Mvt)
        );
    }

    #[test]
    fn test_parse_toml() {
        let toml = br#"
            [[features]]
            name = "checkout_flow"
            test-variations = ["A", "B"]
            test-biases = [20, 80]
            labels = ["Classic", "Streamlined"]

            [[features]]
            name = "dark_mode"
            enabled = true
        "#;
        let features = parse_features(toml, ConfigurationFormat::Toml, &AssignmentStrategy::Random)
            .unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(
            features[0].feature_type(),
            FeatureType::FeatureTest(TestKind::Ab)
        );
        assert_eq!(features[0].test_biases()[1].value(), 80.0);
    }

    #[test]
    fn test_invalid_documents() {
        let strategy = AssignmentStrategy::Random;
        assert!(parse_features(b"not json", ConfigurationFormat::Json, &strategy).is_err());
        assert!(parse_features(br#"{"flags": []}"#, ConfigurationFormat::Json, &strategy).is_err());
        assert!(parse_features(br#"[{"name": ""}]"#, ConfigurationFormat::Json, &strategy).is_err());
        assert!(parse_features(br#"[{"name": "x", "type": "bogus"}]"#, ConfigurationFormat::Json, &strategy).is_err());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigurationFormat::from_extension("JSON"), Some(ConfigurationFormat::Json));
        assert_eq!(ConfigurationFormat::from_extension("toml"), Some(ConfigurationFormat::Toml));
        assert_eq!(ConfigurationFormat::from_extension("plist"), None);
        assert_eq!(
            ConfigurationFormat::detect("https://cdn.example.com/flags/features.toml?v=3"),
            Some(ConfigurationFormat::Toml)
        );
        assert_eq!(
            ConfigurationFormat::detect("/etc/app/Features.json"),
            Some(ConfigurationFormat::Json)
        );
        assert_eq!(ConfigurationFormat::detect("https://example.com/features"), None);
    }

    #[test]
    fn test_json_output_parses_back() {
        let features = vec![
            Feature::flag("dark_mode", true),
            Feature::test("checkout_flow", ["A", "B"]).with_assignment(70.0),
        ];
        let data = to_json(&features).unwrap();
        let parsed = parse_features(&data, ConfigurationFormat::Json, &AssignmentStrategy::Random)
            .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].test_variation_assignment(), 70.0);
        assert_eq!(parsed[1].test_variation(), features[1].test_variation());
    }
}
