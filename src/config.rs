/*!
 * Layered run configuration for Meander
 *
 * The persisted configuration is a plain section/option/value text file
 * (TOML tables of strings). Values stay free-form strings and are
 * interpreted (path, int, bool) only at the point of use.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MeanderError, Result};

/// Section holding the pipeline data roots
pub const DATA_SECTION: &str = "Data";
/// Section naming the external stage executables
pub const TOOLS_SECTION: &str = "Tools";

/// A section name → option name → string value mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Configuration {
    /// Create an empty-but-valid configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration written by `--init`
    pub fn defaults() -> Self {
        let mut cfg = Configuration::new();
        cfg.set(DATA_SECTION, "input", "");
        cfg.set(DATA_SECTION, "output", "");
        cfg.set("Segmentation", "method", "NDVI");
        cfg.set("Segmentation", "label", "auto");
        cfg.set("Pruning", "iterations", "50");
        cfg.set("Axis", "flow_from", "N");
        cfg.set("Migration", "method", "distance");
        cfg.set("Migration", "use_wavelets", "false");
        cfg.set("Migration", "columns", "0 1");
        cfg.set("Migration", "pfreq", "10");
        cfg.set(TOOLS_SECTION, "segmentation", "meander-segment");
        cfg.set(TOOLS_SECTION, "clean", "meander-clean");
        cfg.set(TOOLS_SECTION, "skeletonization", "meander-skeleton");
        cfg.set(TOOLS_SECTION, "axis", "meander-axis");
        cfg.set(TOOLS_SECTION, "migration", "meander-migration");
        cfg.set(TOOLS_SECTION, "bars", "meander-bars");
        cfg
    }

    /// Look up an option, `None` if the section or option is absent
    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(option))
            .map(String::as_str)
    }

    /// Set an option, creating the section if needed
    pub fn set(&mut self, section: &str, option: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(option.to_string(), value.to_string());
    }

    /// Whether a section exists
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Look up an option that must exist
    pub fn require(&self, section: &str, option: &str) -> Result<&str> {
        self.get(section, option).ok_or_else(|| {
            MeanderError::Config(format!("missing option {}.{}", section, option))
        })
    }

    /// Look up a required option interpreted as a non-empty path
    pub fn require_path(&self, section: &str, option: &str) -> Result<PathBuf> {
        let value = self.require(section, option)?;
        if value.is_empty() {
            return Err(MeanderError::Config(format!(
                "option {}.{} is empty",
                section, option
            )));
        }
        Ok(PathBuf::from(value))
    }

    /// Look up a required option interpreted as an unsigned integer
    pub fn require_usize(&self, section: &str, option: &str) -> Result<usize> {
        let value = self.require(section, option)?;
        value.parse().map_err(|_| {
            MeanderError::Config(format!(
                "option {}.{} is not an integer: {:?}",
                section, option, value
            ))
        })
    }

    /// Look up a required option interpreted as a whitespace-separated
    /// pair of unsigned integers
    pub fn require_usize_pair(&self, section: &str, option: &str) -> Result<(usize, usize)> {
        let value = self.require(section, option)?;
        let parts: Vec<&str> = value.split_whitespace().collect();
        let parse = |s: &str| -> Result<usize> {
            s.parse().map_err(|_| {
                MeanderError::Config(format!(
                    "option {}.{} is not an integer pair: {:?}",
                    section, option, value
                ))
            })
        };
        match parts.as_slice() {
            [a, b] => Ok((parse(a)?, parse(b)?)),
            _ => Err(MeanderError::Config(format!(
                "option {}.{} is not an integer pair: {:?}",
                section, option, value
            ))),
        }
    }

    /// Apply `section.option=value` overrides. A value is set only when the
    /// option already exists under that section; unknown keys are silently
    /// ignored so a typo cannot smuggle an undeclared option into the file.
    /// Returns the `(section, option)` keys actually applied.
    pub fn apply_overrides(&mut self, overrides: &[OverrideKey]) -> Vec<(String, String)> {
        let mut applied = Vec::new();
        for ov in overrides {
            let known = self
                .sections
                .get(&ov.section)
                .is_some_and(|s| s.contains_key(&ov.option));
            if known {
                self.set(&ov.section, &ov.option, &ov.value);
                applied.push((ov.section.clone(), ov.option.clone()));
            }
        }
        applied
    }
}

/// One parsed `--set SECTION.OPTION=VALUE` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideKey {
    pub section: String,
    pub option: String,
    pub value: String,
}

impl OverrideKey {
    /// Parse `SECTION.OPTION=VALUE`
    pub fn parse(raw: &str) -> Result<Self> {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            MeanderError::Config(format!("malformed override {:?}, expected SECTION.OPTION=VALUE", raw))
        })?;
        let (section, option) = key.split_once('.').ok_or_else(|| {
            MeanderError::Config(format!("malformed override {:?}, expected SECTION.OPTION=VALUE", raw))
        })?;
        if section.is_empty() || option.is_empty() {
            return Err(MeanderError::Config(format!(
                "malformed override {:?}, expected SECTION.OPTION=VALUE",
                raw
            )));
        }
        Ok(OverrideKey {
            section: section.to_string(),
            option: option.to_string(),
            value: value.to_string(),
        })
    }
}

/// Loads and persists the section/option configuration file
pub struct ConfigStore;

impl ConfigStore {
    /// Parse the persisted configuration. A path that does not exist yet
    /// yields an empty-but-valid configuration (init mode); a file that
    /// exists but does not parse is a configuration error.
    pub fn load(path: &Path) -> Result<Configuration> {
        if !path.exists() {
            return Ok(Configuration::new());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            MeanderError::Config(format!("unparsable config file {}: {}", path.display(), e))
        })
    }

    /// Write the full configuration back in section/option/value form
    pub fn save(cfg: &Configuration, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(cfg).map_err(|e| {
            MeanderError::Config(format!("cannot serialize configuration: {}", e))
        })?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_contain_data_section() {
        let cfg = Configuration::defaults();
        assert!(cfg.has_section(DATA_SECTION));
        assert_eq!(cfg.get(DATA_SECTION, "input"), Some(""));
        assert_eq!(cfg.get(DATA_SECTION, "output"), Some(""));
        assert_eq!(cfg.get("Migration", "pfreq"), Some("10"));
    }

    #[test]
    fn test_require_missing_option() {
        let cfg = Configuration::new();
        let err = cfg.require(DATA_SECTION, "output").unwrap_err();
        assert!(err.to_string().contains("Data.output"));
    }

    #[test]
    fn test_require_path_rejects_empty() {
        let cfg = Configuration::defaults();
        let err = cfg.require_path(DATA_SECTION, "output").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_require_usize_pair() {
        let mut cfg = Configuration::new();
        cfg.set("Migration", "columns", "3 7");
        assert_eq!(cfg.require_usize_pair("Migration", "columns").unwrap(), (3, 7));

        cfg.set("Migration", "columns", "3");
        assert!(cfg.require_usize_pair("Migration", "columns").is_err());

        cfg.set("Migration", "columns", "a b");
        assert!(cfg.require_usize_pair("Migration", "columns").is_err());
    }

    #[test]
    fn test_apply_overrides_only_touches_declared_options() {
        let mut cfg = Configuration::defaults();
        let overrides = vec![
            OverrideKey::parse("Data.output=/srv/out").unwrap(),
            OverrideKey::parse("Data.bogus=1").unwrap(),
            OverrideKey::parse("Nowhere.option=x").unwrap(),
        ];
        let applied = cfg.apply_overrides(&overrides);
        assert_eq!(applied, vec![("Data".to_string(), "output".to_string())]);
        assert_eq!(cfg.get(DATA_SECTION, "output"), Some("/srv/out"));
        assert_eq!(cfg.get(DATA_SECTION, "bogus"), None);
        assert!(!cfg.has_section("Nowhere"));
    }

    #[test]
    fn test_override_parse_rejects_malformed() {
        assert!(OverrideKey::parse("Data.output").is_err());
        assert!(OverrideKey::parse("output=/srv/out").is_err());
        assert!(OverrideKey::parse(".x=1").is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meander.cfg");

        let mut cfg = Configuration::defaults();
        cfg.set(DATA_SECTION, "output", "/srv/river/out");
        ConfigStore::save(&cfg, &path).unwrap();

        let loaded = ConfigStore::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let cfg = ConfigStore::load(&dir.path().join("absent.cfg")).unwrap();
        assert_eq!(cfg, Configuration::new());
    }

    #[test]
    fn test_load_unparsable_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.cfg");
        std::fs::write(&path, "[Data\ninput = ").unwrap();
        let err = ConfigStore::load(&path).unwrap_err();
        assert!(matches!(err, MeanderError::Config(_)));
    }
}
