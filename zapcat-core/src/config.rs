//! Catalog configuration: on-disk locations and front-end selection.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CatalogError, Result};
use crate::transponder::FrontendKind;

/// Where the catalog keeps its persisted tables and which delivery front end
/// the scan data describes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Persisted service list.
    pub services_file: PathBuf,
    /// Backup copy written when saving with `to_copy`.
    pub services_backup_file: PathBuf,
    /// Incremental single-transponder updates file.
    pub current_services_file: PathBuf,
    /// Motor-position calibration table.
    pub motor_file: PathBuf,
    /// Provider-name replacement rules.
    pub provider_map_file: PathBuf,
    /// Satellite/cable scan tables.
    pub scan_file: PathBuf,
    /// Delivery front end the scan data is for.
    pub frontend: FrontendKind,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            services_file: PathBuf::from("services.xml"),
            services_backup_file: PathBuf::from("services.bak"),
            current_services_file: PathBuf::from("services.update.xml"),
            motor_file: PathBuf::from("motor.conf"),
            provider_map_file: PathBuf::from("providermap.xml"),
            scan_file: PathBuf::from("satellites.xml"),
            frontend: FrontendKind::Satellite,
        }
    }
}

impl CatalogConfig {
    /// Default file names, all placed under one directory.
    pub fn in_dir(dir: &Path) -> Self {
        let defaults = CatalogConfig::default();
        CatalogConfig {
            services_file: dir.join(defaults.services_file),
            services_backup_file: dir.join(defaults.services_backup_file),
            current_services_file: dir.join(defaults.current_services_file),
            motor_file: dir.join(defaults.motor_file),
            provider_map_file: dir.join(defaults.provider_map_file),
            scan_file: dir.join(defaults.scan_file),
            frontend: defaults.frontend,
        }
    }

    /// Load from a TOML file; unspecified fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| CatalogError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.services_file, PathBuf::from("services.xml"));
        assert_eq!(config.frontend, FrontendKind::Satellite);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CatalogConfig =
            toml::from_str("services_file = \"/tmp/sv.xml\"\nfrontend = \"cable\"").unwrap();
        assert_eq!(config.services_file, PathBuf::from("/tmp/sv.xml"));
        assert_eq!(config.frontend, FrontendKind::Cable);
        assert_eq!(config.motor_file, PathBuf::from("motor.conf"));
    }

    #[test]
    fn test_in_dir() {
        let config = CatalogConfig::in_dir(Path::new("/var/lib/zapcat"));
        assert_eq!(config.services_file, PathBuf::from("/var/lib/zapcat/services.xml"));
    }
}
