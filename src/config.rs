use crate::image_ops::image_types::Extensions;
use crate::image_ops::operations::DEFAULT_COMPRESSION_QUALITY;
use crate::image_ops::processing::NormalizeSettings;
use crate::utils::types::{OwnerField, OwnerFields};
use envconfig::Envconfig;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

/// Lossy compression quality, 1..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality(DEFAULT_COMPRESSION_QUALITY)
    }
}

#[derive(Debug)]
pub struct ParseQualityError {
    msg: String,
}

impl fmt::Display for ParseQualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl FromStr for Quality {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u8>() {
            Ok(quality) if (1..=100).contains(&quality) => Ok(Quality(quality)),
            _ => Err(ParseQualityError {
                msg: format!("Expected quality in 1..=100, got {}", s),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}")]
    Env(String),
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Envconfig)]
struct EnvConfig {
    // ------------------
    // Storage locations
    /// Directory every owner image path is relative to
    #[envconfig(from = "MEDIA_ROOT", default = "media")]
    pub media_root: String,
    /// Where superseded originals are moved, relative to MEDIA_ROOT
    #[envconfig(from = "ARCHIVE_DIR", default = "_media")]
    pub archive_dir: String,
    /// Record store location (directory)
    #[envconfig(from = "RECORD_STORE_DIR", default = ".site-media")]
    pub record_store_dir: String,

    // ------------------
    // Normalization policy
    /// Images wider than this are scaled down to exactly this width
    #[envconfig(from = "MAX_WIDTH", default = "1200")]
    pub max_width: NonZeroU32,
    #[envconfig(from = "QUALITY", default = "85")]
    pub quality: Quality,
    #[envconfig(from = "TARGET_EXTENSION", default = "Webp")]
    pub extension: Extensions,
    /// Ordered (record kind, image field) pairs to scan
    #[envconfig(
        from = "OWNER_FIELDS",
        default = "Event:image,EventGallery:img,Course:image,Gallery:img,Certificate:img"
    )]
    pub owner_fields: OwnerFields,
    /// Log what would change without touching files or records
    #[envconfig(from = "DRY_RUN", default = "false")]
    pub dry_run: bool,
}

pub struct Config {
    pub media_root: PathBuf,
    pub record_store_dir: PathBuf,
    pub owner_fields: Vec<OwnerField>,
    pub settings: NormalizeSettings,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let env_conf =
            EnvConfig::init_from_env().map_err(|err| ConfigError::Env(err.to_string()))?;
        Self::build(env_conf)
    }

    pub fn from_hashmap(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        let env_conf =
            EnvConfig::init_from_hashmap(vars).map_err(|err| ConfigError::Env(err.to_string()))?;
        Self::build(env_conf)
    }

    fn build(env_conf: EnvConfig) -> Result<Config, ConfigError> {
        let archive_dir = env_conf.archive_dir.trim_matches('/').to_string();
        if archive_dir.is_empty() || archive_dir.split('/').any(|part| part == "..") {
            return Err(ConfigError::Invalid {
                name: "ARCHIVE_DIR",
                reason: format!(
                    "{:?} must be a subdirectory of the media root",
                    env_conf.archive_dir
                ),
            });
        }

        Ok(Config {
            media_root: PathBuf::from(env_conf.media_root),
            record_store_dir: PathBuf::from(env_conf.record_store_dir),
            owner_fields: env_conf.owner_fields.0,
            settings: NormalizeSettings {
                max_width: env_conf.max_width,
                quality: env_conf.quality.get(),
                extension: env_conf.extension,
                archive_dir,
                dry_run: env_conf.dry_run,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::OwnerKind;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_site_policy() {
        let config = Config::from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.media_root, PathBuf::from("media"));
        assert_eq!(config.record_store_dir, PathBuf::from(".site-media"));
        assert_eq!(config.owner_fields, OwnerField::site_defaults());
        assert_eq!(config.settings.max_width.get(), 1200);
        assert_eq!(config.settings.quality, 85);
        assert_eq!(config.settings.extension, Extensions::Webp);
        assert_eq!(config.settings.archive_dir, "_media");
        assert!(!config.settings.dry_run);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_hashmap(&vars(&[
            ("MEDIA_ROOT", "/srv/site/media"),
            ("ARCHIVE_DIR", "/old/"),
            ("MAX_WIDTH", "800"),
            ("QUALITY", "70"),
            ("OWNER_FIELDS", "Certificate:img"),
            ("DRY_RUN", "true"),
        ]))
        .unwrap();

        assert_eq!(config.media_root, PathBuf::from("/srv/site/media"));
        assert_eq!(config.settings.archive_dir, "old");
        assert_eq!(config.settings.max_width.get(), 800);
        assert_eq!(config.settings.quality, 70);
        assert_eq!(
            config.owner_fields,
            vec![OwnerField::new(OwnerKind::Certificate, "img")]
        );
        assert!(config.settings.dry_run);
    }

    #[test]
    fn rejects_out_of_range_values() {
        for (name, value) in [
            ("QUALITY", "0"),
            ("QUALITY", "101"),
            ("MAX_WIDTH", "0"),
            ("OWNER_FIELDS", "Instructor:photo"),
            ("ARCHIVE_DIR", "../outside"),
            ("ARCHIVE_DIR", "/"),
        ] {
            assert!(
                Config::from_hashmap(&vars(&[(name, value)])).is_err(),
                "{}={} should be rejected",
                name,
                value
            );
        }
    }
}
