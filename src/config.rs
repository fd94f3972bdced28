use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BidsError;

pub const DEFAULT_CONFIG_FILE: &str = "bids-ingest.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub datatypes: BTreeMap<String, DatatypeEntry>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DatatypeEntry {
    Shorthand(String),
    Detailed(DatatypeEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatatypeEntryObject {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Remote datatype a local datatype string uploads as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatatypeTarget {
    pub id: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub project: Option<String>,
    pub datatypes: BTreeMap<String, DatatypeTarget>,
    pub tags: Vec<String>,
}

impl ResolvedConfig {
    /// Applies command-line values on top of the file configuration.
    pub fn with_overrides(mut self, project: Option<String>, tags: Vec<String>) -> Self {
        if let Some(project) = project {
            self.project = Some(project);
        }
        self.tags = normalize_tags(self.tags.into_iter().chain(tags));
        self
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `bids-ingest.json` from the current directory. An
    /// absent default file resolves to an empty configuration.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, BidsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| BidsError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| BidsError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, BidsError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let datatypes = config
            .datatypes
            .into_iter()
            .map(|(name, entry)| {
                let target = match entry {
                    DatatypeEntry::Shorthand(id) => DatatypeTarget {
                        id,
                        tags: Vec::new(),
                    },
                    DatatypeEntry::Detailed(obj) => DatatypeTarget {
                        id: obj.id,
                        tags: obj.tags,
                    },
                };
                if target.id.trim().is_empty() {
                    return Err(BidsError::ConfigParse(format!(
                        "empty datatype id for {name}"
                    )));
                }
                Ok((name, target))
            })
            .collect::<Result<BTreeMap<_, _>, BidsError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            project: config.project.filter(|project| !project.trim().is_empty()),
            datatypes,
            tags: normalize_tags(config.tags),
        })
    }
}

fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut tags = tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>();
    tags.sort();
    tags.dedup();
    tags
}
