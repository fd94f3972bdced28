//! Walks a BIDS study root and assembles a [`BidsStudy`].

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{BidsStudy, Dataset, Modality};
use crate::error::BidsError;
use crate::fileinfo::parse_entry_name;
use crate::fs_util::{self, first_existing, read_optional_text};
use crate::modality::handler_for;
use crate::participants::{TABLE_NAMES, parse_participants};
use crate::sidecar::{Metadata, SidecarScope, escape_dot_keys};

const DATASET_DESCRIPTION: &str = "dataset_description.json";
const PARTICIPANTS_JSON: &str = "participants.json";
const README_NAMES: &[&str] = &["README", "README.md", "README.txt"];
const CHANGES_NAMES: &[&str] = &["CHANGES"];

#[derive(Debug, Clone)]
pub struct BidsWalker {
    root: Utf8PathBuf,
}

impl BidsWalker {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn walk(&self) -> Result<BidsStudy, BidsError> {
        let root = &self.root;
        if !root.as_std_path().is_dir() {
            return Err(BidsError::InvalidRoot(root.clone().into_std_path_buf()));
        }

        let mut study = BidsStudy {
            readme: first_existing(root, README_NAMES).and_then(|path| read_optional_text(&path)),
            changes: first_existing(root, CHANGES_NAMES)
                .and_then(|path| read_optional_text(&path)),
            dataset_description: load_dataset_description(&root.join(DATASET_DESCRIPTION)),
            participants: first_existing(root, TABLE_NAMES)
                .and_then(|path| read_optional_text(&path))
                .map(|content| parse_participants(&content))
                .unwrap_or_default(),
            participants_column_defs: load_json_document(&root.join(PARTICIPANTS_JSON)).map(
                |mut defs| {
                    escape_dot_keys(&mut defs);
                    defs
                },
            ),
            datasets: Vec::new(),
        };

        let mut scope = SidecarScope::new();
        scope.load_dir(root, &[DATASET_DESCRIPTION, PARTICIPANTS_JSON])?;
        debug!("{} root sidecars in scope", scope.len());

        for entry in fs_util::list_dir(root)? {
            let info = parse_entry_name(&entry.name);
            if info.field("sub").is_none() {
                if is_study_file(&entry.name) {
                    continue;
                }
                info!("skipping non-subject entry {}", entry.path);
                continue;
            }
            if !entry.is_dir {
                debug!("skipping subject-level file {}", entry.path);
                continue;
            }
            walk_subject(&entry.path, &scope, &mut study.datasets)?;
        }

        for dataset in &mut study.datasets {
            escape_dot_keys(&mut dataset.meta);
        }
        info!("scanned {root}: {} datasets", study.datasets.len());
        Ok(study)
    }
}

pub fn walk(root: &Utf8Path) -> Result<BidsStudy, BidsError> {
    BidsWalker::new(root.to_path_buf()).walk()
}

/// Walks a subject directory, or a session directory nested inside one.
fn walk_subject(
    dir: &Utf8Path,
    parent: &SidecarScope,
    datasets: &mut Vec<Dataset>,
) -> Result<(), BidsError> {
    let scope = parent.descend(dir)?;

    for entry in fs_util::list_dir(dir)? {
        if entry.is_dir && entry.name.starts_with("ses-") {
            walk_subject(&entry.path, &scope, datasets)?;
            continue;
        }
        if entry.is_dir {
            if let Ok(modality) = entry.name.parse::<Modality>() {
                let handler = handler_for(modality);
                let found = handler.handle(&scope, &entry.path)?;
                debug!("{} {}: {} datasets", handler.modality(), entry.path, found.len());
                datasets.extend(found);
                continue;
            }
        }
        if entry.name.ends_with(".json") {
            // already merged into scope
            continue;
        }
        debug!("skipping {}", entry.path);
    }
    Ok(())
}

fn is_study_file(name: &str) -> bool {
    name == DATASET_DESCRIPTION
        || name == PARTICIPANTS_JSON
        || README_NAMES.contains(&name)
        || CHANGES_NAMES.contains(&name)
        || TABLE_NAMES.contains(&name)
        || name.ends_with(".json")
}

/// Reads a top-level JSON object. Absent files are `None`; malformed ones are
/// logged and also `None`.
fn load_json_document(path: &Utf8Path) -> Option<Metadata> {
    if !path.as_std_path().is_file() {
        return None;
    }
    let content = match fs::read_to_string(path.as_std_path()) {
        Ok(content) => content,
        Err(err) => {
            warn!("failed to read {path}: {err}");
            return None;
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("{path} is not a JSON object");
            None
        }
        Err(err) => {
            warn!("failed to parse {path}: {err}");
            None
        }
    }
}

fn load_dataset_description(path: &Utf8Path) -> Option<Metadata> {
    let mut description = load_json_document(path)?;
    if let Some(Value::Array(items)) = description.get("HowToAcknowledge") {
        let joined = items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        description.insert("HowToAcknowledge".to_string(), Value::String(joined));
    }
    Some(description)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn how_to_acknowledge_joined() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join(DATASET_DESCRIPTION)).unwrap();
        fs::write(
            path.as_std_path(),
            r#"{"Name": "x", "HowToAcknowledge": ["cite A", "cite B"]}"#,
        )
        .unwrap();
        let description = load_dataset_description(&path).unwrap();
        assert_eq!(description["HowToAcknowledge"], json!("cite A\ncite B"));
    }

    #[test]
    fn malformed_description_is_none() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join(DATASET_DESCRIPTION)).unwrap();
        fs::write(path.as_std_path(), "{not json").unwrap();
        assert!(load_dataset_description(&path).is_none());
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = walk(Utf8Path::new("/definitely/not/a/bids/root")).unwrap_err();
        assert!(matches!(err, BidsError::InvalidRoot(_)));
    }
}
