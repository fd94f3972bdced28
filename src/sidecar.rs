use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::BidsError;
use crate::fileinfo::FileInfo;
use crate::fs_util;

pub type Metadata = Map<String, Value>;

// Keyed by file name. Each directory level works on its own copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidecarScope {
    sidecars: BTreeMap<String, Metadata>,
}

impl SidecarScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Metadata> {
        self.sidecars.get(name)
    }

    pub fn len(&self) -> usize {
        self.sidecars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sidecars.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: Metadata) {
        let entry = self.sidecars.entry(name.into()).or_default();
        overlay(entry, content);
    }

    pub fn load_dir(&mut self, dir: &Utf8Path, exclude: &[&str]) -> Result<(), BidsError> {
        for entry in fs_util::list_dir(dir)? {
            if entry.is_dir || !entry.name.ends_with(".json") {
                continue;
            }
            if exclude.contains(&entry.name.as_str()) {
                continue;
            }
            let content = load_sidecar(&entry.path);
            self.insert(entry.name, content);
        }
        Ok(())
    }

    pub fn descend(&self, dir: &Utf8Path) -> Result<SidecarScope, BidsError> {
        let mut scope = self.clone();
        scope.load_dir(dir, &[])?;
        Ok(scope)
    }

    /// Collects sidecars that apply to `target` by stripping, in turn, the
    /// `run-`, `ses-` and `sub-` entities from its name. Matches found
    /// earlier (more specific names) take precedence over later ones.
    pub fn merge_ancestor_sidecar(&self, target: &str) -> Metadata {
        let mut candidates = vec![target.to_string()];
        for key in ["run", "ses", "sub"] {
            let last = candidates.last().map(String::as_str).unwrap_or(target);
            let stripped = strip_entity(last, key);
            if !candidates.contains(&stripped) {
                candidates.push(stripped);
            }
        }

        let mut merged = Metadata::new();
        for name in &candidates {
            let Some(sidecar) = self.sidecars.get(name) else {
                continue;
            };
            for (key, value) in sidecar {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }
}

fn strip_entity(name: &str, key: &str) -> String {
    let prefix = format!("{key}-");
    name.split('_')
        .filter(|segment| !segment.starts_with(&prefix))
        .collect::<Vec<_>>()
        .join("_")
}

pub fn load_sidecar(path: &Utf8Path) -> Metadata {
    let content = match fs::read_to_string(path.as_std_path()) {
        Ok(content) => content,
        Err(err) => {
            debug!("no sidecar at {path}: {err}");
            return Metadata::new();
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("sidecar {path} is not a JSON object; ignoring");
            Metadata::new()
        }
        Err(err) => {
            warn!("failed to parse sidecar {path}: {err}");
            Metadata::new()
        }
    }
}

pub fn overlay(base: &mut Metadata, top: Metadata) {
    for (key, value) in top {
        base.insert(key, value);
    }
}

pub fn derive_meta_fields(info: &FileInfo) -> Metadata {
    let mut meta = Metadata::new();
    for (key, value) in info.fields() {
        if key.starts_with('_') {
            continue;
        }
        let name = match key {
            "sub" => "subject",
            "ses" => "session",
            "acq" => "acquisition",
            other => other,
        };
        meta.insert(name.to_string(), Value::String(value.to_string()));
    }
    meta
}

pub fn derive_tags(info: &FileInfo) -> Vec<String> {
    info.fields()
        .filter(|(key, _)| !matches!(*key, "sub" | "ses") && !key.starts_with('_'))
        .map(|(key, value)| format!("{key}-{value}"))
        .collect()
}

pub fn escape_dot_keys(meta: &mut Metadata) {
    let escaped = std::mem::take(meta)
        .into_iter()
        .map(|(key, mut value)| {
            escape_value(&mut value);
            (key.replace('.', "-"), value)
        })
        .collect();
    *meta = escaped;
}

fn escape_value(value: &mut Value) {
    match value {
        Value::Object(map) => escape_dot_keys(map),
        Value::Array(items) => items.iter_mut().for_each(escape_value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fileinfo::parse_entry_name;

    fn object(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn specific_sidecar_overrides_broad() {
        let mut scope = SidecarScope::new();
        scope.insert("sub-01_task-x_bold.json", object(json!({"A": 1})));
        scope.insert("task-x_bold.json", object(json!({"A": 2, "B": 2})));

        let merged = scope.merge_ancestor_sidecar("sub-01_task-x_bold.json");
        assert_eq!(Value::Object(merged), json!({"A": 1, "B": 2}));
    }

    #[test]
    fn strips_run_then_session_then_subject() {
        let mut scope = SidecarScope::new();
        scope.insert("sub-01_ses-02_bold.json", object(json!({"Level": "session"})));
        scope.insert("bold.json", object(json!({"Level": "study", "TR": 2})));

        let merged = scope.merge_ancestor_sidecar("sub-01_ses-02_run-03_bold.json");
        assert_eq!(Value::Object(merged), json!({"Level": "session", "TR": 2}));
    }

    #[test]
    fn insert_overlays_same_name() {
        let mut scope = SidecarScope::new();
        scope.insert("T1w.json", object(json!({"A": 1, "B": 1})));
        scope.insert("T1w.json", object(json!({"B": 2})));
        assert_eq!(
            Value::Object(scope.get("T1w.json").cloned().unwrap()),
            json!({"A": 1, "B": 2})
        );
    }

    #[test]
    fn meta_fields_renamed() {
        let info = parse_entry_name("sub-01_ses-02_acq-hi_run-1_task-rest_bold.nii.gz");
        let meta = derive_meta_fields(&info);
        assert_eq!(
            Value::Object(meta),
            json!({"subject": "01", "session": "02", "acquisition": "hi", "run": "1", "task": "rest"})
        );
    }

    #[test]
    fn tags_skip_subject_and_session() {
        let info = parse_entry_name("sub-01_ses-02_acq-ap_run-01_dwi.nii.gz");
        assert_eq!(derive_tags(&info), vec!["acq-ap", "run-01"]);
    }

    #[test]
    fn escape_nested_keys() {
        let mut meta = object(json!({
            "PVT.Motivation1.1": 5,
            "outer": {"a.b": {"c.d": true}},
            "list": [{"x.y": 1}]
        }));
        escape_dot_keys(&mut meta);
        assert_eq!(
            Value::Object(meta),
            json!({
                "PVT-Motivation1-1": 5,
                "outer": {"a-b": {"c-d": true}},
                "list": [{"x-y": 1}]
            })
        );
    }
}
