use camino::Utf8Path;
use tracing::{debug, warn};

use crate::domain::{Dataset, Modality};
use crate::error::BidsError;
use crate::fileinfo::{FileInfo, parse_entry_name};
use crate::fs_util::{self, Entry};
use crate::sidecar::{
    Metadata, SidecarScope, derive_meta_fields, derive_tags, load_sidecar, overlay,
};

pub mod anat;
pub mod dwi;
pub mod eeg;
pub mod fmap;
pub mod func;
pub mod meg;

pub trait ModalityHandler: Send + Sync {
    fn modality(&self) -> Modality;
    fn handle(&self, scope: &SidecarScope, dir: &Utf8Path) -> Result<Vec<Dataset>, BidsError>;
}

pub fn handler_for(modality: Modality) -> &'static dyn ModalityHandler {
    match modality {
        Modality::Anat => &anat::AnatHandler,
        Modality::Dwi => &dwi::DwiHandler,
        Modality::Func => &func::FuncHandler,
        Modality::Fmap => &fmap::FmapHandler,
        Modality::Eeg => &eeg::EegHandler,
        Modality::Meg => &meg::MegHandler,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Companion {
    // None keeps the matched suffix as the role
    pub role: Option<&'static str>,
    pub suffixes: &'static [&'static str],
    pub required: bool,
}

impl Companion {
    pub const fn required(role: &'static str, suffix: &'static [&'static str]) -> Self {
        Self {
            role: Some(role),
            suffixes: suffix,
            required: true,
        }
    }

    pub const fn optional(role: &'static str, suffix: &'static [&'static str]) -> Self {
        Self {
            role: Some(role),
            suffixes: suffix,
            required: false,
        }
    }
}

/// Companions added together. A group is attached when all of its required
/// members exist; a `mandatory` group that is incomplete drops the dataset.
/// Members are looked up with the primary file's full prefix only, unless
/// `subject_fallback` also allows the bare `sub-`/`ses-` prefix.
#[derive(Debug, Clone, Copy)]
pub struct CompanionGroup {
    pub mandatory: bool,
    pub subject_fallback: bool,
    pub members: &'static [Companion],
}

#[derive(Debug, Clone, Copy)]
pub struct SuffixRule {
    pub filenames: &'static [&'static str],
    pub role: &'static str,
    pub generic_sidecar: &'static str,
    pub dtag: &'static str,
    pub companions: &'static [CompanionGroup],
}

impl SuffixRule {
    pub fn matches(&self, info: &FileInfo) -> bool {
        info.filename()
            .is_some_and(|filename| self.filenames.contains(&filename))
    }
}

pub fn leaf_entries(dir: &Utf8Path) -> Result<Vec<(Entry, FileInfo)>, BidsError> {
    let mut leaves = Vec::new();
    for entry in fs_util::list_dir(dir)? {
        let info = parse_entry_name(&entry.name);
        if !info.is_bids_leaf() {
            debug!("not a BIDS leaf: {}", entry.path);
            continue;
        }
        leaves.push((entry, info));
    }
    Ok(leaves)
}

/// Sidecar for one data file. Later sources override earlier ones:
/// the scope's generic sidecar, sidecars inherited by name, then the
/// same-basename JSON next to the file.
pub fn resolve_sidecar(
    scope: &SidecarScope,
    dir: &Utf8Path,
    info: &FileInfo,
    generic: &str,
) -> Metadata {
    let mut sidecar = scope.get(generic).cloned().unwrap_or_default();
    if let Some(name) = info.sidecar_name() {
        overlay(&mut sidecar, scope.merge_ancestor_sidecar(&name));
        overlay(&mut sidecar, load_sidecar(&dir.join(&name)));
    }
    sidecar
}

pub fn entity_meta(sidecar: Metadata, info: &FileInfo) -> Metadata {
    let mut meta = sidecar;
    overlay(&mut meta, derive_meta_fields(info));
    meta
}

pub fn locate(
    dir: &Utf8Path,
    info: &FileInfo,
    suffixes: &[&str],
    subject_fallback: bool,
) -> Option<(String, String)> {
    let entity_prefix = info.entity_prefix();
    let mut prefixes = vec![info.prefix()];
    if subject_fallback && entity_prefix != info.prefix() {
        prefixes.push(entity_prefix.as_str());
    }
    for suffix in suffixes {
        for prefix in &prefixes {
            let name = format!("{prefix}{suffix}");
            if dir.join(&name).as_std_path().exists() {
                return Some((suffix.to_string(), name));
            }
        }
    }
    None
}

// Err carries the missing suffix of an incomplete mandatory group.
pub fn attach_companions(
    dataset: &mut Dataset,
    dir: &Utf8Path,
    info: &FileInfo,
    groups: &[CompanionGroup],
) -> Result<(), String> {
    for group in groups {
        let mut found = Vec::new();
        let mut missing = None;
        for member in group.members {
            match locate(dir, info, member.suffixes, group.subject_fallback) {
                Some((suffix, name)) => {
                    let role = member.role.map(str::to_string).unwrap_or(suffix);
                    found.push((role, name));
                }
                None if member.required => {
                    missing = Some(member.suffixes.join("|"));
                    break;
                }
                None => {}
            }
        }
        match missing {
            Some(suffix) if group.mandatory => return Err(suffix),
            Some(suffix) => debug!("{} has no {suffix}", info.full_name()),
            None => {
                for (role, name) in found {
                    dataset.add_file(role, dir.join(name));
                }
            }
        }
    }
    Ok(())
}

pub fn build_dataset(
    scope: &SidecarScope,
    dir: &Utf8Path,
    info: &FileInfo,
    rule: &SuffixRule,
    datatype: &str,
) -> Option<Dataset> {
    let sidecar = resolve_sidecar(scope, dir, info, rule.generic_sidecar);
    let mut dataset = Dataset::new(datatype, info.full_name());
    dataset.meta = entity_meta(sidecar, info);
    dataset.tags = derive_tags(info).into_iter().collect();
    dataset.add_file(rule.role, dir.join(info.full_name()));

    if let Err(missing) = attach_companions(&mut dataset, dir, info, rule.companions) {
        warn!("skipping {}: missing companion {missing}", dir.join(info.full_name()));
        return None;
    }
    Some(dataset)
}

pub fn task_tag(info: &FileInfo) -> String {
    info.field("task").unwrap_or("unknown").to_lowercase()
}

pub fn handle_with_rules<F>(
    scope: &SidecarScope,
    dir: &Utf8Path,
    rules: &[SuffixRule],
    mut finish: F,
) -> Result<Vec<Dataset>, BidsError>
where
    F: FnMut(&SuffixRule, &FileInfo) -> (String, Vec<String>),
{
    let mut datasets = Vec::new();
    for (entry, info) in leaf_entries(dir)? {
        let Some(rule) = rules.iter().find(|rule| rule.matches(&info)) else {
            debug!("ignoring {}", entry.path);
            continue;
        };
        let (datatype, datatype_tags) = finish(rule, &info);
        if let Some(dataset) = build_dataset(scope, dir, &info, rule, &datatype) {
            datasets.push(dataset.with_datatype_tags(datatype_tags));
        }
    }
    Ok(datasets)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;
    use serde_json::json;

    use super::*;

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    #[test]
    fn resolve_sidecar_precedence() {
        let (_temp, dir) = temp_dir();
        fs::write(
            dir.join("sub-01_task-x_bold.json").as_std_path(),
            r#"{"C": "disk"}"#,
        )
        .unwrap();

        let mut scope = SidecarScope::new();
        let generic = json!({"A": "generic", "B": "generic", "C": "generic"});
        let inherited = json!({"B": "inherited", "C": "inherited"});
        scope.insert("bold.json", generic.as_object().cloned().unwrap());
        scope.insert("task-x_bold.json", inherited.as_object().cloned().unwrap());

        let info = parse_entry_name("sub-01_task-x_bold.nii.gz");
        let sidecar = resolve_sidecar(&scope, &dir, &info, "bold.json");
        assert_eq!(
            serde_json::Value::Object(sidecar),
            json!({"A": "generic", "B": "inherited", "C": "disk"})
        );
    }

    #[test]
    fn mandatory_group_reports_missing() {
        const GROUPS: &[CompanionGroup] = &[CompanionGroup {
            mandatory: true,
            subject_fallback: false,
            members: &[Companion::required("dwi.bvals", &["dwi.bval"])],
        }];
        let (_temp, dir) = temp_dir();
        let info = parse_entry_name("sub-01_dwi.nii.gz");
        let mut dataset = Dataset::new("neuro/dwi", "x");
        let err = attach_companions(&mut dataset, &dir, &info, GROUPS).unwrap_err();
        assert_eq!(err, "dwi.bval");
    }

    #[test]
    fn locate_falls_back_to_subject_prefix() {
        let (_temp, dir) = temp_dir();
        fs::write(dir.join("sub-01_electrodes.tsv").as_std_path(), "name\n").unwrap();
        let info = parse_entry_name("sub-01_task-rest_eeg.edf");
        let (suffix, name) = locate(&dir, &info, &["electrodes.tsv"], true).unwrap();
        assert_eq!(suffix, "electrodes.tsv");
        assert_eq!(name, "sub-01_electrodes.tsv");
    }

    #[test]
    fn locate_without_fallback_needs_full_prefix() {
        let (_temp, dir) = temp_dir();
        fs::write(dir.join("sub-01_dwi.bval").as_std_path(), "0 1000\n").unwrap();
        let info = parse_entry_name("sub-01_acq-multiband_dwi.nii.gz");
        assert!(locate(&dir, &info, &["dwi.bval"], false).is_none());
        assert!(locate(&dir, &info, &["dwi.bval"], true).is_some());
    }
}
