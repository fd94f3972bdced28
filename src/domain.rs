use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::sidecar::Metadata;

/// Modality directory names recognised inside a subject or session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Anat,
    Dwi,
    Func,
    Fmap,
    Eeg,
    Meg,
}

impl Modality {
    pub const ALL: [Modality; 6] = [
        Modality::Anat,
        Modality::Dwi,
        Modality::Func,
        Modality::Fmap,
        Modality::Eeg,
        Modality::Meg,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Modality::Anat => "anat",
            Modality::Dwi => "dwi",
            Modality::Func => "func",
            Modality::Fmap => "fmap",
            Modality::Eeg => "eeg",
            Modality::Meg => "meg",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|modality| modality.dir_name() == value)
            .ok_or_else(|| value.to_string())
    }
}

/// One logical dataset ready for upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub datatype: String,
    pub desc: String,
    pub datatype_tags: Vec<String>,
    pub tags: BTreeSet<String>,
    pub meta: Metadata,
    pub files: BTreeMap<String, Utf8PathBuf>,
}

impl Dataset {
    pub fn new(datatype: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            datatype: datatype.into(),
            desc: desc.into(),
            datatype_tags: Vec::new(),
            tags: BTreeSet::new(),
            meta: Metadata::new(),
            files: BTreeMap::new(),
        }
    }

    pub fn with_datatype_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datatype_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_file(&mut self, role: impl Into<String>, path: Utf8PathBuf) {
        self.files.insert(role.into(), path);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidsStudy {
    pub readme: Option<String>,
    pub changes: Option<String>,
    pub dataset_description: Option<Metadata>,
    pub participants: Vec<Metadata>,
    pub participants_column_defs: Option<Metadata>,
    pub datasets: Vec<Dataset>,
}

impl BidsStudy {
    /// Dataset counts keyed by datatype.
    pub fn summary(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for dataset in &self.datasets {
            *counts.entry(dataset.datatype.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn modality_from_dir_name() {
        assert_eq!("fmap".parse::<Modality>().unwrap(), Modality::Fmap);
        assert_matches!("beh".parse::<Modality>(), Err(_));
    }

    #[test]
    fn summary_counts_datatypes() {
        let mut study = BidsStudy::default();
        study.datasets.push(Dataset::new("neuro/dwi", "a"));
        study.datasets.push(Dataset::new("neuro/dwi", "b"));
        study.datasets.push(Dataset::new("neuro/anat/t1w", "c"));
        let summary = study.summary();
        assert_eq!(summary["neuro/dwi"], 2);
        assert_eq!(summary["neuro/anat/t1w"], 1);
    }
}
