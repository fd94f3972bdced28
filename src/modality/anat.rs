use camino::Utf8Path;

use crate::domain::{Dataset, Modality};
use crate::error::BidsError;
use crate::sidecar::SidecarScope;

use super::{ModalityHandler, SuffixRule, handle_with_rules};

const RULES: &[SuffixRule] = &[
    SuffixRule {
        filenames: &["T1w.nii.gz", "T1w.nii"],
        role: "t1.nii.gz",
        generic_sidecar: "T1w.json",
        dtag: "t1w",
        companions: &[],
    },
    SuffixRule {
        filenames: &["T2w.nii.gz", "T2w.nii"],
        role: "t2.nii.gz",
        generic_sidecar: "T2w.json",
        dtag: "t2w",
        companions: &[],
    },
    SuffixRule {
        filenames: &["FLAIR.nii.gz", "FLAIR.nii"],
        role: "flair.nii.gz",
        generic_sidecar: "FLAIR.json",
        dtag: "flair",
        companions: &[],
    },
];

pub struct AnatHandler;

impl ModalityHandler for AnatHandler {
    fn modality(&self) -> Modality {
        Modality::Anat
    }

    fn handle(&self, scope: &SidecarScope, dir: &Utf8Path) -> Result<Vec<Dataset>, BidsError> {
        handle_with_rules(scope, dir, RULES, |rule, _info| {
            (format!("neuro/anat/{}", rule.dtag), Vec::new())
        })
    }
}
