use camino::Utf8Path;

use crate::domain::{Dataset, Modality};
use crate::error::BidsError;
use crate::sidecar::SidecarScope;

use super::dwi::SBREF;
use super::{Companion, CompanionGroup, ModalityHandler, SuffixRule, handle_with_rules, task_tag};

const RULES: &[SuffixRule] = &[SuffixRule {
    filenames: &["bold.nii.gz", "bold.nii"],
    role: "bold.nii.gz",
    generic_sidecar: "bold.json",
    dtag: "",
    companions: &[
        CompanionGroup {
            mandatory: false,
            subject_fallback: false,
            members: &[Companion::required("events.tsv", &["events.tsv"])],
        },
        SBREF,
        CompanionGroup {
            mandatory: false,
            subject_fallback: false,
            members: &[
                Companion::required("physio.tsv.gz", &["physio.tsv.gz"]),
                Companion::optional("physio.json", &["physio.json"]),
            ],
        },
    ],
}];

pub struct FuncHandler;

impl ModalityHandler for FuncHandler {
    fn modality(&self) -> Modality {
        Modality::Func
    }

    fn handle(&self, scope: &SidecarScope, dir: &Utf8Path) -> Result<Vec<Dataset>, BidsError> {
        handle_with_rules(scope, dir, RULES, |_rule, info| {
            ("neuro/func/task".to_string(), vec![task_tag(info)])
        })
    }
}
