use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    full_name: String,
    filename: Option<String>,
    fields: Vec<(String, String)>,
}

/// Splits `sub-01_ses-02_task-rest_bold.nii.gz` on `_` into `key-value`
/// entities plus the hyphen-less suffix token (`bold.nii.gz`).
pub fn parse_entry_name(name: &str) -> FileInfo {
    let base = name.rsplit('/').next().unwrap_or(name);
    let mut filename = None;
    let mut fields: Vec<(String, String)> = Vec::new();

    for segment in base.split('_') {
        match segment.split_once('-') {
            // Several hyphen-less tokens in one name: the last one wins.
            None => filename = Some(segment.to_string()),
            Some((key, value)) => {
                if let Some(existing) = fields.iter_mut().find(|(k, _)| k == key) {
                    existing.1 = value.to_string();
                } else {
                    fields.push((key.to_string(), value.to_string()));
                }
            }
        }
    }

    FileInfo {
        full_name: name.to_string(),
        filename,
        fields,
    }
}

impl FileInfo {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn is_bids_leaf(&self) -> bool {
        self.filename.is_some()
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // `bold` for `..._bold.nii.gz`
    pub fn suffix(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .map(|name| name.split_once('.').map_or(name, |(stem, _)| stem))
    }

    pub fn prefix(&self) -> &str {
        if let Some(stripped) = self
            .filename
            .as_deref()
            .and_then(|filename| self.full_name.strip_suffix(filename))
        {
            return stripped;
        }
        match self.full_name.rfind('_') {
            Some(idx) => &self.full_name[..=idx],
            None => "",
        }
    }

    pub fn sibling(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.prefix())
    }

    pub fn sidecar_name(&self) -> Option<String> {
        self.suffix().map(|suffix| self.sibling(&format!("{suffix}.json")))
    }

    pub fn entity_prefix(&self) -> String {
        let mut prefix = String::new();
        for key in ["sub", "ses"] {
            if let Some(value) = self.field(key) {
                prefix.push_str(&format!("{key}-{value}_"));
            }
        }
        prefix
    }
}

impl From<&str> for FileInfo {
    fn from(value: &str) -> Self {
        parse_entry_name(value)
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fields_and_suffix() {
        let info = parse_entry_name("sub-C01087_ses-01_run-01_T1w.nii.gz");
        assert_eq!(info.filename(), Some("T1w.nii.gz"));
        assert_eq!(info.field("sub"), Some("C01087"));
        assert_eq!(info.field("ses"), Some("01"));
        assert_eq!(info.field("run"), Some("01"));
        assert_eq!(info.suffix(), Some("T1w"));
        assert_eq!(info.prefix(), "sub-C01087_ses-01_run-01_");
    }

    #[test]
    fn hyphenated_value_kept_whole() {
        let info = parse_entry_name("sub-01_dir-PA-extra_epi.nii.gz");
        assert_eq!(info.field("dir"), Some("PA-extra"));
    }

    #[test]
    fn duplicate_key_overwrites_in_place() {
        let info = parse_entry_name("sub-01_run-1_run-2_bold.nii.gz");
        let fields: Vec<_> = info.fields().collect();
        assert_eq!(fields, vec![("sub", "01"), ("run", "2")]);
    }

    #[test]
    fn directory_name_has_no_suffix() {
        let info = parse_entry_name("sub-01");
        assert!(!info.is_bids_leaf());
        assert_eq!(info.field("sub"), Some("01"));
    }

    #[test]
    fn sidecar_and_siblings() {
        let info = parse_entry_name("sub-01_acq-ap_dwi.nii.gz");
        assert_eq!(info.sidecar_name().as_deref(), Some("sub-01_acq-ap_dwi.json"));
        assert_eq!(info.sibling("dwi.bvec"), "sub-01_acq-ap_dwi.bvec");
        assert_eq!(info.entity_prefix(), "sub-01_");
    }
}
