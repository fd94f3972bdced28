use serde_json::Value;

use crate::sidecar::Metadata;

/// Header names that identify the subject column, in priority order.
const SUBJECT_COLUMNS: &[&str] = &["Observations", "participant_id"];

pub const TABLE_NAMES: &[&str] = &["participants.tsv", "participant_data.tsv"];

/// Parses a participants table into one record per subject.
///
/// Each record holds every column plus `subject`, the value of the detected
/// subject column without its `sub-` prefix. Rows without a subject are dropped.
pub fn parse_participants(content: &str) -> Vec<Metadata> {
    let mut lines = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns = header.split('\t').map(str::trim).collect::<Vec<_>>();
    let subject_idx = subject_column(&columns);

    let mut records = Vec::new();
    for line in lines {
        let cells = line.split('\t').map(str::trim).collect::<Vec<_>>();
        let subject = cells.get(subject_idx).copied().unwrap_or_default();
        if subject.is_empty() {
            continue;
        }

        let mut record = Metadata::new();
        for (idx, column) in columns.iter().enumerate() {
            let value = cells.get(idx).copied().unwrap_or_default();
            record.insert(column.to_string(), Value::String(value.to_string()));
        }
        let subject = subject.strip_prefix("sub-").unwrap_or(subject);
        record.insert("subject".to_string(), Value::String(subject.to_string()));
        records.push(record);
    }
    records
}

fn subject_column(columns: &[&str]) -> usize {
    SUBJECT_COLUMNS
        .iter()
        .find_map(|name| columns.iter().position(|column| column == name))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_column_detected() {
        let table = "age\tparticipant_id\tsex\n34\tsub-01\tF\n\n29\tsub-02\tM\n";
        let records = parse_participants(table);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["subject"], "01");
        assert_eq!(records[0]["age"], "34");
        assert_eq!(records[1]["participant_id"], "sub-02");
    }

    #[test]
    fn observations_takes_priority() {
        let table = "participant_id\tObservations\nsub-x\tC01\n";
        let records = parse_participants(table);
        assert_eq!(records[0]["subject"], "C01");
    }

    #[test]
    fn first_column_fallback_and_crlf() {
        let table = "id\tgroup\r\nA1\tn/a\r\n";
        let records = parse_participants(table);
        assert_eq!(records[0]["subject"], "A1");
        assert_eq!(records[0]["group"], "n/a");
    }

    #[test]
    fn empty_table() {
        assert!(parse_participants("").is_empty());
    }
}
