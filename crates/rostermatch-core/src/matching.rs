use tracing::debug;

use crate::roster::RosterIndex;
use crate::upload::UploadRecord;

/// One report row. Unmatched numbers carry empty record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub number: String,
    pub display_name: String,
    pub email: String,
    pub enabled: String,
}

impl MatchRow {
    pub fn is_matched(&self) -> bool {
        !self.display_name.is_empty() || !self.email.is_empty() || !self.enabled.is_empty()
    }
}

/// Join upload numbers against the roster index: a hit emits one row per
/// bucketed record in insertion order, a miss emits a single blank row.
/// Upload order is preserved and nothing is deduplicated.
pub fn match_phones(uploads: &[UploadRecord], index: &RosterIndex) -> Vec<MatchRow> {
    log_duplicate_buckets(index);

    let mut rows = Vec::new();
    for upload in uploads {
        match index.get(&upload.number) {
            Some(records) => {
                for record in records {
                    rows.push(MatchRow {
                        number: upload.number.clone(),
                        display_name: record.display_name.clone(),
                        email: record.email.clone(),
                        enabled: record.enabled.clone(),
                    });
                }
            }
            None => {
                debug!(
                    number = %upload.number,
                    source = %upload.source.display(),
                    "no roster match"
                );
                rows.push(MatchRow {
                    number: upload.number.clone(),
                    display_name: String::new(),
                    email: String::new(),
                    enabled: String::new(),
                });
            }
        }
    }
    rows
}

/// Observational only: how many keys carry more than one record, the largest
/// bucket, and a few examples.
fn log_duplicate_buckets(index: &RosterIndex) {
    let mut duplicates: Vec<(&str, usize)> = index
        .iter()
        .filter(|(_, records)| records.len() > 1)
        .map(|(number, records)| (number.as_str(), records.len()))
        .collect();
    if duplicates.is_empty() {
        return;
    }
    duplicates.sort();

    let max_records = duplicates.iter().map(|(_, count)| *count).max().unwrap_or(0);
    let examples = duplicates
        .iter()
        .take(3)
        .map(|(number, count)| format!("{number}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    debug!(
        keys = duplicates.len(),
        max_records,
        examples = %examples,
        "roster keys with multiple records"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterRecord;
    use std::path::PathBuf;

    fn upload(number: &str) -> UploadRecord {
        UploadRecord {
            number: number.to_string(),
            source: PathBuf::from("upload.csv"),
        }
    }

    fn record(name: &str) -> RosterRecord {
        RosterRecord {
            display_name: name.to_string(),
            email: format!("{}@example.com", name.to_ascii_lowercase()),
            enabled: "True".to_string(),
        }
    }

    #[test]
    fn hit_emits_one_row_per_record() {
        let mut index = RosterIndex::new();
        index.insert("123456".to_string(), vec![record("Ada"), record("Grace")]);

        let rows = match_phones(&[upload("123456")], &index);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].display_name, "Ada");
        assert_eq!(rows[1].display_name, "Grace");
        assert!(rows.iter().all(|row| row.number == "123456"));
    }

    #[test]
    fn miss_emits_single_blank_row() {
        let index = RosterIndex::new();
        let rows = match_phones(&[upload("000111")], &index);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].number, "000111");
        assert!(!rows[0].is_matched());
    }

    #[test]
    fn duplicate_uploads_are_not_deduplicated() {
        let mut index = RosterIndex::new();
        index.insert("123456".to_string(), vec![record("Ada")]);

        let rows = match_phones(&[upload("123456"), upload("123456")], &index);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn upload_order_is_preserved() {
        let mut index = RosterIndex::new();
        index.insert("222222".to_string(), vec![record("Ada")]);

        let rows = match_phones(&[upload("999999"), upload("222222")], &index);
        assert_eq!(rows[0].number, "999999");
        assert_eq!(rows[1].number, "222222");
    }
}
