pub mod encoding;
pub mod error;
pub mod matching;
pub mod phone;
pub mod report;
pub mod roster;
pub mod upload;

pub use encoding::{read_to_string_with_fallback, TextEncoding};
pub use error::{CoreError, Result};
pub use matching::{match_phones, MatchRow};
pub use phone::normalize_phone;
pub use report::{write_report, ReportOptions};
pub use roster::{
    parse_roster, AnomalyRecord, RosterColumns, RosterIndex, RosterOptions, RosterOutcome,
    RosterRecord,
};
pub use upload::{read_upload, UploadOptions, UploadRecord};
