use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Sha256Hash;

/// One indicator-of-compromise pattern hit, ready to publish to
/// `iocs.pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IOCMatch {
    /// Correlation id of the scanned file's originating job.
    pub job_id: Uuid,
    /// Content hash of the scanned file.
    pub file_sha256: Sha256Hash,
    /// Path the file was scanned from, for diagnostics.
    pub file_path: String,
    /// Name of the registered pattern that matched (e.g. `"email_gdf"`).
    pub ioc_type: String,
    /// The matched substring.
    pub value: String,
    /// A five-line window around the hit, current line prefixed with `>`.
    pub context: String,
    /// 1-based line number of the hit within the scanned file.
    pub line_number: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let m = IOCMatch {
            job_id: Uuid::new_v4(),
            file_sha256: Sha256Hash::parse("a".repeat(64)).unwrap(),
            file_path: "/storage/aa/bb/x_leak.txt".into(),
            ioc_type: "email_gdf".into(),
            value: "admin@example.gov.br".into(),
            context: "  1 | contact: admin@example.gov.br".into(),
            line_number: 1,
        };
        let json = serde_json::to_string(&m).unwrap();
        let back: IOCMatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, m.value);
        assert_eq!(back.line_number, 1);
    }
}
