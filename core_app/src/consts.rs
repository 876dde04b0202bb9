/// Separates the entries of a persisted list (`"a,b;c,d"`).
pub const LIST_SEPARATOR: char = ';';
/// Separates the two fields of a persisted list entry.
pub const FIELD_SEPARATOR: char = ',';

/// Date format of pet history entries, e.g. `05/03/2024`.
pub const HISTORY_DATE_FORMAT: &str = "%d/%m/%Y";
/// Legacy encoding of a walk's `scheduled_at`, e.g. `05/03/2024 09:30`.
pub const SCHEDULED_AT_FORMAT: &str = "%d/%m/%Y %H:%M";

pub const HISTORY_CODE_SPONSORED: &str = "pad";
pub const HISTORY_CODE_UNSPONSORED: &str = "des";

pub const DEFAULT_S3_BUCKET_NAME: &str = "pet-sponsor-app-storage";
pub const DEFAULT_AWS_REGION: &str = "us-east-2";

/// A transition that loses a compare-and-swap race is re-read and retried this
/// many extra times before the error reaches the caller.
pub const CAS_RETRIES: usize = 1;
