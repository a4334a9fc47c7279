//! Domain types shared by the upload gateway and the ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{GicError, ValidationError};

pub mod event;

pub use event::IngestTrigger;

/// File name every site may upload.
pub const PATIENTS_FILE_NAME: &str = "patients.txt";

/// Suffix appended to the site identifier to form the site-specific file name.
pub const SITE_FILE_SUFFIX: &str = "_mrns.txt";

/// Site identifier used when none is configured.
pub const DEFAULT_SITE_ID: &str = "gic";

/// Prefix applied to an output id to build its mapped id.
pub const MAPPED_ID_PREFIX: &str = "mrn-";

/// Header row of every ingestion output.
pub const OUTPUT_HEADER: &str = "GIC_ID,MRN";

// ============================================================================
// Upload Validation Types
// ============================================================================

/// Ordered, non-empty set of file names an upload may target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNameAllowList {
    names: Vec<String>,
}

impl FileNameAllowList {
    /// Build an allow-list from explicit names.
    ///
    /// Names are trimmed, blanks dropped and duplicates removed while
    /// keeping first-seen order.
    pub fn new<I, S>(names: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !unique.contains(&name) {
                unique.push(name);
            }
        }

        if unique.is_empty() {
            return Err(GicError::Config(
                "file name allow-list cannot be empty".to_string(),
            ));
        }

        Ok(Self { names: unique })
    }

    /// The default list for a site: the patients file and `<site_id>_mrns.txt`.
    pub fn for_site(site_id: &str) -> Self {
        Self {
            names: vec![
                PATIENTS_FILE_NAME.to_string(),
                format!("{}{}", site_id, SITE_FILE_SUFFIX),
            ],
        }
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.names.iter().any(|name| name == file_name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A validated `<scope uuid>/<file name>` object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    scope_id: Uuid,
    file_name: String,
}

impl ObjectKey {
    /// Parse and validate a raw object key.
    ///
    /// # Rules
    /// - Exactly two `/`-separated segments
    /// - Segment 1 parses as a UUID whose canonical form equals it verbatim
    /// - Segment 2 is a member of `allow_list`
    pub fn parse(raw: &str, allow_list: &FileNameAllowList) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidObjectKey {
            allowed: allow_list.names().to_vec(),
        };

        let segments: Vec<&str> = raw.split('/').collect();
        let [scope, file_name] = segments.as_slice() else {
            return Err(invalid());
        };

        let scope_id = Uuid::parse_str(scope).map_err(|_| invalid())?;
        if scope_id.hyphenated().to_string() != *scope {
            return Err(invalid());
        }

        if !allow_list.contains(file_name) {
            return Err(invalid());
        }

        Ok(Self {
            scope_id,
            file_name: (*file_name).to_string(),
        })
    }

    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.scope_id.hyphenated(), self.file_name)
    }
}

/// Immutable upload rules for one deployment.
///
/// Constructed once at startup and shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    permitted_bucket: String,
    allow_list: FileNameAllowList,
}

impl UploadPolicy {
    pub fn new(
        permitted_bucket: impl Into<String>,
        allow_list: FileNameAllowList,
    ) -> crate::Result<Self> {
        let permitted_bucket = permitted_bucket.into();
        if permitted_bucket.trim().is_empty() {
            return Err(GicError::Config(
                "permitted bucket name cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            permitted_bucket,
            allow_list,
        })
    }

    pub fn permitted_bucket(&self) -> &str {
        &self.permitted_bucket
    }

    pub fn allow_list(&self) -> &FileNameAllowList {
        &self.allow_list
    }

    /// Validate a request against this policy.
    ///
    /// Checks run in order: presence, bucket, object key. A wrong bucket is
    /// rejected before the key is looked at.
    pub fn validate(&self, request: &UploadRequest) -> Result<ValidatedUpload, ValidationError> {
        let (Some(bucket), Some(raw_key)) = (
            non_blank(request.bucket_name.as_deref()),
            non_blank(request.object_key.as_deref()),
        ) else {
            return Err(ValidationError::MissingField);
        };

        if bucket != self.permitted_bucket {
            return Err(ValidationError::BucketNotPermitted {
                bucket: bucket.to_string(),
            });
        }

        let key = ObjectKey::parse(raw_key, &self.allow_list)?;

        Ok(ValidatedUpload {
            bucket: bucket.to_string(),
            key,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Incoming upload authorization request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub object_key: Option<String>,
}

impl UploadRequest {
    pub fn new(bucket_name: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            bucket_name: Some(bucket_name.into()),
            object_key: Some(object_key.into()),
        }
    }
}

/// A request that passed policy validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub bucket: String,
    pub key: ObjectKey,
}

/// Time-limited permission to write one object.
///
/// Expiry is enforced by the storage service; nothing here tracks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteGrant {
    pub url: String,
    pub expires_in: Duration,
    pub expires_at: DateTime<Utc>,
}

impl WriteGrant {
    pub fn new(url: impl Into<String>, expires_in: Duration) -> Self {
        let lifetime = chrono::Duration::seconds(expires_in.as_secs() as i64);
        Self {
            url: url.into(),
            expires_in,
            expires_at: Utc::now() + lifetime,
        }
    }
}

// ============================================================================
// Ingestion Types
// ============================================================================

/// Location of an object to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionSource {
    pub bucket: String,
    pub key: String,
}

impl IngestionSource {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for IngestionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// One output row derived from a raw input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedRecord {
    pub output_id: String,
    pub mapped_id: String,
}

impl MappedRecord {
    /// Map a raw line verbatim. The line's shape is not checked.
    pub fn from_raw(line: &str) -> Self {
        Self {
            output_id: line.to_string(),
            mapped_id: format!("{}{}", MAPPED_ID_PREFIX, line),
        }
    }

    pub fn to_csv_line(&self) -> String {
        format!("{},{}", self.output_id, self.mapped_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const BUCKET: &str = "acct-cumulus-gic-connector-dev";
    const SCOPE: &str = "3fb14b7e-0a37-4e11-9c3a-2f0c6d9d4c0a";

    fn policy() -> UploadPolicy {
        UploadPolicy::new(BUCKET, FileNameAllowList::for_site("bch")).unwrap()
    }

    #[test]
    fn test_allow_list_for_site() {
        let list = FileNameAllowList::for_site("bch");
        assert_eq!(list.names(), ["patients.txt", "bch_mrns.txt"]);
    }

    #[test]
    fn test_allow_list_dedupes_and_trims() {
        let list = FileNameAllowList::new([" a.txt", "b.txt", "a.txt", ""]).unwrap();
        assert_eq!(list.names(), ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_allow_list_rejects_empty() {
        assert!(matches!(
            FileNameAllowList::new(Vec::<String>::new()),
            Err(GicError::Config(_))
        ));
    }

    #[test]
    fn test_object_key_valid() {
        let list = FileNameAllowList::for_site("bch");
        let key = ObjectKey::parse(&format!("{}/patients.txt", SCOPE), &list).unwrap();
        assert_eq!(key.scope_id().to_string(), SCOPE);
        assert_eq!(key.file_name(), "patients.txt");
        assert_eq!(key.to_string(), format!("{}/patients.txt", SCOPE));
    }

    #[test]
    fn test_object_key_site_file() {
        let list = FileNameAllowList::for_site("bch");
        assert!(ObjectKey::parse(&format!("{}/bch_mrns.txt", SCOPE), &list).is_ok());
    }

    #[test]
    fn test_object_key_rejects_non_canonical_uuid() {
        let list = FileNameAllowList::for_site("bch");
        let upper = format!("{}/patients.txt", SCOPE.to_uppercase());
        let simple = format!("{}/patients.txt", SCOPE.replace('-', ""));
        let braced = format!("{{{}}}/patients.txt", SCOPE);

        for raw in [upper, simple, braced] {
            assert!(ObjectKey::parse(&raw, &list).is_err(), "accepted {}", raw);
        }
    }

    #[test]
    fn test_object_key_rejects_wrong_segment_count() {
        let list = FileNameAllowList::for_site("bch");
        for raw in [
            "patients.txt".to_string(),
            format!("{}/nested/patients.txt", SCOPE),
            format!("{}/patients.txt/", SCOPE),
            format!("/{}/patients.txt", SCOPE),
        ] {
            assert!(ObjectKey::parse(&raw, &list).is_err(), "accepted {}", raw);
        }
    }

    #[test]
    fn test_object_key_rejects_unknown_file() {
        let list = FileNameAllowList::for_site("bch");
        let err = ObjectKey::parse(&format!("{}/other.txt", SCOPE), &list).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidObjectKey {
                allowed: vec!["patients.txt".to_string(), "bch_mrns.txt".to_string()],
            }
        );
    }

    #[test]
    fn test_object_key_not_a_uuid() {
        let list = FileNameAllowList::for_site("bch");
        let err = ObjectKey::parse("not-a-uuid/patients.txt", &list).unwrap_err();
        assert!(err.to_string().contains("patients.txt"));
    }

    #[test]
    fn test_policy_rejects_blank_bucket() {
        assert!(UploadPolicy::new("  ", FileNameAllowList::for_site("bch")).is_err());
    }

    #[test]
    fn test_policy_validate_success() {
        let request = UploadRequest::new(BUCKET, format!("{}/patients.txt", SCOPE));
        let upload = policy().validate(&request).unwrap();
        assert_eq!(upload.bucket, BUCKET);
        assert_eq!(upload.key.file_name(), "patients.txt");
    }

    #[test]
    fn test_policy_validate_missing_fields() {
        let missing_key = UploadRequest {
            bucket_name: Some(BUCKET.to_string()),
            object_key: None,
        };
        let blank_bucket = UploadRequest {
            bucket_name: Some("".to_string()),
            object_key: Some(format!("{}/patients.txt", SCOPE)),
        };

        assert_eq!(policy().validate(&missing_key), Err(ValidationError::MissingField));
        assert_eq!(policy().validate(&blank_bucket), Err(ValidationError::MissingField));
        assert_eq!(
            policy().validate(&UploadRequest::default()),
            Err(ValidationError::MissingField)
        );
    }

    #[test]
    fn test_policy_wrong_bucket_wins_over_bad_key() {
        let request = UploadRequest::new("other-bucket", "not-a-uuid/whatever");
        assert_eq!(
            policy().validate(&request),
            Err(ValidationError::BucketNotPermitted {
                bucket: "other-bucket".to_string()
            })
        );
    }

    #[test]
    fn test_write_grant_expiry() {
        let before = Utc::now();
        let grant = WriteGrant::new("https://example.com/put", Duration::from_secs(3600));
        assert_eq!(grant.expires_in, Duration::from_secs(3600));
        assert!(grant.expires_at >= before + chrono::Duration::seconds(3600));
    }

    #[test]
    fn test_mapped_record() {
        let record = MappedRecord::from_raw("12345");
        assert_eq!(record.output_id, "12345");
        assert_eq!(record.mapped_id, "mrn-12345");
        assert_eq!(record.to_csv_line(), "12345,mrn-12345");
    }

    #[test]
    fn test_mapped_record_keeps_malformed_line() {
        let record = MappedRecord::from_raw("a,b, c");
        assert_eq!(record.to_csv_line(), "a,b, c,mrn-a,b, c");
    }

    #[test]
    fn test_ingestion_source_display() {
        let source = IngestionSource::new("bucket", "scope/patients.txt");
        assert_eq!(source.to_string(), "s3://bucket/scope/patients.txt");
    }
}
