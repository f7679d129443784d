//! Wire schemas of the external contracts.
//!
//! Every type here is strict: missing fields, unknown enum values and
//! malformed timestamps fail deserialization, and callers treat that as the
//! peer being unavailable. Unknown extra fields are ignored.

/// Storage node API, version 1.
pub mod v1 {
    use artstore_core::{ElementStatus, FileStatus, RetentionPolicy, StorageMode};
    use serde::{Deserialize, Serialize};
    use time::OffsetDateTime;
    use uuid::Uuid;

    /// `GET /api/v1/info`
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NodeInfo {
        /// The id the node reports for itself.
        pub element_id: String,
        pub mode: StorageMode,
        pub status: ElementStatus,
        pub capacity_bytes: u64,
        pub used_bytes: u64,
    }

    /// One entry of `GET /api/v1/files`.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RemoteFile {
        pub file_id: Uuid,
        pub checksum: Option<String>,
        pub size_bytes: u64,
        pub status: FileStatus,
        #[serde(default)]
        pub filename: Option<String>,
        #[serde(default)]
        pub retention_policy: Option<RetentionPolicy>,
        #[serde(default, with = "time::serde::rfc3339::option")]
        pub expires_at: Option<OffsetDateTime>,
    }

    /// `GET /api/v1/files?offset=&limit=`
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FileListingPage {
        pub files: Vec<RemoteFile>,
        pub has_more: bool,
    }
}

/// Keycloak admin API representations (the subset used here).
pub mod keycloak {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        pub expires_in: u64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ClientRepresentation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<String>,
        pub client_id: String,
        pub enabled: bool,
        #[serde(default)]
        pub service_accounts_enabled: bool,
        #[serde(default)]
        pub public_client: bool,
        #[serde(default)]
        pub default_client_scopes: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct UserRepresentation {
        pub id: String,
        pub username: String,
        #[serde(default = "default_enabled")]
        pub enabled: bool,
    }

    fn default_enabled() -> bool {
        true
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct GroupRepresentation {
        pub name: String,
        #[serde(default)]
        pub path: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct CredentialRepresentation {
        pub value: String,
    }
}

#[cfg(test)]
mod tests {
    use super::v1::*;
    use artstore_core::FileStatus;

    #[test]
    fn unknown_status_fails_closed() {
        let json = r#"{"element_id":"se-1","mode":"edit","status":"exploding","capacity_bytes":1,"used_bytes":0}"#;
        assert!(serde_json::from_str::<NodeInfo>(json).is_err());
    }

    #[test]
    fn missing_field_fails_closed() {
        let json = r#"{"element_id":"se-1","mode":"edit","status":"online","capacity_bytes":1}"#;
        assert!(serde_json::from_str::<NodeInfo>(json).is_err());
    }

    #[test]
    fn listing_optional_fields_default() {
        let json = r#"{"files":[{"file_id":"6f1c2a8e-3b44-4a55-9c1e-0d2f4b6a8c10","checksum":"c1","size_bytes":5,"status":"active"}],"has_more":false}"#;
        let page: FileListingPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.files.len(), 1);
        assert_eq!(page.files[0].status, FileStatus::Active);
        assert!(page.files[0].expires_at.is_none());
        assert!(page.files[0].retention_policy.is_none());
    }

    #[test]
    fn listing_expiry_parses_rfc3339() {
        let json = r#"{"file_id":"6f1c2a8e-3b44-4a55-9c1e-0d2f4b6a8c10","checksum":null,"size_bytes":5,"status":"active","retention_policy":"temporary","expires_at":"2026-01-01T00:00:00Z"}"#;
        let file: RemoteFile = serde_json::from_str(json).unwrap();
        assert!(file.expires_at.is_some());
        assert!(file.checksum.is_none());
    }
}
