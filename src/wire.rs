//! Wire protocol: the response envelope and endpoint path constants.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// `{status, code?, message?, data?}` — every API response is shaped like
/// this regardless of endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ApiResponse<T = Value> {
    pub status: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// `status == false` and the server-reported `code` matches one of the
    /// "not found" codes rename/move/trash treat as idempotent success.
    pub fn is_idempotent_not_found(&self) -> bool {
        !self.status && crate::error::CoreError::is_not_found_idempotent(self.code.as_deref())
    }

    /// `status == false` and message/code indicate the server rejected the
    /// bearer token.
    pub fn is_session_invalidated(&self) -> bool {
        if self.code.as_deref() == Some("api_key_not_found") {
            return true;
        }
        self.message
            .as_deref()
            .map(|m| {
                let lower = m.to_lowercase();
                lower.contains("api key not found") || lower.contains("invalid api key")
            })
            .unwrap_or(false)
    }

    /// Internal-error responses are retried by the transport loop rather
    /// than surfaced.
    pub fn is_internal_error(&self) -> bool {
        self.code.as_deref() == Some("internal_error")
    }
}

impl ApiResponse<Value> {
    /// Re-parse `data` into a concrete type once the caller knows the shape.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.data.clone().map(|v| serde_json::from_value(v))
    }
}

pub mod endpoints {
    pub const AUTH_INFO: &str = "/v3/auth/info";
    pub const LOGIN: &str = "/v3/login";
    pub const USER_INFO: &str = "/v3/user/info";
    pub const USER_BASE_FOLDER: &str = "/v3/user/baseFolder";
    pub const DIR_CONTENT: &str = "/v3/dir/content";
    pub const DIR_PRESENT: &str = "/v3/dir/present";
    pub const FILE_PRESENT: &str = "/v3/file/present";
    pub const DIR_TREE: &str = "/v3/dir/tree";
    pub const DIR_CREATE: &str = "/v3/dir/create";
    pub const FILE_EXISTS: &str = "/v3/file/exists";
    pub const DIR_EXISTS: &str = "/v3/dir/exists";
    pub const DIR_SHARED: &str = "/v3/dir/shared";
    pub const DIR_LINKED: &str = "/v3/dir/linked";
    pub const DIR_LINK_ADD: &str = "/v3/dir/link/add";
    pub const ITEM_SHARE: &str = "/v3/item/share";
    pub const ITEM_SHARED: &str = "/v3/item/shared";
    pub const ITEM_LINKED: &str = "/v3/item/linked";
    pub const ITEM_LINKED_RENAME: &str = "/v3/item/linked/rename";
    pub const ITEM_SHARED_RENAME: &str = "/v3/item/shared/rename";
    pub const DIR_DOWNLOAD: &str = "/v3/dir/download";
    pub const UPLOAD: &str = "/v3/upload";
    pub const UPLOAD_DONE: &str = "/v3/upload/done";
    pub const DIR_TRASH: &str = "/v3/dir/trash";
    pub const FILE_TRASH: &str = "/v3/file/trash";
    pub const FILE_MOVE: &str = "/v3/file/move";
    pub const DIR_MOVE: &str = "/v3/dir/move";
    pub const FILE_RENAME: &str = "/v3/file/rename";
    pub const DIR_RENAME: &str = "/v3/dir/rename";
    pub const FILE_LINK_STATUS: &str = "/v3/file/link/status";
    pub const DIR_LINK_STATUS: &str = "/v3/dir/link/status";
    pub const FILE_LINK_EDIT: &str = "/v3/file/link/edit";
    pub const DIR_LINK_REMOVE: &str = "/v3/dir/link/remove";
    pub const FILE: &str = "/v3/file";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_session_invalidation_by_message_case_insensitively() {
        let resp: ApiResponse<Value> = ApiResponse {
            status: false,
            code: None,
            message: Some("Invalid API Key".into()),
            data: None,
        };
        assert!(resp.is_session_invalidated());
    }

    #[test]
    fn detects_session_invalidation_by_code() {
        let resp: ApiResponse<Value> = ApiResponse {
            status: false,
            code: Some("api_key_not_found".into()),
            message: None,
            data: None,
        };
        assert!(resp.is_session_invalidated());
    }

    #[test]
    fn ordinary_error_is_not_session_invalidation() {
        let resp: ApiResponse<Value> = ApiResponse {
            status: false,
            code: Some("storage_full".into()),
            message: Some("not enough storage".into()),
            data: None,
        };
        assert!(!resp.is_session_invalidated());
    }

    #[test]
    fn idempotent_not_found_codes_are_recognized() {
        let resp: ApiResponse<Value> = ApiResponse {
            status: false,
            code: Some("file_not_found".into()),
            message: None,
            data: None,
        };
        assert!(resp.is_idempotent_not_found());
    }
}
