//! Response envelope: the sole wire shape leaving the system.
//!
//! ```json
//! { "success": true,  "data": ..., "meta": {...} }
//! { "success": false, "errors": [{ "code": 404, "message": "Not Found" }], "meta": {...} }
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Meta = Map<String, Value>;

/// One client-visible error entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), meta: None }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Success or failure, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Ok { data: Value, meta: Option<Meta> },
    Err { errors: Vec<ApiError>, meta: Option<Meta> },
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        ApiResponse::Ok { data, meta: None }
    }

    pub fn err(errors: Vec<ApiError>) -> Self {
        ApiResponse::Err { errors, meta: None }
    }

    pub fn with_meta(self, meta: Meta) -> Self {
        match self {
            ApiResponse::Ok { data, .. } => ApiResponse::Ok { data, meta: Some(meta) },
            ApiResponse::Err { errors, .. } => ApiResponse::Err { errors, meta: Some(meta) },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Ok { .. })
    }

    /// Serialize to bytes. Falls back to a static failure body if a payload
    /// cannot be rendered (only possible with non-string map keys upstream).
    pub fn to_vec(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| {
            br#"{"success":false,"errors":[{"code":500,"message":"Internal Server Error"}]}"#
                .to_vec()
        })
    }
}

impl Serialize for ApiResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (meta, len) = match self {
            ApiResponse::Ok { meta, .. } | ApiResponse::Err { meta, .. } => {
                (meta, if meta.is_some() { 3 } else { 2 })
            }
        };
        let mut map = serializer.serialize_map(Some(len))?;
        match self {
            ApiResponse::Ok { data, .. } => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
            }
            ApiResponse::Err { errors, .. } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("errors", errors)?;
            }
        }
        if let Some(meta) = meta {
            map.serialize_entry("meta", meta)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn ok_shape() {
        let v = serde_json::to_value(ApiResponse::ok(json!({"id": 1}))).unwrap();
        assert_eq!(v, json!({"success": true, "data": {"id": 1}}));
    }

    #[test]
    fn err_shape_with_meta() {
        let mut meta = Meta::new();
        meta.insert("requestId".into(), json!("r-1"));
        let resp = ApiResponse::err(vec![ApiError::new(404, "Not Found")]).with_meta(meta);
        let v: Value = serde_json::from_slice(&resp.to_vec()).unwrap();
        assert_eq!(
            v,
            json!({
                "success": false,
                "errors": [{"code": 404, "message": "Not Found"}],
                "meta": {"requestId": "r-1"}
            })
        );
        assert!(!resp.is_success());
    }
}
