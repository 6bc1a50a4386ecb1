// HTTP request and response types

use crate::error::HttpError;
use crate::status::HttpStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP request wrapper
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    /// The path as received, including any query string.
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
        }
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::Error> {
        serde_json::from_slice(&self.body)
            .map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// The originally requested URL, query string included.
    pub fn original_url(&self) -> &str {
        &self.path
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(HttpStatus::Ok.code())
    }

    pub fn created() -> Self {
        Self::new(HttpStatus::Created.code())
    }

    pub fn no_content() -> Self {
        Self::new(HttpStatus::NoContent.code())
    }

    pub fn not_found() -> Self {
        Self::new(HttpStatus::NotFound.code())
    }

    pub fn internal_server_error() -> Self {
        Self::new(HttpStatus::InternalServerError.code())
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body = serde_json::to_vec(value)
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// A 200 response with the supplied data serialized as JSON.
    pub fn success<T: Serialize>(data: &T) -> Self {
        Self::ok()
            .with_json(data)
            .unwrap_or_else(|_| Self::internal_server_error())
    }

    /// An error response carrying the serialized error payload.
    ///
    /// Status comes from the error itself, falling back to 500 when unset.
    pub fn error(err: &HttpError) -> Self {
        let status = if err.status == 0 { 500 } else { err.status };
        Self::new(status)
            .with_json(&err.to_json(true))
            .unwrap_or_else(|_| Self::new(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_success_response() {
        let response = HttpResponse::success(&json!({"test": "ok"}));
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["test"], "ok");
        assert_eq!(
            response.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
    }

    #[test]
    fn test_error_response() {
        let err = HttpError::new("broken", 403, json!({"reason": "denied"}));
        let response = HttpResponse::error(&err);
        assert_eq!(response.status, 403);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert!(body["message"].as_str().unwrap().contains("broken"));
        assert_eq!(body["details"]["reason"], "denied");
        assert!(body["stackId"].as_str().is_some());
    }

    #[test]
    fn test_request_json_body() {
        let mut req = HttpRequest::new("POST", "/users");
        req.body = br#"{"name":"jane"}"#.to_vec();
        let parsed: Value = req.json().unwrap();
        assert_eq!(parsed["name"], "jane");
    }

    #[test]
    fn test_request_json_invalid() {
        let mut req = HttpRequest::new("POST", "/users");
        req.body = b"not json".to_vec();
        let parsed: Result<Value, _> = req.json();
        assert!(parsed.is_err());
    }

    #[test]
    fn test_original_url_keeps_query() {
        let req = HttpRequest::new("GET", "/users?page=2");
        assert_eq!(req.original_url(), "/users?page=2");
    }
}
