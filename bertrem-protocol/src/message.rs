//! Request descriptors, request options and reply classification.

use crate::error::InvalidOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// BERT-RPC request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Expects exactly one reply.
    Call,
    /// Fire-and-forget; the server acknowledges with `noreply`.
    Cast,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Call => write!(f, "call"),
            RequestKind::Cast => write!(f, "cast"),
        }
    }
}

/// Cache directive sent ahead of a request as `{info, cache, [validation, Token]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOption {
    Validation(String),
}

/// Validated request options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheOption>,
}

impl RequestOptions {
    /// Options carrying a cache validation token.
    pub fn cache_validation(token: impl Into<String>) -> Self {
        Self {
            cache: Some(CacheOption::Validation(token.into())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_none()
    }
}

/// Checks the shape of caller-supplied options.
///
/// Accepted shapes are no options at all, an empty map, or a map whose
/// `cache` entry is the pair `["validation", <string>]`. A `null` cache
/// counts as missing. Keys other than `cache` are ignored once `cache` is
/// present.
pub fn verify_options(options: Option<&Value>) -> Result<RequestOptions, InvalidOption> {
    let map = match options {
        None | Some(Value::Null) => return Ok(RequestOptions::default()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(InvalidOption::UNKNOWN_KEY),
    };

    if map.is_empty() {
        return Ok(RequestOptions::default());
    }

    let cache = match map.get("cache") {
        None | Some(Value::Null) => return Err(InvalidOption::UNKNOWN_KEY),
        Some(cache) => cache,
    };
    match cache.as_array().map(Vec::as_slice) {
        Some([Value::String(tag), Value::String(token)]) if tag == "validation" => {
            Ok(RequestOptions::cache_validation(token.clone()))
        }
        _ => Err(InvalidOption::BAD_CACHE_ARGS),
    }
}

/// A validated, kind-tagged request awaiting its target.
///
/// Building one never touches a connection; name the remote module and
/// function with [`RequestBuilder::invoke`] to obtain the wire [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBuilder {
    kind: RequestKind,
    options: RequestOptions,
}

impl RequestBuilder {
    /// Validates `options` and builds a call.
    pub fn call(options: Option<&Value>) -> Result<Self, InvalidOption> {
        Ok(Self::with_options(RequestKind::Call, verify_options(options)?))
    }

    /// Validates `options` and builds a cast.
    pub fn cast(options: Option<&Value>) -> Result<Self, InvalidOption> {
        Ok(Self::with_options(RequestKind::Cast, verify_options(options)?))
    }

    /// Builds a request from options that are valid by construction.
    pub fn with_options(kind: RequestKind, options: RequestOptions) -> Self {
        Self { kind, options }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Targets `module:function(args)`.
    pub fn invoke(
        self,
        module: impl Into<String>,
        function: impl Into<String>,
        args: Vec<Value>,
    ) -> Request {
        Request {
            kind: self.kind,
            module: module.into(),
            function: function.into(),
            args,
            options: self.options,
        }
    }
}

/// A request ready for encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,
    pub module: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "RequestOptions::is_empty")]
    pub options: RequestOptions,
}

/// Origin of an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    Protocol,
    Server,
    User,
    Proxy,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Protocol => write!(f, "protocol"),
            FaultKind::Server => write!(f, "server"),
            FaultKind::User => write!(f, "user"),
            FaultKind::Proxy => write!(f, "proxy"),
        }
    }
}

/// Error details carried by an `error` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFault {
    pub kind: FaultKind,
    pub code: i64,
    pub class: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backtrace: Vec<String>,
}

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    /// `{reply, Result}` answering a call.
    Reply(Value),
    /// `{noreply}` acknowledging a cast.
    NoReply,
    /// `{error, {Type, Code, Class, Detail, Backtrace}}`.
    Error(ServerFault),
}

impl Reply {
    /// Collapses the reply into the value a caller receives.
    pub fn into_result(self) -> Result<Value, ServerFault> {
        match self {
            Reply::Reply(value) => Ok(value),
            Reply::NoReply => Ok(Value::Null),
            Reply::Error(fault) => Err(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verify_options_table() {
        assert_eq!(verify_options(None).unwrap(), RequestOptions::default());
        assert_eq!(
            verify_options(Some(&json!({}))).unwrap(),
            RequestOptions::default()
        );
        assert_eq!(
            verify_options(Some(&json!({"cache": ["validation", "x"]}))).unwrap(),
            RequestOptions::cache_validation("x")
        );
        assert_eq!(
            verify_options(Some(&json!({"other": 1}))),
            Err(InvalidOption::UNKNOWN_KEY)
        );
        assert_eq!(
            verify_options(Some(&json!({"cache": ["wrong_tag", "x"]}))),
            Err(InvalidOption::BAD_CACHE_ARGS)
        );
        assert_eq!(
            verify_options(Some(&json!({"cache": ["validation", 123]}))),
            Err(InvalidOption::BAD_CACHE_ARGS)
        );
    }

    #[test]
    fn test_verify_options_odd_shapes() {
        assert_eq!(
            verify_options(Some(&Value::Null)).unwrap(),
            RequestOptions::default()
        );
        assert_eq!(
            verify_options(Some(&json!("cache"))),
            Err(InvalidOption::UNKNOWN_KEY)
        );
        assert_eq!(
            verify_options(Some(&json!({"cache": null}))),
            Err(InvalidOption::UNKNOWN_KEY)
        );
        assert_eq!(
            verify_options(Some(&json!({"cache": "validation"}))),
            Err(InvalidOption::BAD_CACHE_ARGS)
        );
        assert_eq!(
            verify_options(Some(&json!({"cache": ["validation"]}))),
            Err(InvalidOption::BAD_CACHE_ARGS)
        );
        // Extra keys next to a valid cache entry are ignored
        assert_eq!(
            verify_options(Some(&json!({"cache": ["validation", "t"], "other": 1}))).unwrap(),
            RequestOptions::cache_validation("t")
        );
    }

    #[test]
    fn test_builder_kinds() {
        let call = RequestBuilder::call(None).unwrap();
        assert_eq!(call.kind(), RequestKind::Call);
        assert!(call.options().is_empty());

        let cast = RequestBuilder::cast(Some(&json!({"cache": ["validation", "etag"]}))).unwrap();
        assert_eq!(cast.kind(), RequestKind::Cast);
        assert_eq!(cast.options(), &RequestOptions::cache_validation("etag"));

        assert!(RequestBuilder::call(Some(&json!({"timeout": 5}))).is_err());
    }

    #[test]
    fn test_invoke_builds_request() {
        let request = RequestBuilder::call(None)
            .unwrap()
            .invoke("calc", "add", vec![json!(1), json!(2)]);

        assert_eq!(request.kind, RequestKind::Call);
        assert_eq!(request.module, "calc");
        assert_eq!(request.function, "add");
        assert_eq!(request.args, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_request_serialization_skips_empty_options() {
        let request = RequestBuilder::cast(None)
            .unwrap()
            .invoke("log", "write", vec![json!("hi")]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["kind"], "cast");
        assert!(value.get("options").is_none());

        let request = RequestBuilder::with_options(
            RequestKind::Call,
            RequestOptions::cache_validation("v1"),
        )
        .invoke("docs", "get", vec![]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["options"]["cache"]["validation"], "v1");
    }

    #[test]
    fn test_reply_into_result() {
        assert_eq!(Reply::Reply(json!(3)).into_result().unwrap(), json!(3));
        assert_eq!(Reply::NoReply.into_result().unwrap(), Value::Null);

        let fault = ServerFault {
            kind: FaultKind::User,
            code: 0,
            class: "RuntimeError".to_string(),
            detail: "boom".to_string(),
            backtrace: vec![],
        };
        assert_eq!(Reply::Error(fault.clone()).into_result(), Err(fault));
    }

    #[test]
    fn test_reply_serialization() {
        let json = serde_json::to_string(&Reply::NoReply).unwrap();
        assert_eq!(json, "\"noreply\"");

        let parsed: Reply = serde_json::from_str(r#"{"reply":[1,2]}"#).unwrap();
        assert_eq!(parsed, Reply::Reply(json!([1, 2])));

        let parsed: Reply = serde_json::from_str(
            r#"{"error":{"kind":"server","code":2,"class":"NoSuchModule","detail":"calc"}}"#,
        )
        .unwrap();
        match parsed {
            Reply::Error(fault) => {
                assert_eq!(fault.kind, FaultKind::Server);
                assert_eq!(fault.code, 2);
                assert!(fault.backtrace.is_empty());
            }
            other => panic!("expected error reply, got {:?}", other),
        }
    }
}
