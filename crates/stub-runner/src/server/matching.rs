//! Request matching for loaded mappings.
//!
//! Patterns are compiled once when a stub server starts, so a malformed regex fails
//! the start instead of every request.

use super::types::{StubMapping, ValuePattern};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;

/// Request attributes mappings are matched against
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names lower-cased
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
}

impl IncomingRequest {
    fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }
}

/// Compiled value matcher
#[derive(Debug, Clone)]
enum CompiledValuePattern {
    EqualTo(String),
    Contains(String),
    Matches(Regex),
    Absent(bool),
}

impl CompiledValuePattern {
    fn compile(pattern: &ValuePattern) -> Result<Self, String> {
        if let Some(v) = &pattern.equal_to {
            return Ok(Self::EqualTo(v.clone()));
        }
        if let Some(v) = &pattern.contains {
            return Ok(Self::Contains(v.clone()));
        }
        if let Some(v) = &pattern.matches {
            return anchored(v).map(Self::Matches);
        }
        if let Some(absent) = pattern.absent {
            return Ok(Self::Absent(absent));
        }
        Err("value pattern needs one of equalTo, contains, matches, absent".to_string())
    }

    fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Absent(absent), v) => *absent == v.is_none(),
            (_, None) => false,
            (Self::EqualTo(expected), Some(v)) => v == expected,
            (Self::Contains(expected), Some(v)) => v.contains(expected.as_str()),
            (Self::Matches(regex), Some(v)) => regex.is_match(v),
        }
    }
}

/// A mapping ready to be matched, with the directory its body files live in
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    pub mapping: StubMapping,
    pub files_root: PathBuf,
    method: Option<String>,
    url_pattern: Option<Regex>,
    url_path_pattern: Option<Regex>,
    headers: Vec<(String, CompiledValuePattern)>,
    query_params: Vec<(String, CompiledValuePattern)>,
}

impl CompiledMapping {
    pub fn compile(mapping: StubMapping, files_root: PathBuf) -> Result<Self, String> {
        let request = &mapping.request;
        let method = request
            .method
            .as_ref()
            .filter(|m| !m.eq_ignore_ascii_case("ANY"))
            .map(|m| m.to_ascii_uppercase());
        let url_pattern = request.url_pattern.as_deref().map(anchored).transpose()?;
        let url_path_pattern = request
            .url_path_pattern
            .as_deref()
            .map(anchored)
            .transpose()?;
        let headers = request
            .headers
            .iter()
            .map(|(name, p)| Ok((name.to_ascii_lowercase(), CompiledValuePattern::compile(p)?)))
            .collect::<Result<Vec<_>, String>>()?;
        let query_params = request
            .query_parameters
            .iter()
            .map(|(name, p)| Ok((name.clone(), CompiledValuePattern::compile(p)?)))
            .collect::<Result<Vec<_>, String>>()?;

        Ok(Self {
            mapping,
            files_root,
            method,
            url_pattern,
            url_path_pattern,
            headers,
            query_params,
        })
    }

    pub fn matches(&self, request: &IncomingRequest) -> bool {
        if let Some(method) = &self.method {
            if !method.eq_ignore_ascii_case(&request.method) {
                return false;
            }
        }

        let pattern = &self.mapping.request;
        if let Some(url) = &pattern.url {
            if *url != request.path_and_query() {
                return false;
            }
        }
        if let Some(url_path) = &pattern.url_path {
            if *url_path != request.path {
                return false;
            }
        }
        if let Some(regex) = &self.url_pattern {
            if !regex.is_match(&request.path_and_query()) {
                return false;
            }
        }
        if let Some(regex) = &self.url_path_pattern {
            if !regex.is_match(&request.path) {
                return false;
            }
        }

        self.headers
            .iter()
            .all(|(name, p)| p.matches(request.headers.get(name).map(String::as_str)))
            && self
                .query_params
                .iter()
                .all(|(name, p)| p.matches(request.query_params.get(name).map(String::as_str)))
    }
}

fn anchored(pattern: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}

/// Parse a query string into decoded key/value pairs
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decoded_key = urlencoding::decode(key).ok()?.into_owned();
            let decoded_value = urlencoding::decode(value).ok()?.into_owned();
            Some((decoded_key, decoded_value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::types::RequestPattern;

    fn mapping(request: RequestPattern) -> CompiledMapping {
        CompiledMapping::compile(
            StubMapping {
                id: None,
                name: None,
                priority: None,
                request,
                response: Default::default(),
            },
            PathBuf::from("__files"),
        )
        .unwrap()
    }

    fn get(path: &str, query: Option<&str>) -> IncomingRequest {
        IncomingRequest {
            method: "GET".to_string(),
            path: path.to_string(),
            query: query.map(str::to_string),
            headers: HashMap::new(),
            query_params: query.map(parse_query_string).unwrap_or_default(),
        }
    }

    #[test]
    fn test_url_matches_path_and_query_exactly() {
        let m = mapping(RequestPattern {
            method: Some("GET".to_string()),
            url: Some("/name".to_string()),
            ..Default::default()
        });
        assert!(m.matches(&get("/name", None)));
        assert!(!m.matches(&get("/name", Some("x=1"))));
        assert!(!m.matches(&get("/other", None)));

        let mut post = get("/name", None);
        post.method = "POST".to_string();
        assert!(!m.matches(&post));
    }

    #[test]
    fn test_any_method_and_url_path() {
        let m = mapping(RequestPattern {
            method: Some("ANY".to_string()),
            url_path: Some("/api/loans".to_string()),
            ..Default::default()
        });
        let mut put = get("/api/loans", Some("page=2"));
        put.method = "PUT".to_string();
        assert!(m.matches(&put));
    }

    #[test]
    fn test_patterns_are_anchored() {
        let m = mapping(RequestPattern {
            url_path_pattern: Some("/fraud/[0-9]+".to_string()),
            ..Default::default()
        });
        assert!(m.matches(&get("/fraud/42", None)));
        assert!(!m.matches(&get("/fraud/42/details", None)));
    }

    #[test]
    fn test_header_and_query_matchers() {
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            ValuePattern {
                contains: Some("json".to_string()),
                ..Default::default()
            },
        );
        let mut query_parameters = HashMap::new();
        query_parameters.insert(
            "client".to_string(),
            ValuePattern {
                equal_to: Some("a b".to_string()),
                ..Default::default()
            },
        );
        let m = mapping(RequestPattern {
            url_path: Some("/check".to_string()),
            headers,
            query_parameters,
            ..Default::default()
        });

        let mut request = get("/check", Some("client=a%20b"));
        assert!(!m.matches(&request), "header missing");
        request
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        assert!(m.matches(&request));
    }

    #[test]
    fn test_invalid_regex_fails_compile() {
        let result = CompiledMapping::compile(
            StubMapping {
                id: None,
                name: None,
                priority: None,
                request: RequestPattern {
                    url_pattern: Some("/(unclosed".to_string()),
                    ..Default::default()
                },
                response: Default::default(),
            },
            PathBuf::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string("a=1&b=hello%2Cworld&flag");
        assert_eq!(params.get("a").map(String::as_str), Some("1"));
        assert_eq!(params.get("b").map(String::as_str), Some("hello,world"));
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
    }
}
