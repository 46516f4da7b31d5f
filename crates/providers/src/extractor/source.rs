use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::default::DEFAULT_UA;

/// Spoofed request identity for one upstream. Every provider requires its
/// own `User-Agent`/`Referer`/`Origin` combination; these come from server
/// configuration, never from shared constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderBundle {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub origin: Option<String>,
}

impl Default for HeaderBundle {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_UA.to_string()),
            referer: None,
            origin: None,
        }
    }
}

impl HeaderBundle {
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let mut put = |name: HeaderName, value: &Option<String>| {
            if let Some(v) = value
                && let Ok(v) = HeaderValue::from_str(v)
            {
                headers.insert(name, v);
            }
        };
        put(reqwest::header::USER_AGENT, &self.user_agent);
        put(reqwest::header::REFERER, &self.referer);
        put(reqwest::header::ORIGIN, &self.origin);
        headers
    }
}

/// Base extractor shared by all provider resolvers: an HTTP client plus the
/// provider-specific header bundle and query parameters attached to every
/// outbound request.
#[derive(Debug, Clone)]
pub struct Extractor {
    pub provider_name: String,
    pub client: Client,
    headers: HeaderMap,
    pub params: FxHashMap<String, String>,
}

impl Extractor {
    pub fn new<S: Into<String>>(provider_name: S, client: Client, bundle: &HeaderBundle) -> Self {
        let mut headers = bundle.to_header_map();
        headers
            .entry(reqwest::header::ACCEPT)
            .or_insert_with(|| HeaderValue::from_static("*/*"));

        Self {
            provider_name: provider_name.into(),
            client,
            headers,
            params: FxHashMap::default(),
        }
    }

    pub fn add_header<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_str(&key.into()),
            HeaderValue::from_str(&value.into()),
        ) {
            self.headers.insert(name, value);
        }
    }

    pub fn add_param<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.params.insert(key.into(), value.into());
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .headers(self.headers.clone())
            .query(&self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bundle_builds_header_map() {
        let bundle = HeaderBundle {
            user_agent: Some("agent/1.0".to_string()),
            referer: Some("https://player.example/".to_string()),
            origin: Some("https://player.example".to_string()),
        };
        let map = bundle.to_header_map();
        assert_eq!(map.get(reqwest::header::USER_AGENT).unwrap(), "agent/1.0");
        assert_eq!(
            map.get(reqwest::header::REFERER).unwrap(),
            "https://player.example/"
        );
        assert_eq!(
            map.get(reqwest::header::ORIGIN).unwrap(),
            "https://player.example"
        );
    }

    #[test]
    fn default_bundle_has_user_agent_only() {
        let map = HeaderBundle::default().to_header_map();
        assert!(map.contains_key(reqwest::header::USER_AGENT));
        assert!(!map.contains_key(reqwest::header::REFERER));
    }
}
