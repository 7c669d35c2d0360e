use std::{fmt, time::Duration};

use url::Url;
use urlencoding::encode;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed description of a request target, before it is resolved into a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            method: HttpMethod::Get,
            query: Vec::new(),
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Append one query pair. Repeated names are kept as separate pairs.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Resolve `base_url + path + query` into an absolute URL.
    ///
    /// Names and values are percent-encoded with only unreserved characters
    /// left as-is, so a space becomes `%20`.
    ///
    /// Returns `None` when the concatenation is not an absolute, hierarchical
    /// address (an empty base, a relative path, `mailto:` and the like).
    pub fn url(&self) -> Option<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, self.path)).ok()?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return None;
        }

        if !self.query.is_empty() {
            let query = self
                .query
                .iter()
                .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }

        Some(url)
    }

    /// Build a request descriptor with no extra headers or timeout override.
    pub fn descriptor(&self) -> Option<RequestDescriptor> {
        Some(RequestDescriptor {
            url: self.url()?,
            method: self.method,
            headers: Vec::new(),
            timeout: None,
        })
    }
}

/// Fully resolved request handed to a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: Url,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_url_with_encoded_query() {
        let url = Endpoint::new("https://api.weatherapi.com/v1", "/current.json")
            .query("q", "São Paulo")
            .query("aqi", "no")
            .url()
            .expect("url");

        assert_eq!(
            url.as_str(),
            "https://api.weatherapi.com/v1/current.json?q=S%C3%A3o%20Paulo&aqi=no"
        );
    }

    #[test]
    fn duplicate_query_names_are_kept_in_order() {
        let url = Endpoint::new("https://example.com", "/search")
            .query("tag", "a")
            .query("tag", "b&c")
            .url()
            .expect("url");

        assert_eq!(url.query(), Some("tag=a&tag=b%26c"));
    }

    #[test]
    fn reserved_characters_in_values_are_escaped() {
        let url = Endpoint::new("https://example.com", "/search")
            .query("q", "a+b=c d/e?")
            .query("key", "x~y_z.1-2")
            .url()
            .expect("url");

        assert_eq!(url.query(), Some("q=a%2Bb%3Dc%20d%2Fe%3F&key=x~y_z.1-2"));
    }

    #[test]
    fn no_query_means_no_question_mark() {
        let url = Endpoint::new("https://example.com", "/ping").url().expect("url");
        assert_eq!(url.as_str(), "https://example.com/ping");
    }

    #[test]
    fn empty_or_relative_base_is_rejected() {
        assert!(Endpoint::new("", "/forecast").url().is_none());
        assert!(Endpoint::new("api.open-meteo.com", "/forecast").url().is_none());
        assert!(Endpoint::new("mailto:", "someone@example.com").url().is_none());
    }

    #[test]
    fn method_defaults_to_get() {
        let endpoint = Endpoint::new("https://example.com", "/");
        assert_eq!(endpoint.method, HttpMethod::Get);

        let descriptor = endpoint.method(HttpMethod::Post).descriptor().expect("descriptor");
        assert_eq!(descriptor.method.as_str(), "POST");
        assert!(descriptor.headers.is_empty());
        assert!(descriptor.timeout.is_none());
    }
}
