//! Declarative request descriptor.
//!
//! A [`Request`] says *what* to call (collection, key, navigation, query
//! clauses, header flags) and never *how*. It deserializes from the same
//! camelCase JSON shape callers already use, e.g.
//!
//! ```json
//! { "collection": "accounts", "key": "{00000000-0000-0000-0000-000000000001}",
//!   "select": ["name"], "expand": [{ "property": "primarycontactid", "select": ["fullname"] }] }
//! ```

use secrecy::SecretString;
use serde::Deserialize;

/// Request descriptor.
///
/// Expand entries are descriptors too; only `property` and the query clause
/// fields are meaningful inside them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)] // mirrors the flag-style wire shape
pub struct Request {
    // Addressing
    pub collection: Option<String>,
    pub id: Option<String>,
    pub key: Option<String>,
    pub content_id: Option<String>,
    pub navigation_property: Option<String>,
    pub navigation_property_key: Option<String>,
    pub metadata_attribute_type: Option<String>,
    pub additional_url: Option<String>,
    /// Unbound functions and actions have no collection.
    pub unbound: bool,
    /// Navigation property an `$expand` entry refers to.
    pub property: Option<String>,
    /// Absolute URL, e.g. an `@odata.nextLink`. Takes precedence over `collection`.
    pub url: Option<String>,

    // Query clauses
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub saved_query: Option<String>,
    pub user_query: Option<String>,
    pub count: bool,
    pub top: u32,
    pub order_by: Vec<String>,
    pub expand: Option<Expand>,
    pub fetch_xml: Option<String>,

    // Header-affecting
    #[serde(rename = "ifmatch")]
    pub if_match: Option<String>,
    #[serde(rename = "ifnonematch")]
    pub if_none_match: Option<String>,
    pub impersonate: Option<String>,
    pub token: Option<SecretString>,
    pub duplicate_detection: bool,
    pub no_cache: bool,
    pub merge_labels: bool,
    pub prefer: Option<Prefer>,
    pub return_representation: Option<bool>,
    pub include_annotations: Option<String>,
    pub max_page_size: Option<u32>,
    pub track_changes: bool,

    #[serde(rename = "async")]
    pub is_async: Option<bool>,
    pub proxy: Option<ProxyConfig>,
}

impl Request {
    /// Descriptor addressing `collection`.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..Self::default()
        }
    }

    /// Descriptor pointing at an absolute URL (next-link follow-ups).
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Whether the call should be dispatched asynchronously (default: `true`).
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async.unwrap_or(true)
    }
}

/// `$expand` clause: either a raw OData fragment or nested descriptors.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expand {
    Raw(String),
    Items(Vec<Request>),
}

/// Raw `Prefer` tokens, as a comma separated string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Prefer {
    One(String),
    Many(Vec<String>),
}

impl Prefer {
    /// Individual trimmed tokens, empty ones dropped.
    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        let raw: Vec<&str> = match self {
            Self::One(s) => s.split(',').collect(),
            Self::Many(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Outbound proxy for a call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Proxy URL, optionally carrying `user:password@` credentials
    pub url: String,
    /// Explicit credentials; take precedence over the ones in `url`
    #[serde(default)]
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: SecretString::from(password.into()),
        });
        self
    }
}

/// Basic credentials for a proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: SecretString,
}
