use serde::{Deserialize, Deserializer};

/// Client-wide defaults applied when a descriptor does not override them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebApiConfig {
    /// Service root, e.g. `https://org.crm.dynamics.com/api/data/v9.2/`
    #[serde(deserialize_with = "deserialize_root")]
    pub web_api_url: String,
    /// Ask the server to echo created/updated records
    pub return_representation: bool,
    /// Value of `odata.include-annotations`, e.g. `OData.Community.Display.V1.FormattedValue`
    pub include_annotations: Option<String>,
    /// Default `odata.maxpagesize`; `0` means unset
    pub max_page_size: u32,
}

impl WebApiConfig {
    /// Create a configuration for the given service root.
    ///
    /// A trailing slash is appended when missing so that relative request
    /// paths can be joined without further checks.
    #[must_use]
    pub fn new(web_api_url: impl Into<String>) -> Self {
        Self {
            web_api_url: with_trailing_slash(web_api_url.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_return_representation(mut self, enabled: bool) -> Self {
        self.return_representation = enabled;
        self
    }

    #[must_use]
    pub fn with_include_annotations(mut self, annotations: impl Into<String>) -> Self {
        self.include_annotations = Some(annotations.into());
        self
    }

    #[must_use]
    pub fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Strip the service root from an absolute URL.
    ///
    /// URLs that do not start with the service root are returned unchanged.
    #[must_use]
    pub fn strip_base<'a>(&self, url: &'a str) -> &'a str {
        if self.web_api_url.is_empty() {
            return url;
        }
        let root = self.web_api_url.trim_end_matches('/');
        match url.strip_prefix(root) {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '?']) => {
                rest.trim_start_matches('/')
            }
            _ => url,
        }
    }

    /// Absolute URL of `path` under the service root.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        let root = self.web_api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if root.is_empty() {
            return path.to_owned();
        }
        format!("{root}/{path}")
    }
}

fn with_trailing_slash(mut root: String) -> String {
    if !root.is_empty() && !root.ends_with('/') {
        root.push('/');
    }
    root
}

fn deserialize_root<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(d).map(with_trailing_slash)
}
