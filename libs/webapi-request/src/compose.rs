//! Descriptor to URL composition.
//!
//! Composition is pure: [`compose`] validates the descriptor once, then builds
//! the relative URL and the header map without touching any shared state.
//!
//! Query clauses are always emitted in the same order:
//! `$select`, `$filter`, `savedQuery`, `userQuery`, `$count`, `$top`,
//! `$orderby`, `$expand`. Top-level clauses are joined with `&`, clauses of a
//! nested `$expand` entry with `;`.

use std::sync::LazyLock;

use http::HeaderMap;
use regex::{Captures, Regex};

use crate::config::WebApiConfig;
use crate::error::ComposeError;
use crate::headers::compose_headers;
use crate::operation::{Operation, Scope};
use crate::request::{Expand, Request};
use crate::validate::{self, Validated};

#[allow(clippy::expect_used)] // static pattern
static BRACED_FILTER_GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[^"'])\{([\w\d]{8}-?(?:[\w\d]{4}-?){3}[\w\d]{12})\}([^"']|$)"#)
        .expect("static regex should not panic")
});

/// Outcome of composition: everything the transport needs except the body.
#[derive(Debug, Clone)]
pub struct ComposedRequest {
    /// Path relative to the service root, with its query string
    pub url: String,
    pub headers: HeaderMap,
    pub is_async: bool,
}

/// Path plus the ordered list of query clauses of one descriptor level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub path: String,
    pub clauses: Vec<String>,
    join: char,
}

impl UrlParts {
    /// Clauses joined with this level's separator.
    #[must_use]
    pub fn query(&self) -> String {
        let mut sep = [0u8; 4];
        self.clauses.join(self.join.encode_utf8(&mut sep))
    }

    /// Path and query as a single URL. A path that already carries a query
    /// string (next links) is extended with `&`.
    #[must_use]
    pub fn to_url(&self) -> String {
        if self.clauses.is_empty() {
            return self.path.clone();
        }
        let sep = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{sep}{}", self.path, self.query())
    }
}

/// Compose a descriptor into a relative URL, headers and the async flag.
///
/// # Errors
/// Returns [`ComposeError`] when the descriptor fails validation; nothing is
/// composed in that case.
pub fn compose(
    request: &Request,
    config: &WebApiConfig,
    operation: Operation,
) -> Result<ComposedRequest, ComposeError> {
    let validated = validate::request(request, operation)?;
    let url = compose_target(&validated, config);
    let headers = compose_headers(&validated, config)?;

    tracing::debug!(operation = %operation, url = %url, "composed request");

    Ok(ComposedRequest {
        url,
        headers,
        is_async: validated.is_async(),
    })
}

fn compose_target(request: &Validated, config: &WebApiConfig) -> String {
    if let Some(absolute) = &request.url {
        let path = config.strip_base(absolute).to_owned();
        return compose_url(request, path).to_url();
    }

    let mut path = match (request.collection.as_deref(), request.content_id.as_deref()) {
        (Some(collection), Some(content_id)) if content_id.starts_with('$') => {
            format!("{content_id}/{collection}")
        }
        (collection, _) => collection.unwrap_or_default().to_owned(),
    };

    if let Some(key) = &request.key {
        path.push('(');
        path.push_str(key);
        path.push(')');
    }

    if let Some(additional) = &request.additional_url {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(additional);
    }

    let parts = compose_url(request, path);

    // fetchXml replaces the query clauses but keeps navigation segments
    if let Some(fetch_xml) = &request.fetch_xml {
        return format!("{}?fetchXml={}", parts.path, urlencoding::encode(fetch_xml));
    }

    parts.to_url()
}

/// Compose navigation segments and query clauses of a validated descriptor
/// on top of `path`.
#[must_use]
pub fn compose_url(request: &Validated, path: String) -> UrlParts {
    compose_level(request, Scope::top(request.operation()), path, '&')
}

fn compose_level(request: &Request, scope: Scope, mut path: String, join: char) -> UrlParts {
    let mut clauses = Vec::new();

    if let Some(navigation) = &request.navigation_property {
        path.push('/');
        path.push_str(navigation);
        if let Some(key) = &request.navigation_property_key {
            path.push('(');
            path.push_str(key);
            path.push(')');
        }
        if navigation == "Attributes"
            && let Some(attribute_type) = &request.metadata_attribute_type
        {
            path.push('/');
            path.push_str(attribute_type);
        }
    }

    compose_select(request, scope, &mut path, &mut clauses);

    if let Some(filter) = &request.filter {
        let filter = unbrace_filter_guids(filter);
        clauses.push(format!("$filter={}", urlencoding::encode(&filter)));
    }
    if let Some(saved_query) = &request.saved_query {
        clauses.push(format!("savedQuery={saved_query}"));
    }
    if let Some(user_query) = &request.user_query {
        clauses.push(format!("userQuery={user_query}"));
    }
    if request.count {
        clauses.push("$count=true".to_owned());
    }
    if request.top > 0 {
        clauses.push(format!("$top={}", request.top));
    }
    if !request.order_by.is_empty() {
        clauses.push(format!("$orderby={}", request.order_by.join(",")));
    }

    match &request.expand {
        Some(Expand::Raw(raw)) if !raw.is_empty() => clauses.push(format!("$expand={raw}")),
        Some(Expand::Items(items)) => {
            let terms: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let property = item.property.as_deref()?;
                    let nested = compose_level(item, scope.expand(), String::new(), ';');
                    Some(if nested.clauses.is_empty() {
                        property.to_owned()
                    } else {
                        format!("{property}({})", nested.query())
                    })
                })
                .collect();
            if !terms.is_empty() {
                clauses.push(format!("$expand={}", terms.join(",")));
            }
        }
        _ => {}
    }

    UrlParts {
        path,
        clauses,
        join,
    }
}

fn compose_select(request: &Request, scope: Scope, path: &mut String, clauses: &mut Vec<String>) {
    let mut fields = request.select.as_slice();
    if fields.is_empty() {
        return;
    }

    if scope.is_retrieve() {
        if let [single] = fields
            && single.ends_with("/$ref")
        {
            path.push('/');
            path.push_str(single);
            return;
        }

        if let Some((first, rest)) = fields.split_first()
            && first.starts_with('/')
        {
            // a leading "/segment" addresses a property; dropped under navigation
            if request.navigation_property.is_none() {
                path.push_str(first);
            }
            fields = rest;
        }
    }

    if !fields.is_empty() {
        clauses.push(format!("$select={}", fields.join(",")));
    }
}

/// Rewrite `{guid}` literals in a filter to bare GUIDs.
///
/// Quoted literals are left alone. A GUID followed by `)` keeps the
/// parenthesis; in every other position a space follows the GUID.
#[must_use]
pub fn unbrace_filter_guids(filter: &str) -> String {
    let mut current = filter.to_owned();
    // matches consume their trailing character, so adjacent GUIDs need another pass
    while BRACED_FILTER_GUID.is_match(&current) {
        current = BRACED_FILTER_GUID
            .replace_all(&current, |caps: &Captures| {
                let trail = match &caps[3] {
                    ")" => ")".to_owned(),
                    "" => " ".to_owned(),
                    t if t.chars().all(char::is_whitespace) => t.to_owned(),
                    t => format!(" {t}"),
                };
                format!("{}{}{trail}", &caps[1], &caps[2])
            })
            .into_owned();
    }
    current
}
