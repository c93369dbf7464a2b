//
//  octopus-client
//  api/links.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Hypermedia Links and URI Templates
//!
//! Every document the server returns carries a `Links` map from relation name
//! to a URI template. The client never hard-codes endpoint paths beyond the
//! API root: it reads a relation, fills the template's variables and requests
//! the result.
//!
//! # Template Syntax
//!
//! The server uses a subset of RFC 6570:
//!
//! | Form | Example | Expansion |
//! |------|---------|-----------|
//! | `{var}` | `/deployments/preview/{environment}` | Required, percent-encoded |
//! | `{+var}` | `{+path}` | Required, reserved characters kept |
//! | `{/var}` | `/projects{/id}` | Optional path segment |
//! | `{?a,b}` | `{?skip,take}` | Optional query, starts with `?` |
//! | `{&a}` | `{&partialName}` | Optional query continuation |
//! | `{.a}` / `{;a}` / `{#a}` | `{.ext}` | Optional label, parameter or fragment |
//!
//! List values are joined with `,` after encoding each element.
//!
//! # Example
//!
//! ```rust
//! use octopus_client::api::links::{LinkParams, LinkTemplate};
//!
//! let template = LinkTemplate::new("/api/Spaces-1/projects{/id}{?skip,take,partialName}");
//! let url = template
//!     .expand(&LinkParams::new().with("take", 10).with("partialName", "web app"))
//!     .unwrap();
//! assert_eq!(url, "/api/Spaces-1/projects?take=10&partialName=web%20app");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::common::ApiError;

/// Matches one template expression: operator and variable list.
static EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([+#./;?&]?)([^}]*)\}").expect("valid template expression"));

/// Map of relation name to URI template, as carried by every document.
///
/// Lookup is exact first and falls back to a case-insensitive match, since
/// older servers are inconsistent about relation casing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(HashMap<String, String>);

impl Links {
    /// Creates an empty link map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw template for `rel`.
    pub fn get(&self, rel: &str) -> Option<&str> {
        if let Some(value) = self.0.get(rel) {
            return Some(value.as_str());
        }
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(rel))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if `rel` is advertised.
    pub fn contains(&self, rel: &str) -> bool {
        self.get(rel).is_some()
    }

    /// Returns the raw template for `rel`, or [`ApiError::MissingLink`].
    pub fn require(&self, rel: &str) -> Result<&str, ApiError> {
        self.get(rel)
            .ok_or_else(|| ApiError::MissingLink(rel.to_string()))
    }

    /// Returns the parsed template for `rel`, or [`ApiError::MissingLink`].
    pub fn template(&self, rel: &str) -> Result<LinkTemplate, ApiError> {
        self.require(rel).map(LinkTemplate::new)
    }

    /// Adds or replaces a relation.
    pub fn insert(&mut self, rel: impl Into<String>, href: impl Into<String>) {
        self.0.insert(rel.into(), href.into());
    }

    /// Returns `true` if no relation is advertised.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over every relation and its template.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Links {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Value bound to a template variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A single scalar value.
    Single(String),
    /// A list, expanded as comma-separated elements.
    List(Vec<String>),
}

impl ParamValue {
    fn is_empty(&self) -> bool {
        matches!(self, ParamValue::List(items) if items.is_empty())
    }

    fn encoded(&self, allow_reserved: bool) -> String {
        let encode = |value: &str| {
            if allow_reserved {
                value.to_string()
            } else {
                encode_component(value)
            }
        };
        match self {
            ParamValue::Single(value) => encode(value),
            ParamValue::List(items) => items.iter().map(|i| encode(i)).collect::<Vec<_>>().join(","),
        }
    }
}

/// Named values used to expand a [`LinkTemplate`].
///
/// # Example
///
/// ```rust
/// use octopus_client::api::links::LinkParams;
///
/// let params = LinkParams::new()
///     .with("skip", 0)
///     .with_list("ids", ["Projects-1", "Projects-2"]);
/// assert!(params.contains("ids"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkParams(BTreeMap<String, ParamValue>);

impl LinkParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a scalar value.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    /// Binds a scalar value when one is present.
    pub fn with_opt<V: ToString>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.set(name, value);
        }
        self
    }

    /// Binds a list value.
    pub fn with_list<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.0.insert(
            name.into(),
            ParamValue::List(values.into_iter().map(|v| v.to_string()).collect()),
        );
        self
    }

    /// Binds a scalar value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.insert(name.into(), ParamValue::Single(value.to_string()));
    }

    /// Returns `true` if `name` has a value.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Copies every binding from `other`, replacing existing ones.
    pub fn merge(mut self, other: &LinkParams) -> Self {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
        self
    }

    fn lookup(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name).filter(|value| !value.is_empty())
    }
}

/// A URI template taken from a `Links` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate {
    raw: String,
}

impl LinkTemplate {
    /// Wraps a raw template string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Returns the raw template.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns every variable name the template mentions, in order.
    pub fn variables(&self) -> Vec<String> {
        EXPRESSION
            .captures_iter(&self.raw)
            .flat_map(|caps| {
                caps.get(2)
                    .map(|m| m.as_str())
                    .unwrap_or_default()
                    .split(',')
                    .map(variable_name)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Returns `true` if the template mentions `name`.
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables().iter().any(|v| v == name)
    }

    /// Returns the template with every expression removed.
    pub fn base(&self) -> String {
        EXPRESSION.replace_all(&self.raw, "").into_owned()
    }

    /// Expands the template with `params`.
    ///
    /// # Returns
    ///
    /// The expanded URL, or [`ApiError::MissingParameter`] when a simple
    /// (`{var}`, `{+var}`) variable has no value. Optional forms are dropped
    /// when unbound.
    pub fn expand(&self, params: &LinkParams) -> Result<String, ApiError> {
        let mut out = String::with_capacity(self.raw.len());
        let mut last = 0;

        for caps in EXPRESSION.captures_iter(&self.raw) {
            let (Some(whole), Some(op), Some(vars)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            out.push_str(&self.raw[last..whole.start()]);
            last = whole.end();

            let names: Vec<&str> = vars
                .as_str()
                .split(',')
                .map(variable_name)
                .filter(|n| !n.is_empty())
                .collect();

            match op.as_str() {
                "" | "+" => {
                    let allow_reserved = op.as_str() == "+";
                    let mut parts = Vec::with_capacity(names.len());
                    for name in &names {
                        let value = params.lookup(name).ok_or_else(|| ApiError::MissingParameter {
                            template: self.raw.clone(),
                            parameter: name.to_string(),
                        })?;
                        parts.push(value.encoded(allow_reserved));
                    }
                    out.push_str(&parts.join(","));
                }
                "?" | "&" => {
                    let pairs: Vec<String> = names
                        .iter()
                        .filter_map(|name| {
                            params
                                .lookup(name)
                                .map(|value| format!("{}={}", name, value.encoded(false)))
                        })
                        .collect();
                    if !pairs.is_empty() {
                        out.push_str(op.as_str());
                        out.push_str(&pairs.join("&"));
                    }
                }
                ";" => {
                    for name in &names {
                        if let Some(value) = params.lookup(name) {
                            out.push_str(&format!(";{}={}", name, value.encoded(false)));
                        }
                    }
                }
                prefix => {
                    let allow_reserved = prefix == "#";
                    let values: Vec<String> = names
                        .iter()
                        .filter_map(|name| params.lookup(name).map(|v| v.encoded(allow_reserved)))
                        .collect();
                    if !values.is_empty() {
                        match prefix {
                            "#" => {
                                out.push('#');
                                out.push_str(&values.join(","));
                            }
                            _ => {
                                for value in values {
                                    out.push_str(prefix);
                                    out.push_str(&value);
                                }
                            }
                        }
                    }
                }
            }
        }

        out.push_str(&self.raw[last..]);
        Ok(out)
    }
}

impl fmt::Display for LinkTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strips explode and prefix modifiers from a variable specification.
fn variable_name(spec: &str) -> &str {
    let spec = spec.trim();
    let spec = spec.strip_suffix('*').unwrap_or(spec);
    spec.split(':').next().unwrap_or(spec)
}

/// Percent-encodes everything outside the unreserved set.
fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
