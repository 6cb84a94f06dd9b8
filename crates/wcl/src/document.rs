/*
 * document.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The parsed WCL document and its scoped lookup rules.
//!
//! A key without dots is resolved in layers, first match wins:
//!
//! 1. the current-context bindings: the document's top-level `current`
//!    section overlaid with [`SearchOptions::currentvals`];
//! 2. the caller's [`SearchOptions::searchobj`];
//! 3. for each section type in the search order (e.g. `file`, `list`,
//!    `exec`), the instance named by the `curr_<type>` binding;
//! 4. the top level of the document.
//!
//! A dotted key (`module.exec_1.cmdline`) is a literal path and ignores
//! all scoping.

use crate::error::{WclError, WclResult};
use crate::replace::{ReplaceOptions, replace_vars};
use crate::value::{Node, Section};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Name of the reserved top-level section holding current-context bindings.
pub const CURRENT_SECTION: &str = "current";

/// Prefix of current-context bindings that select a section instance.
pub const CURRENT_PREFIX: &str = "curr_";

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\$\{([^}]+)\}").unwrap());

static NO_OPTIONS: Lazy<SearchOptions> = Lazy::new(SearchOptions::default);

/// Per-call options for a scoped search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Current-context bindings that override the document's `current` section.
    pub currentvals: Section,
    /// An extra mapping consulted after the current context.
    pub searchobj: Option<Section>,
    /// Fail with a lookup error instead of returning `None`.
    pub required: bool,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a current-context value (e.g. `curr_exec` = `exec_1`).
    pub fn with_current(mut self, key: &str, value: impl Into<String>) -> Self {
        self.currentvals.insert(key, value.into());
        self
    }

    pub fn with_searchobj(mut self, searchobj: Section) -> Self {
        self.searchobj = Some(searchobj);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// A fully resolved value as returned by [`Document::getfull`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FullValue {
    Scalar(String),
    /// A value that expanded into several branches.
    List(Vec<String>),
    Section(Section),
}

impl FullValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FullValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// A parsed WCL document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Section,
    search_order: Vec<String>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing section as a document root.
    pub fn from_section(root: Section) -> Self {
        Self {
            root,
            search_order: Vec::new(),
        }
    }

    pub fn root(&self) -> &Section {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Section {
        &mut self.root
    }

    pub fn into_root(self) -> Section {
        self.root
    }

    pub fn search_order(&self) -> &[String] {
        &self.search_order
    }

    /// Set the section types consulted by scoped lookups, in priority order.
    pub fn set_search_order<I, S>(&mut self, order: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.search_order = order
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
    }

    /// Record a binding in the document's own `current` section.
    ///
    /// The section is created when missing; a scalar named `current` is an
    /// error.
    pub fn set_current(&mut self, key: &str, value: impl Into<String>) -> WclResult<()> {
        let current = self.root.section_entry(CURRENT_SECTION).ok_or_else(|| {
            WclError::value(CURRENT_SECTION, "current is a value, not a section")
        })?;
        current.insert(key, value.into());
        Ok(())
    }

    /// Deep-merge `other` into the root.
    pub fn update(&mut self, other: &Section) {
        self.root.merge(other);
    }

    /// Search for `key` following the dotted-path or scoping rules.
    ///
    /// Returns `Ok(None)` when not found, unless `opts.required` is set.
    pub fn search<'a>(&'a self, key: &str, opts: &'a SearchOptions) -> WclResult<Option<&'a Node>> {
        let key = key.to_lowercase();
        let found = self.find(&key, opts);
        tracing::trace!(key = %key, found = found.is_some(), "search");
        match found {
            None if opts.required => Err(WclError::lookup(key)),
            other => Ok(other),
        }
    }

    /// Search for `key`, falling back to `default` when not found.
    pub fn get<'a>(
        &'a self,
        key: &str,
        opts: &'a SearchOptions,
        default: &'a Node,
    ) -> WclResult<&'a Node> {
        Ok(self.search(key, opts)?.unwrap_or(default))
    }

    /// Scalar value of `key` under the default scoping rules.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.find(&key.to_lowercase(), &NO_OPTIONS)
            .and_then(Node::as_str)
    }

    /// Whether `key` resolves under the given options.
    pub fn contains(&self, key: &str, opts: &SearchOptions) -> bool {
        self.find(&key.to_lowercase(), opts).is_some()
    }

    /// Overwrite the value at a dotted path.
    ///
    /// Every intermediate section must already exist; nothing is created.
    pub fn set(&mut self, key: &str, value: impl Into<Node>) -> WclResult<()> {
        let mut parts: Vec<&str> = key.split('.').collect();
        let leaf = parts.pop().unwrap_or_default();
        let mut section = &mut self.root;
        for part in parts {
            section = section
                .get_mut(&part.to_lowercase())
                .and_then(Node::as_section_mut)
                .ok_or_else(|| WclError::lookup(key))?;
        }
        section.insert(leaf, value);
        Ok(())
    }

    /// Search for `key` and, if it is a string, substitute its variables.
    ///
    /// Multi-valued variables are expanded; a single resulting branch is
    /// returned as a scalar. Substitution is skipped when
    /// `opts.replace_vars` is false.
    ///
    /// A missing key is `Ok(None)`; callers wanting a default use
    /// `getfull(key, opts)?.unwrap_or(default)`.
    pub fn getfull(&self, key: &str, opts: &ReplaceOptions<'_>) -> WclResult<Option<FullValue>> {
        let Some(node) = self.search(key, &opts.search)? else {
            return Ok(None);
        };
        let value = match node {
            Node::Section(section) => FullValue::Section(section.clone()),
            Node::Scalar(text) if !opts.replace_vars => FullValue::Scalar(text.clone()),
            Node::Scalar(text) => {
                let mut expanding = opts.clone();
                expanding.expand = true;
                replace_vars(text, self, &expanding)?.into_full_value()
            }
        };
        Ok(Some(value))
    }

    /// Names of all `${...}` variables referenced anywhere in the document.
    ///
    /// Width suffixes (`${ccdnum:2}`) are dropped.
    pub fn used_variables(&self) -> IndexSet<String> {
        let mut found = IndexSet::new();
        collect_variables(&self.root, &mut found);
        found
    }

    pub(crate) fn find<'a>(&'a self, key: &str, opts: &'a SearchOptions) -> Option<&'a Node> {
        if key.contains('.') {
            self.find_path(key)
        } else {
            self.find_scoped(key, opts)
        }
    }

    fn find_path(&self, key: &str) -> Option<&Node> {
        let mut parts = key.split('.');
        let mut node = self.root.get(parts.next()?)?;
        for part in parts {
            node = node.as_section()?.get(part)?;
        }
        Some(node)
    }

    fn find_scoped<'a>(&'a self, key: &str, opts: &'a SearchOptions) -> Option<&'a Node> {
        if let Some(value) = self.current_value(key, opts) {
            return Some(value);
        }
        if let Some(value) = opts.searchobj.as_ref().and_then(|obj| obj.get(key)) {
            return Some(value);
        }
        for sect in &self.search_order {
            let binding = format!("{}{}", CURRENT_PREFIX, sect);
            let Some(instance) = self.current_value(&binding, opts).and_then(Node::as_str) else {
                continue;
            };
            let value = self
                .root
                .get_section(sect)
                .and_then(|s| s.get_section(instance))
                .and_then(|s| s.get(key));
            if value.is_some() {
                return value;
            }
        }
        self.root.get(key)
    }

    fn current_value<'a>(&'a self, key: &str, opts: &'a SearchOptions) -> Option<&'a Node> {
        opts.currentvals.get(key).or_else(|| {
            self.root
                .get_section(CURRENT_SECTION)
                .and_then(|current| current.get(key))
        })
    }
}

fn collect_variables(section: &Section, found: &mut IndexSet<String>) {
    for (_, value) in section {
        match value {
            Node::Section(child) => collect_variables(child, found),
            Node::Scalar(text) => {
                for caps in VARIABLE_RE.captures_iter(text) {
                    let name = caps[1].split(':').next().unwrap_or_default();
                    found.insert(name.to_string());
                }
            }
        }
    }
}
