/*
 * replace.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Variable substitution and loop expansion.
//!
//! Strings in a WCL document may reference other values through tokens:
//!
//! - `${name}` / `${name:width}`: required variable, optionally rendered as
//!   a zero-padded integer
//! - `$opt{name}`: optional variable, empty when missing
//! - `$HEAD{file,key1,key2}`: header values read from a data file
//! - `$FUNC{qualified.name,arg1,arg2}`: result of a registered function
//! - `$LOOP{name}` / `$LOOP{name:width}`: deferred multi-valued variable
//!
//! [`replace_vars`] rewrites tokens until the string stops changing. When
//! expansion is enabled, a variable whose value is a list (`g,r,i` or
//! `(1:4)`) becomes a `$LOOP{...}` marker, and the markers are finally
//! unrolled into one [`Branch`] per combination of values.
//!
//! Every rewriting loop is bounded by [`ReplaceOptions::max_iterations`]
//! (default [`MAX_ITERATIONS`]); running out of iterations means a variable
//! refers back to itself and is reported as [`WclError::NonTermination`].

use crate::document::{Document, FullValue, SearchOptions};
use crate::error::{WclError, WclResult};
use crate::header::{HeaderReader, NullHeaderReader};
use crate::registry::FunctionRegistry;
use crate::split::{is_multi_valued, split_values};
use crate::value::{Node, Section};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::BuildHasher;
use std::path::Path;

/// Default bound for every fixed-point loop.
pub const MAX_ITERATIONS: usize = 100;

// Token content may not contain `$`, so `${RMS_${BAND}}` resolves the
// inner token first.
static REQUIRED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\$\{([^$}]+)\}").unwrap());
static OPTIONAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\$opt\{([^$}]+)\}").unwrap());
static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\$HEAD\{([^$}]+)\}").unwrap());
static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\$FUNC\{([^$}]+)\}").unwrap());
static LOOP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\$LOOP\{([^}]+)\}").unwrap());

/// Record of the value chosen for each variable during one substitution.
pub type Keep = IndexMap<String, String>;

/// The kinds of substitution token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Required,
    Optional,
    Header,
    Function,
    Loop,
}

impl TokenKind {
    /// The tag between `$` and `{`.
    pub fn tag(self) -> &'static str {
        match self {
            TokenKind::Required => "",
            TokenKind::Optional => "opt",
            TokenKind::Header => "HEAD",
            TokenKind::Function => "FUNC",
            TokenKind::Loop => "LOOP",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            TokenKind::Required => &REQUIRED_RE,
            TokenKind::Optional => &OPTIONAL_RE,
            TokenKind::Header => &HEADER_RE,
            TokenKind::Function => &FUNCTION_RE,
            TokenKind::Loop => &LOOP_RE,
        }
    }

    /// Regex matching every occurrence of this token with exactly `content`.
    fn occurrences(self, content: &str) -> WclResult<Regex> {
        let token = format!("${}{{{}}}", self.tag(), content);
        Regex::new(&format!("(?i){}", regex::escape(&token)))
            .map_err(|e| WclError::value(token, e.to_string()))
    }
}

/// Options for a substitution call.
#[derive(Clone)]
pub struct ReplaceOptions<'a> {
    /// Options used for every variable lookup.
    pub search: SearchOptions,
    /// Defer multi-valued variables to loop expansion.
    pub expand: bool,
    /// Whether [`Document::getfull`] substitutes at all.
    pub replace_vars: bool,
    /// Bound for each fixed-point loop.
    pub max_iterations: usize,
    /// Functions available to `$FUNC{...}` and `<<inclfunc>>`.
    pub functions: Option<&'a FunctionRegistry>,
    /// Reader used for `$HEAD{...}`; none means every header lookup fails.
    pub headers: Option<&'a dyn HeaderReader>,
    depth: usize,
}

impl Default for ReplaceOptions<'_> {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            expand: false,
            replace_vars: true,
            max_iterations: MAX_ITERATIONS,
            functions: None,
            headers: None,
            depth: 0,
        }
    }
}

impl<'a> ReplaceOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }

    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_functions(mut self, functions: &'a FunctionRegistry) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_headers(mut self, headers: &'a dyn HeaderReader) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_replace_vars(mut self, replace_vars: bool) -> Self {
        self.replace_vars = replace_vars;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn nested(&self) -> Self {
        let mut nested = self.clone();
        nested.depth += 1;
        nested
    }
}

impl fmt::Debug for ReplaceOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaceOptions")
            .field("search", &self.search)
            .field("expand", &self.expand)
            .field("replace_vars", &self.replace_vars)
            .field("max_iterations", &self.max_iterations)
            .field("functions", &self.functions)
            .field("headers", &self.headers.is_some())
            .finish()
    }
}

/// One fully substituted string and the variable values that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    pub value: String,
    pub keep: Keep,
}

/// Result of [`replace_vars`].
///
/// `Single` means no loop expansion happened; `Multi` holds one branch per
/// combination of loop values.
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    Single(Branch),
    Multi(Vec<Branch>),
}

impl Substitution {
    pub fn branches(&self) -> &[Branch] {
        match self {
            Substitution::Single(branch) => std::slice::from_ref(branch),
            Substitution::Multi(branches) => branches,
        }
    }

    pub fn into_branches(self) -> Vec<Branch> {
        match self {
            Substitution::Single(branch) => vec![branch],
            Substitution::Multi(branches) => branches,
        }
    }

    pub fn values(&self) -> Vec<&str> {
        self.branches().iter().map(|b| b.value.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.branches().len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches().is_empty()
    }

    /// Collapse to a scalar when there is exactly one branch.
    pub fn into_full_value(self) -> FullValue {
        let mut branches = self.into_branches();
        if branches.len() == 1 {
            FullValue::Scalar(branches.remove(0).value)
        } else {
            FullValue::List(branches.into_iter().map(|b| b.value).collect())
        }
    }
}

/// Something variables can be resolved against.
///
/// A [`Document`] resolves names with its scoping rules; plain mappings
/// look names up exactly.
pub trait VarSource {
    /// Resolve `name` to a scalar, or `None` when it is not defined.
    fn lookup_var(&self, name: &str, opts: &SearchOptions) -> WclResult<Option<String>>;
}

fn scalar_or_error(name: &str, node: Option<&Node>) -> WclResult<Option<String>> {
    match node {
        None => Ok(None),
        Some(Node::Scalar(s)) => Ok(Some(s.clone())),
        Some(Node::Section(_)) => Err(WclError::value(
            name,
            "variable refers to a section, not a value",
        )),
    }
}

impl VarSource for Document {
    fn lookup_var(&self, name: &str, opts: &SearchOptions) -> WclResult<Option<String>> {
        scalar_or_error(name, self.find(&name.to_lowercase(), opts))
    }
}

impl VarSource for Section {
    fn lookup_var(&self, name: &str, _opts: &SearchOptions) -> WclResult<Option<String>> {
        scalar_or_error(name, self.get(name))
    }
}

impl VarSource for IndexMap<String, String> {
    fn lookup_var(&self, name: &str, _opts: &SearchOptions) -> WclResult<Option<String>> {
        Ok(self.get(name).cloned())
    }
}

impl<H: BuildHasher> VarSource for HashMap<String, String, H> {
    fn lookup_var(&self, name: &str, _opts: &SearchOptions) -> WclResult<Option<String>> {
        Ok(self.get(name).cloned())
    }
}

/// Outcome of a single sweep over one token kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    /// True when no token was resolved to a value.
    pub done: bool,
    pub text: String,
    pub keep: Keep,
}

/// Replace every token of one kind in `text`.
///
/// Missing variables are an error when `required`, otherwise they become
/// empty strings.
pub fn replace_vars_type<S: VarSource + ?Sized>(
    text: &str,
    source: &S,
    kind: TokenKind,
    required: bool,
    opts: &ReplaceOptions<'_>,
) -> WclResult<Sweep> {
    let mut current = text.to_string();
    let mut keep = Keep::new();
    let mut done = true;
    let mut count = 0;

    while let Some(caps) = kind.pattern().captures(&current) {
        if count >= opts.max_iterations {
            return Err(WclError::NonTermination {
                input: text.to_string(),
                limit: opts.max_iterations,
            });
        }
        count += 1;

        let content = caps[1].to_string();
        let (name, width) = split_width(&content);

        let resolved = match kind {
            TokenKind::Header => Some(resolve_header(name, opts)?),
            TokenKind::Function => Some(resolve_function(name, opts)?),
            _ => source.lookup_var(name, &opts.search)?,
        };
        tracing::trace!(token = %&caps[0], ?resolved, "resolving token");

        let replacement = match resolved {
            Some(value) => {
                done = false;
                let deferrable = matches!(kind, TokenKind::Required | TokenKind::Optional);
                if deferrable && opts.expand && is_multi_valued(&value) {
                    format!("$LOOP{{{}}}", content)
                } else if let Some(width) = width {
                    let width = parse_width(width, &content)?;
                    let scalar = settle_scalar(&value, source, opts)?;
                    let padded = pad(&scalar, width)?;
                    keep.insert(name.to_string(), scalar);
                    padded
                } else {
                    keep.insert(name.to_string(), value.clone());
                    value
                }
            }
            None if required => return Err(WclError::lookup(name)),
            None => String::new(),
        };

        current = kind
            .occurrences(&content)?
            .replace_all(&current, NoExpand(&replacement))
            .into_owned();
    }

    Ok(Sweep {
        done,
        text: current,
        keep,
    })
}

/// Substitute all tokens in `text` and expand any multi-valued variables.
pub fn replace_vars<S: VarSource + ?Sized>(
    text: &str,
    source: &S,
    opts: &ReplaceOptions<'_>,
) -> WclResult<Substitution> {
    if opts.depth > opts.max_iterations {
        return Err(WclError::NonTermination {
            input: text.to_string(),
            limit: opts.max_iterations,
        });
    }
    tracing::debug!(text, expand = opts.expand, "replace_vars");

    let mut keep = Keep::new();
    let mut current = settle(
        text,
        source,
        &[
            (TokenKind::Header, true),
            (TokenKind::Optional, false),
            (TokenKind::Required, true),
        ],
        opts,
        &mut keep,
    )?;
    // Function results may introduce new literal text, so they settle on their own.
    current = settle(&current, source, &[(TokenKind::Function, true)], opts, &mut keep)?;

    let seed = Branch {
        value: current,
        keep,
    };
    if !LOOP_RE.is_match(&seed.value) {
        return Ok(Substitution::Single(seed));
    }

    let mut loop_opts = opts.clone();
    loop_opts.search.required = true;
    loop_opts.replace_vars = false;
    Ok(Substitution::Multi(replace_vars_loop(seed, source, &loop_opts)?))
}

fn settle<S: VarSource + ?Sized>(
    text: &str,
    source: &S,
    sweeps: &[(TokenKind, bool)],
    opts: &ReplaceOptions<'_>,
    keep: &mut Keep,
) -> WclResult<String> {
    let mut current = text.to_string();
    for _ in 0..opts.max_iterations {
        let mut done = true;
        for &(kind, required) in sweeps {
            let sweep = replace_vars_type(&current, source, kind, required, opts)?;
            done &= sweep.done;
            keep.extend(sweep.keep);
            current = sweep.text;
        }
        if done {
            return Ok(current);
        }
    }
    Err(WclError::NonTermination {
        input: text.to_string(),
        limit: opts.max_iterations,
    })
}

/// Unroll `$LOOP{...}` markers into every combination of values.
///
/// Branches are produced in the order the values are listed, leftmost
/// marker varying slowest. Each branch's keep records the raw (unpadded)
/// value chosen for every loop variable.
pub fn replace_vars_loop<S: VarSource + ?Sized>(
    seed: Branch,
    source: &S,
    opts: &ReplaceOptions<'_>,
) -> WclResult<Vec<Branch>> {
    let input = seed.value.clone();
    let mut todo = VecDeque::from([(seed, 0usize)]);
    let mut done = Vec::new();

    // First in, first out: the leftmost marker varies slowest.
    while let Some((branch, depth)) = todo.pop_front() {
        let Some(caps) = LOOP_RE.captures(&branch.value) else {
            done.push(branch);
            continue;
        };
        if depth >= opts.max_iterations {
            return Err(WclError::NonTermination {
                input,
                limit: opts.max_iterations,
            });
        }

        let content = caps[1].to_string();
        let (name, width) = split_width(&content);
        let raw = source
            .lookup_var(name, &opts.search)?
            .ok_or_else(|| WclError::lookup(name))?;
        // A still-templated value may look multi-valued before it resolves.
        let raw = settle_scalar(&raw, source, opts)?;
        let marker = TokenKind::Loop.occurrences(&content)?;
        let width = width.map(|w| parse_width(w, &content)).transpose()?;

        for item in split_values(&raw, ',') {
            let rendered = match width {
                Some(width) => pad(&item, width)?,
                None => item.clone(),
            };
            let mut keep = branch.keep.clone();
            keep.insert(name.to_string(), item);
            let next = Branch {
                value: marker
                    .replace_all(&branch.value, NoExpand(&rendered))
                    .into_owned(),
                keep,
            };
            if LOOP_RE.is_match(&next.value) {
                todo.push_back((next, depth + 1));
            } else {
                done.push(next);
            }
        }
        tracing::trace!(pending = todo.len(), done = done.len(), "loop expansion");
    }

    Ok(done)
}

/// Substitute `text`, requiring exactly one result.
pub fn replace_vars_single<S: VarSource + ?Sized>(
    text: &str,
    source: &S,
    opts: &ReplaceOptions<'_>,
) -> WclResult<String> {
    match replace_vars(text, source, opts)? {
        Substitution::Single(branch) => Ok(branch.value),
        Substitution::Multi(mut branches) if branches.len() == 1 => Ok(branches.remove(0).value),
        Substitution::Multi(branches) => Err(WclError::Ambiguous {
            input: text.to_string(),
            count: branches.len(),
        }),
    }
}

fn split_width(content: &str) -> (&str, Option<&str>) {
    let mut parts = content.split(':');
    let name = parts.next().unwrap_or_default();
    (name, parts.next())
}

/// Padding widths are bounded by what the formatter accepts.
fn parse_width(width: &str, content: &str) -> WclResult<usize> {
    width
        .trim()
        .parse::<u16>()
        .map(usize::from)
        .map_err(|_| WclError::value(content, format!("invalid width '{}'", width)))
}

/// Resolve a value that may still hold tokens to a single string.
fn settle_scalar<S: VarSource + ?Sized>(
    value: &str,
    source: &S,
    opts: &ReplaceOptions<'_>,
) -> WclResult<String> {
    if !value.contains('$') {
        return Ok(value.to_string());
    }
    let mut nested = opts.nested();
    nested.expand = false;
    replace_vars_single(value, source, &nested)
}

fn pad(value: &str, width: usize) -> WclResult<String> {
    let number: i64 = value.trim().parse().map_err(|_| {
        WclError::value(value, format!("cannot format as {}-digit integer", width))
    })?;
    Ok(format!("{:0width$}", number, width = width))
}

fn resolve_header(spec: &str, opts: &ReplaceOptions<'_>) -> WclResult<String> {
    let mut parts = split_values(spec, ',').into_iter();
    let file = parts.next().unwrap_or_default();
    let keys: Vec<String> = parts.collect();
    let reader: &dyn HeaderReader = opts.headers.unwrap_or(&NullHeaderReader);
    tracing::debug!(file = %file, ?keys, "reading header values");
    Ok(reader.lookup_headers(Path::new(&file), &keys)?.join(","))
}

fn resolve_function(spec: &str, opts: &ReplaceOptions<'_>) -> WclResult<String> {
    let mut parts = split_values(spec, ',').into_iter();
    let name = parts.next().unwrap_or_default();
    let args: Vec<String> = parts.collect();
    let registry = opts
        .functions
        .ok_or_else(|| WclError::UnknownFunction { name: name.clone() })?;
    registry.call_value(&name, &args)
}
