/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! WCL text parser.
//!
//! WCL is line oriented:
//!
//! ```text
//! # comment
//! <module>                    open a section
//!     <exec_1 sublabel>       open a section and a child section
//!         key = value
//!         key value
//!     </exec_1>               close both (or `</sublabel>` then `</exec_1>`)
//! </module>
//! <<include ${config_dir}/other.wcl>>
//! <<inclfunc dbutils.get_info(band,expnum)>>
//! ```
//!
//! A trailing `\` joins a line with the next one. Everything after an
//! unescaped `#` is a comment; `\#` is a literal `#`.
//!
//! Both include forms merge their result into the document *root*, no
//! matter which section is open when the directive appears.

use crate::document::Document;
use crate::error::{WclError, WclResult};
use crate::header::HeaderReader;
use crate::registry::{FragmentArgs, FunctionRegistry};
use crate::replace::{MAX_ITERATIONS, ReplaceOptions, replace_vars_single};
use crate::resolver::{FileSystemResolver, IncludeResolver, expand_path};
use crate::split::split_values;
use crate::value::{KeyCase, Section};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<include (\S+)>>").unwrap());
static INCLFUNC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<inclfunc ([^>]+)>>").unwrap());
static CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^(]+)\(([^)]+)\)").unwrap());
static CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*</\s*(\S+)\s*>\s*$").unwrap());
static OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*<(\S+)\s*(\S+)?>\s*$").unwrap());
static KEY_EQ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\S+)\s*=\s*(.+)$").unwrap());
static KEY_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\S+)\s+([^=].*)$").unwrap());

/// Configurable WCL parser.
///
/// ```ignore
/// let doc = WclParser::new()
///     .with_functions(&registry)
///     .parse_file(Path::new("job.wcl"))?;
/// ```
#[derive(Clone)]
pub struct WclParser<'a> {
    filename: String,
    preserve_case: bool,
    resolver: &'a dyn IncludeResolver,
    functions: Option<&'a FunctionRegistry>,
    headers: Option<&'a dyn HeaderReader>,
    max_iterations: usize,
    depth: usize,
}

impl Default for WclParser<'_> {
    fn default() -> Self {
        Self {
            filename: "stdin".to_string(),
            preserve_case: false,
            resolver: &FileSystemResolver,
            functions: None,
            headers: None,
            max_iterations: MAX_ITERATIONS,
            depth: 0,
        }
    }
}

/// One open section on the parse stack.
#[derive(Debug)]
struct Frame {
    key: String,
    /// Opened as the second token of `<key sublabel>`.
    sublabel: bool,
}

struct ParseState {
    doc: Document,
    stack: Vec<Frame>,
}

impl ParseState {
    /// The innermost open section.
    fn current_mut(&mut self) -> Option<&mut Section> {
        let mut section = self.doc.root_mut();
        for frame in &self.stack {
            section = section.get_mut(&frame.key)?.as_section_mut()?;
        }
        Some(section)
    }

    fn stack_keys(&self) -> Vec<String> {
        self.stack.iter().map(|f| f.key.clone()).collect()
    }
}

impl<'a> WclParser<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// File name used in diagnostics.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Keep key case at the top level, as inside a `cmdline` section.
    pub fn with_preserve_case(mut self, preserve_case: bool) -> Self {
        self.preserve_case = preserve_case;
        self
    }

    pub fn with_resolver(mut self, resolver: &'a dyn IncludeResolver) -> Self {
        self.resolver = resolver;
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

    /// Bound for substitution loops and include nesting.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Read and parse a WCL file.
    pub fn parse_file(&self, path: &Path) -> WclResult<Document> {
        let text = std::fs::read_to_string(path).map_err(|source| WclError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.clone()
            .with_filename(path.display().to_string())
            .parse_str(&text)
    }

    /// Parse WCL text into a new document.
    pub fn parse_str(&self, text: &str) -> WclResult<Document> {
        let case = if self.preserve_case {
            KeyCase::Preserve
        } else {
            KeyCase::Fold
        };
        let mut state = ParseState {
            doc: Document::from_section(Section::with_case(case)),
            stack: Vec::new(),
        };

        let mut lines = text.lines();
        let mut line_number = 0;
        while let Some(first) = lines.next() {
            line_number += 1;
            let mut line = first.trim().to_string();
            while line.ends_with('\\') {
                line.pop();
                match lines.next() {
                    Some(next) => {
                        line_number += 1;
                        line.push_str(next.trim());
                    }
                    None => break,
                }
            }

            let line = strip_comment(&line);
            if line.trim().is_empty() {
                continue;
            }
            self.parse_line(&mut state, &line, line_number)?;
        }

        if !state.stack.is_empty() {
            return Err(self.structural(
                &state,
                None,
                "missing section closing line. Check that all sections have closing line.",
            ));
        }
        Ok(state.doc)
    }

    fn parse_line(&self, state: &mut ParseState, line: &str, line_number: usize) -> WclResult<()> {
        if let Some(caps) = INCLUDE_RE.captures(line) {
            return self.include(state, &caps[1], line_number);
        }

        if let Some(caps) = INCLFUNC_RE.captures(line) {
            return self.include_function(state, &caps[1], line_number);
        }

        if let Some(caps) = CLOSE_RE.captures(line) {
            return self.close_section(state, &caps[1].to_lowercase(), line_number);
        }

        if let Some(caps) = OPEN_RE.captures(line) {
            let key = caps[1].to_lowercase();
            let sublabel = caps.get(2).map(|m| m.as_str().to_lowercase());
            return self.open_section(state, key, sublabel, line_number);
        }

        let pair = KEY_EQ_RE
            .captures(line)
            .or_else(|| KEY_SPACE_RE.captures(line));
        if let Some(caps) = pair {
            let key = &caps[1];
            let value = caps[2].trim();
            let Some(section) = state.current_mut() else {
                return Err(self.lost_section(state, line_number));
            };
            section.insert(key, value);
            return Ok(());
        }

        tracing::warn!(
            file = %self.filename,
            line = line_number,
            text = line,
            "Ignoring line (did not match patterns)"
        );
        Ok(())
    }

    fn open_section(
        &self,
        state: &mut ParseState,
        key: String,
        sublabel: Option<String>,
        line_number: usize,
    ) -> WclResult<()> {
        if state.stack.last().is_some_and(|top| top.key == key) {
            return Err(self.structural(
                state,
                Some(line_number),
                format!("found child section with same name ({})", key),
            ));
        }

        let mut frames = vec![Frame {
            key,
            sublabel: false,
        }];
        if let Some(label) = sublabel {
            frames.push(Frame {
                key: label,
                sublabel: true,
            });
        }

        for frame in frames {
            let Some(parent) = state.current_mut() else {
                return Err(self.lost_section(state, line_number));
            };
            if parent.section_entry(&frame.key).is_none() {
                let message = format!("section <{}> conflicts with an existing value", frame.key);
                return Err(self.structural(state, Some(line_number), message));
            }
            state.stack.push(frame);
        }
        Ok(())
    }

    fn close_section(&self, state: &mut ParseState, key: &str, line_number: usize) -> WclResult<()> {
        let depth = state.stack.len();
        let pops = match state.stack.as_slice() {
            [.., top] if top.key == key => 1,
            [.., below, top] if top.sublabel && below.key == key => 2,
            _ => 0,
        };
        if pops > 0 {
            state.stack.truncate(depth - pops);
            return Ok(());
        }

        let message = match state.stack.as_slice() {
            [] => format!("Got close for {} but no section is open.", key),
            [.., below, top] if top.sublabel => format!(
                "Invalid or missing section close. Got close for {}. Expecting close for {}.",
                key, below.key
            ),
            [.., top] => format!(
                "Invalid or missing section close. Got close for {}. Expecting close for {}.",
                key, top.key
            ),
        };
        Err(self.structural(state, Some(line_number), message))
    }

    fn include(&self, state: &mut ParseState, target: &str, line_number: usize) -> WclResult<()> {
        if self.depth >= self.max_iterations {
            return Err(self.structural(
                state,
                Some(line_number),
                format!("includes nested more than {} deep ({})", self.max_iterations, target),
            ));
        }

        let expanded = replace_vars_single(target, &state.doc, &self.replace_options())?;
        let path = expand_path(&expanded);
        tracing::debug!(file = %self.filename, include = %path.display(), "including");

        let text = self
            .resolver
            .read_include(&path)
            .map_err(|source| WclError::Read {
                path: path.clone(),
                source,
            })?;
        let preserve = state
            .current_mut()
            .is_some_and(|s| s.case() == KeyCase::Preserve);

        let mut child = self.clone();
        child.filename = path.display().to_string();
        child.preserve_case = preserve;
        child.depth += 1;
        let included = child.parse_str(&text)?;

        state.doc.update(included.root());
        Ok(())
    }

    fn include_function(
        &self,
        state: &mut ParseState,
        body: &str,
        line_number: usize,
    ) -> WclResult<()> {
        let Some(call) = CALL_RE.captures(body) else {
            return Err(self.structural(
                state,
                Some(line_number),
                format!("Invalid inclfunc {}", body),
            ));
        };
        let name = call[1].trim();

        let opts = self.replace_options();
        let mut args = FragmentArgs::new();
        for key in split_values(&call[2], ',') {
            match state.doc.getfull(&key, &opts)? {
                Some(value) => {
                    args.insert(key, value);
                }
                None => tracing::warn!(
                    file = %self.filename,
                    line = line_number,
                    function = name,
                    argument = %key,
                    "inclfunc argument not found"
                ),
            }
        }

        let registry = self.functions.ok_or_else(|| WclError::UnknownFunction {
            name: name.to_string(),
        })?;
        let fragment = registry.call_fragment(name, &args)?;
        state.doc.update(&fragment);
        Ok(())
    }

    fn replace_options(&self) -> ReplaceOptions<'a> {
        let mut opts = ReplaceOptions::new().with_max_iterations(self.max_iterations);
        opts.functions = self.functions;
        opts.headers = self.headers;
        opts
    }

    fn structural(
        &self,
        state: &ParseState,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> WclError {
        WclError::Structural {
            file: self.filename.clone(),
            line,
            message: message.into(),
            stack: state.stack_keys(),
        }
    }

    fn lost_section(&self, state: &ParseState, line_number: usize) -> WclError {
        self.structural(
            state,
            Some(line_number),
            "open section was replaced by a value from an include",
        )
    }
}

/// Cut a line at its first unescaped `#` and unescape `\#`.
fn strip_comment(line: &str) -> String {
    let bytes = line.as_bytes();
    let cut = line
        .char_indices()
        .find(|&(i, c)| c == '#' && (i == 0 || bytes[i - 1] != b'\\'))
        .map_or(line.len(), |(i, _)| i);
    line[..cut].replace("\\#", "#")
}

/// Parse WCL text with the default parser.
pub fn parse(text: &str) -> WclResult<Document> {
    WclParser::new().parse_str(text)
}

/// Read and parse a WCL file with the default parser.
pub fn parse_file(path: impl AsRef<Path>) -> WclResult<Document> {
    WclParser::new().parse_file(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FullValue;
    use crate::resolver::MemoryResolver;
    use crate::value::Node;
    use pretty_assertions::assert_eq;

    fn section(doc: &Document, path: &str) -> Section {
        doc.root()
            .get_section(path)
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_key_value_forms() {
        let doc = parse("<s>\nfoo = 5\nbar 6\n</s>\n").unwrap();
        let expected: Section = [("foo", "5"), ("bar", "6")].into_iter().collect();
        assert_eq!(section(&doc, "s"), expected);
    }

    #[test]
    fn test_keys_are_folded() {
        let doc = parse("<Module>\nExecName = Coadd\n</MODULE>\n").unwrap();
        assert_eq!(doc.get_str("module.execname"), Some("Coadd"));
    }

    #[test]
    fn test_cmdline_preserves_case() {
        let text = "<exec_1>\n<cmdline>\nOutFile = a.fits\n-V = 1\n</cmdline>\nMixedCase = x\n</exec_1>\n";
        let doc = parse(text).unwrap();
        let cmdline = doc.root().get_section("exec_1").unwrap().get_section("cmdline").unwrap();
        let keys: Vec<_> = cmdline.keys().cloned().collect();
        assert_eq!(keys, vec!["OutFile", "-V"]);
        assert_eq!(doc.get_str("exec_1.mixedcase"), Some("x"));
    }

    #[test]
    fn test_preserve_case_option() {
        let doc = WclParser::new()
            .with_preserve_case(true)
            .parse_str("Key = 1\n")
            .unwrap();
        assert_eq!(doc.root().get_str("Key"), Some("1"));
    }

    #[test]
    fn test_comments_and_continuation() {
        let text = "# header\na = 1 # trailing\nb = x\\\ny\nc = 50\\#off\n\n   \n";
        let doc = parse(text).unwrap();
        assert_eq!(doc.get_str("a"), Some("1"));
        assert_eq!(doc.get_str("b"), Some("xy"));
        assert_eq!(doc.get_str("c"), Some("50#off"));
    }

    #[test]
    fn test_equals_inside_value() {
        let doc = parse("filter = a = b\nexpr x == y\n").unwrap();
        assert_eq!(doc.get_str("filter"), Some("a = b"));
        assert_eq!(doc.get_str("expr"), Some("x == y"));
    }

    #[test]
    fn test_sublabel_closes_two_levels() {
        let text = "<file red>\nfullname = a.fits\n</file>\n<list l1>\nx = 1\n</l1>\n</list>\n";
        let doc = parse(text).unwrap();
        assert_eq!(doc.get_str("file.red.fullname"), Some("a.fits"));
        assert_eq!(doc.get_str("list.l1.x"), Some("1"));
    }

    #[test]
    fn test_reopened_section_is_reused() {
        let doc = parse("<a>\nx = 1\n</a>\n<a>\ny = 2\n</a>\n").unwrap();
        let expected: Section = [("x", "1"), ("y", "2")].into_iter().collect();
        assert_eq!(section(&doc, "a"), expected);
    }

    #[test]
    fn test_unrecognized_line_is_skipped() {
        let doc = parse("a = 1\nnonsense\nb = 2\n").unwrap();
        assert_eq!(doc.root().len(), 2);
    }

    #[test]
    fn test_mismatched_close() {
        let err = parse("<a>\n<b>\n</a>\n</b>\n").unwrap_err();
        match err {
            WclError::Structural {
                line,
                message,
                stack,
                ..
            } => {
                assert_eq!(line, Some(3));
                assert!(message.contains("Got close for a. Expecting close for b."));
                assert_eq!(stack, vec!["a", "b"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_extra_close() {
        let err = parse("<a>\n</a>\n</a>\n").unwrap_err();
        assert!(matches!(err, WclError::Structural { line: Some(3), .. }));
    }

    #[test]
    fn test_missing_close() {
        let err = parse("<a>\nx = 1\n").unwrap_err();
        assert!(matches!(err, WclError::Structural { line: None, .. }));
    }

    #[test]
    fn test_same_name_child() {
        let err = parse("<exec>\n<exec>\n</exec>\n</exec>\n").unwrap_err();
        match err {
            WclError::Structural { message, line, .. } => {
                assert_eq!(line, Some(2));
                assert!(message.contains("same name (exec)"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_sublabel_mismatch_reports_parent() {
        let err = parse("<file red>\n</other>\n").unwrap_err();
        match err {
            WclError::Structural { message, .. } => {
                assert!(message.contains("Expecting close for file."));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_section_over_scalar() {
        let err = parse("a = 1\n<a>\n</a>\n").unwrap_err();
        assert!(matches!(err, WclError::Structural { line: Some(2), .. }));
    }

    #[test]
    fn test_include_merges_at_root() {
        let resolver = MemoryResolver::with_files([(
            "/cfg/common.wcl",
            "shared = yes\n<file>\n<red>\ndir = /data\n</red>\n</file>\n",
        )]);
        let text = "cfgdir = /cfg\n<file>\n<red>\nfullname = a.fits\n<<include ${cfgdir}/common.wcl>>\n</red>\n</file>\n";
        let doc = WclParser::new()
            .with_resolver(&resolver)
            .parse_str(text)
            .unwrap();

        assert_eq!(doc.get_str("shared"), Some("yes"));
        assert_eq!(doc.get_str("file.red.dir"), Some("/data"));
        assert_eq!(doc.get_str("file.red.fullname"), Some("a.fits"));
        assert!(doc.get_str("file.red.shared").is_none());
    }

    #[test]
    fn test_include_missing_file() {
        let resolver = MemoryResolver::new();
        let err = WclParser::new()
            .with_resolver(&resolver)
            .parse_str("<<include /nowhere.wcl>>\n")
            .unwrap_err();
        assert!(matches!(err, WclError::Read { .. }));
    }

    #[test]
    fn test_include_with_unknown_variable() {
        let resolver = MemoryResolver::new();
        let err = WclParser::new()
            .with_resolver(&resolver)
            .parse_str("<<include ${nowhere}/x.wcl>>\n")
            .unwrap_err();
        assert!(matches!(err, WclError::Lookup { .. }));
    }

    #[test]
    fn test_circular_include() {
        let resolver = MemoryResolver::with_files([("/loop.wcl", "<<include /loop.wcl>>\n")]);
        let err = WclParser::new()
            .with_resolver(&resolver)
            .with_max_iterations(10)
            .parse_str("<<include /loop.wcl>>\n")
            .unwrap_err();
        assert!(matches!(err, WclError::Structural { .. }));
    }

    #[test]
    fn test_inclfunc() {
        let mut registry = FunctionRegistry::new();
        registry.register_fragment("dbutils.get_info", |args| {
            let mut fragment = Section::new();
            let band = args.get("filt").and_then(FullValue::as_str).unwrap_or("?");
            fragment.insert("zeropoint", format!("zp_{}", band));
            fragment.insert("nargs", args.len().to_string());
            Ok(fragment)
        });

        let text = "band = g\nfilt = ${band}\n<s>\n<<inclfunc dbutils.get_info(filt,missing)>>\n</s>\n";
        let doc = WclParser::new()
            .with_functions(&registry)
            .parse_str(text)
            .unwrap();
        assert_eq!(doc.get_str("zeropoint"), Some("zp_g"));
        assert!(doc.get_str("s.zeropoint").is_none());
        assert_eq!(doc.root().get("nargs"), Some(&Node::from("1")));
    }

    #[test]
    fn test_inclfunc_errors() {
        let registry = FunctionRegistry::new();
        let parser = WclParser::new().with_functions(&registry);

        let err = parser.parse_str("<<inclfunc broken>>\n").unwrap_err();
        assert!(matches!(err, WclError::Structural { line: Some(1), .. }));

        let err = parser.parse_str("<<inclfunc nope.f(a)>>\n").unwrap_err();
        assert!(matches!(err, WclError::UnknownFunction { .. }));
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("a = 1 # c"), "a = 1 ");
        assert_eq!(strip_comment("# all"), "");
        assert_eq!(strip_comment(r"a = \#1 # c"), "a = #1 ");
    }
}
