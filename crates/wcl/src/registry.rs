/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Named functions callable from WCL.
//!
//! `$FUNC{name,arg1,...}` calls a *value function* with its literal
//! arguments and substitutes the returned string. `<<inclfunc name(k1,k2)>>`
//! calls a *fragment function* with the fully resolved values of the named
//! keys and merges the returned section into the document root.
//!
//! Functions are registered up front under a qualified name such as
//! `"qcutils.get_band_list"`; nothing is loaded dynamically.

use crate::document::FullValue;
use crate::error::{WclError, WclResult};
use crate::value::Section;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Arguments passed to a fragment function, keyed by argument name.
pub type FragmentArgs = IndexMap<String, FullValue>;

type ValueFn = dyn Fn(&[String]) -> WclResult<String> + Send + Sync;
type FragmentFn = dyn Fn(&FragmentArgs) -> WclResult<Section> + Send + Sync;

/// Registry of value and fragment functions.
#[derive(Default)]
pub struct FunctionRegistry {
    values: HashMap<String, Box<ValueFn>>,
    fragments: HashMap<String, Box<FragmentFn>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function for `$FUNC{...}` tokens.
    pub fn register_value<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&[String]) -> WclResult<String> + Send + Sync + 'static,
    {
        self.values.insert(name.into(), Box::new(func));
        self
    }

    /// Register a function for `<<inclfunc ...>>` directives.
    pub fn register_fragment<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&FragmentArgs) -> WclResult<Section> + Send + Sync + 'static,
    {
        self.fragments.insert(name.into(), Box::new(func));
        self
    }

    pub fn call_value(&self, name: &str, args: &[String]) -> WclResult<String> {
        let func = self
            .values
            .get(name)
            .ok_or_else(|| WclError::UnknownFunction {
                name: name.to_string(),
            })?;
        tracing::debug!(function = name, ?args, "calling value function");
        func(args)
    }

    pub fn call_fragment(&self, name: &str, args: &FragmentArgs) -> WclResult<Section> {
        let func = self
            .fragments
            .get(name)
            .ok_or_else(|| WclError::UnknownFunction {
                name: name.to_string(),
            })?;
        tracing::debug!(function = name, "calling fragment function");
        func(args)
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn has_fragment(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut values: Vec<_> = self.values.keys().collect();
        values.sort();
        let mut fragments: Vec<_> = self.fragments.keys().collect();
        fragments.sort();
        f.debug_struct("FunctionRegistry")
            .field("values", &values)
            .field("fragments", &fragments)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_function() {
        let mut registry = FunctionRegistry::new();
        registry.register_value("strutils.join", |args| Ok(args.join("-")));

        let out = registry
            .call_value("strutils.join", &["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(out, "a-b");
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.call_value("nope.missing", &[]).unwrap_err();
        assert!(matches!(err, WclError::UnknownFunction { name } if name == "nope.missing"));
    }

    #[test]
    fn test_fragment_function() {
        let mut registry = FunctionRegistry::new();
        registry.register_fragment("db.get_info", |args| {
            let mut section = Section::new();
            section.insert("nargs", args.len().to_string());
            Ok(section)
        });

        let mut args = FragmentArgs::new();
        args.insert("band".to_string(), FullValue::Scalar("g".to_string()));
        let section = registry.call_fragment("db.get_info", &args).unwrap();
        assert_eq!(section.get_str("nargs"), Some("1"));
        assert!(registry.has_fragment("db.get_info"));
        assert!(!registry.has_value("db.get_info"));
    }
}
