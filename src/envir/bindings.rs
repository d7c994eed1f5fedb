use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;

use serde::Serialize;

/// Snapshot of the inherited process environment.
///
/// Lookups treat an empty value as unset, matching `${VAR:-default}`.
/// Variables whose value is not UTF-8 are kept apart: they count as set, so
/// no default replaces them, but their value is only seen lossily.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
    opaque: HashMap<String, String>,
}

impl Environment {
    pub fn capture() -> Self {
        Self::from_os_pairs(std::env::vars_os())
    }

    /// Entries with a non-UTF-8 name are dropped; no binding can match them.
    pub(crate) fn from_os_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut env = Self::default();
        for (key, value) in pairs {
            let Ok(key) = key.into_string() else {
                continue;
            };
            match value.into_string() {
                Ok(value) => {
                    env.vars.insert(key, value);
                }
                Err(value) => {
                    env.opaque.insert(key, value.to_string_lossy().into_owned());
                }
            }
        }
        env
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            opaque: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Lossy rendering of an inherited non-UTF-8 value.
    pub fn opaque(&self, key: &str) -> Option<&str> {
        self.opaque.get(key).map(String::as_str)
    }
}

/// Resolved variables handed to every step of the job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathBindings {
    vars: BTreeMap<String, String>,
}

impl PathBindings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Accumulates bindings with "pre-set environment wins" semantics.
pub(crate) struct BindingsBuilder<'a> {
    env: &'a Environment,
    vars: BTreeMap<String, String>,
}

impl<'a> BindingsBuilder<'a> {
    pub(crate) fn new(env: &'a Environment) -> Self {
        Self {
            env,
            vars: BTreeMap::new(),
        }
    }

    /// Keep the inherited value of `key` if set, else assign `value`.
    /// Returns the effective value.
    ///
    /// A non-UTF-8 inherited value is left out of the bindings so the job
    /// body inherits the original bytes; its lossy form is returned.
    pub(crate) fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) -> String {
        let key = key.into();
        if let Some(lossy) = self.env.opaque(&key) {
            return lossy.to_string();
        }
        let effective = match self.env.get(&key) {
            Some(existing) => existing.to_string(),
            None => value.into(),
        };
        self.vars.insert(key, effective.clone());
        effective
    }

    /// Inherited value, then placeholder, then `fallback`.
    pub(crate) fn default_or_placeholder(
        &mut self,
        key: &str,
        placeholder: Option<&str>,
        fallback: &str,
    ) -> String {
        self.set_default(key, placeholder.unwrap_or(fallback))
    }

    /// Assign regardless of the inherited environment.
    pub(crate) fn force(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Value assigned so far in this build, falling back to the environment.
    pub(crate) fn lookup(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| self.env.get(key).or_else(|| self.env.opaque(key)).map(str::to_string))
    }

    pub(crate) fn finish(self) -> PathBindings {
        PathBindings { vars: self.vars }
    }
}
