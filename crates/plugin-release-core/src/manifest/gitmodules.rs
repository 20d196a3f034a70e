//! `.gitmodules` registry
//!
//! Only the subset of git's config syntax that `git submodule add` writes is
//! understood: `[submodule "name"]` headers followed by `key = value` lines.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{PublishError, Result};
use crate::manifest::atomic::atomic_write;

/// Default submodule registry file name at the repository root
pub const GITMODULES_FILE: &str = ".gitmodules";

/// One `[submodule "..."]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleEntry {
    pub name: String,
    pub path: String,
    pub url: Option<String>,
    /// Remaining keys such as `branch` or `shallow`
    pub extra: BTreeMap<String, String>,
}

impl SubmoduleEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>, url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            url: url.map(str::to_string),
            extra: BTreeMap::new(),
        }
    }
}

/// Parsed `.gitmodules`, keyed and iterated by submodule name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitModules {
    entries: BTreeMap<String, SubmoduleEntry>,
}

impl GitModules {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let parse_error = |line: usize, message: &str| PublishError::Parse {
            path: origin.to_path_buf(),
            message: format!("line {}: {}", line + 1, message),
        };

        let mut sections: Vec<(usize, String, BTreeMap<String, String>)> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let name = parse_section_header(line)
                    .ok_or_else(|| parse_error(idx, "expected `[submodule \"<name>\"]`"))?;
                sections.push((idx, name, BTreeMap::new()));
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| parse_error(idx, "expected `key = value`"))?;
            let (_, name, fields) = sections
                .last_mut()
                .ok_or_else(|| parse_error(idx, "key outside of a submodule section"))?;
            let key = key.trim();
            if fields.contains_key(key) {
                return Err(parse_error(
                    idx,
                    &format!("duplicate key `{key}` in submodule \"{name}\""),
                ));
            }
            let value = strip_inline_comment(value).trim();
            fields.insert(key.to_string(), unquote(value).to_string());
        }

        let mut entries = BTreeMap::new();
        for (idx, name, mut fields) in sections {
            let path = fields
                .remove("path")
                .ok_or_else(|| parse_error(idx, &format!("submodule \"{name}\" has no path")))?;
            let url = fields.remove("url").filter(|url| !url.is_empty());
            let entry = SubmoduleEntry {
                name: name.clone(),
                path,
                url,
                extra: fields,
            };
            if entries.insert(name.clone(), entry).is_some() {
                return Err(parse_error(idx, &format!("duplicate submodule \"{name}\"")));
            }
        }

        Ok(Self { entries })
    }

    pub fn insert(&mut self, entry: SubmoduleEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&SubmoduleEntry> {
        self.entries.get(name)
    }

    /// Find the submodule checked out at `path`
    pub fn by_path(&self, path: &str) -> Option<&SubmoduleEntry> {
        let wanted = path.trim_end_matches('/');
        self.entries.values().find(|entry| entry.path == wanted)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubmoduleEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render sections in ascending name order, git's tab-indented layout
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in self.entries.values() {
            out.push_str(&format!("[submodule \"{}\"]\n", entry.name));
            out.push_str(&format!("\tpath = {}\n", quote_if_needed(&entry.path)));
            if let Some(url) = &entry.url {
                out.push_str(&format!("\turl = {}\n", quote_if_needed(url)));
            }
            for (key, value) in &entry.extra {
                out.push_str(&format!("\t{} = {}\n", key, quote_if_needed(value)));
            }
        }
        out
    }
}

fn parse_section_header(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let (kind, name) = inner.split_once(char::is_whitespace)?;
    if kind != "submodule" {
        return None;
    }
    let name = name.trim().strip_prefix('"')?.strip_suffix('"')?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Cut a trailing `#` or `;` comment that is not inside double quotes
fn strip_inline_comment(value: &str) -> &str {
    let mut in_quotes = false;
    for (idx, ch) in value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' | ';' if !in_quotes => return &value[..idx],
            _ => {}
        }
    }
    value
}

fn quote_if_needed(value: &str) -> String {
    if value.contains(['#', ';']) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Rewrite `.gitmodules` in sorted order. Returns whether the file changed.
pub fn sort_gitmodules_file(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)?;
    let sorted = GitModules::parse(&content, path)?.render();
    if sorted == content {
        return Ok(false);
    }

    atomic_write(path, sorted.as_bytes())?;
    tracing::debug!(path = %path.display(), "sorted submodule registry");
    Ok(true)
}
