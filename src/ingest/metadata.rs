//! License metadata records — the text format written next to every build target
//!
//! A record is a flat list of `key: value` lines with two kinds of nested
//! block, `deps` and `install_map`:
//!
//! ```text
//! package_name: "Android"
//! license_kinds: "SPDX-license-identifier-Apache-2.0"
//! license_conditions: "notice"
//! is_container: true
//! deps: {
//!   file: "out/libfoo.so.meta_lic"
//!   annotations: "dynamic"
//! }
//! ```
//!
//! Strings are double-quoted with `\"`, `\\`, `\n` and `\t` escapes;
//! booleans are bare. Blank lines and `#` comments are ignored. Anything
//! else is malformed input, reported with the file and 1-based line.

use crate::{MetalicError, MetalicResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static BLOCK_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:?\s*\{\s*$").expect("valid block pattern")
});

static BLOCK_CLOSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\}\s*$").expect("valid block close pattern")
});

static FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(\S.*?)\s*$").expect("valid field pattern")
});

// ─── Records ────────────────────────────────────────────────────────

/// A dependency as written in a record: the metadata file depended on and
/// the annotations on the edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub file: String,
    pub annotations: Vec<String>,
}

/// One parsed metadata file, before it is linked into a graph.
///
/// Condition names are kept as written; they are resolved against the
/// license kinds when the graph is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub name: String,
    pub package_name: String,
    pub module_types: Vec<String>,
    pub module_classes: Vec<String>,
    pub projects: Vec<String>,
    pub license_kinds: Vec<String>,
    pub license_conditions: Vec<String>,
    pub license_texts: Vec<String>,
    pub is_container: bool,
    pub built: Vec<String>,
    pub installed: Vec<String>,
    /// (from_path, container_path) pairs
    pub install_map: Vec<(String, String)>,
    pub sources: Vec<String>,
    pub deps: Vec<DependencyRecord>,
}

impl TargetRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn package(mut self, package_name: &str) -> Self {
        self.package_name = package_name.to_string();
        self
    }

    pub fn kinds(mut self, kinds: &[&str]) -> Self {
        self.license_kinds.extend(kinds.iter().map(|s| s.to_string()));
        self
    }

    pub fn conditions(mut self, names: &[&str]) -> Self {
        self.license_conditions.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn texts(mut self, texts: &[&str]) -> Self {
        self.license_texts.extend(texts.iter().map(|s| s.to_string()));
        self
    }

    pub fn container(mut self, is_container: bool) -> Self {
        self.is_container = is_container;
        self
    }

    pub fn installed(mut self, paths: &[&str]) -> Self {
        self.installed.extend(paths.iter().map(|s| s.to_string()));
        self
    }

    pub fn dep(mut self, file: &str, annotations: &[&str]) -> Self {
        self.deps.push(DependencyRecord {
            file: file.to_string(),
            annotations: annotations.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Parse the metadata text of the file `name`.
    pub fn parse(name: &str, text: &str) -> MetalicResult<Self> {
        Parser::new(name).run(text)
    }
}

// ─── Parser ─────────────────────────────────────────────────────────

enum Block {
    Top,
    Dep(DependencyRecord, usize),
    InstallMap(Option<String>, Option<String>, usize),
}

struct Parser<'a> {
    file: &'a str,
    record: TargetRecord,
    block: Block,
}

impl<'a> Parser<'a> {
    fn new(file: &'a str) -> Self {
        Self {
            file,
            record: TargetRecord::new(file),
            block: Block::Top,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> MetalicError {
        MetalicError::MalformedInput {
            file: self.file.to_string(),
            line,
            message: message.into(),
        }
    }

    fn run(mut self, text: &str) -> MetalicResult<TargetRecord> {
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if BLOCK_CLOSE.is_match(raw) {
                self.close_block(line)?;
                continue;
            }

            if let Some(caps) = BLOCK_OPEN.captures(raw) {
                self.open_block(line, &caps[1])?;
                continue;
            }

            let Some(caps) = FIELD.captures(raw) else {
                return Err(self.error(line, format!("unparseable line {:?}", raw)));
            };
            let key = caps[1].to_string();
            let value = parse_value(&caps[2]).map_err(|msg| self.error(line, msg))?;
            self.field(line, &key, value)?;
        }

        match self.block {
            Block::Top => Ok(self.record),
            Block::Dep(_, opened) | Block::InstallMap(_, _, opened) => {
                Err(self.error(opened, "unterminated block"))
            }
        }
    }

    fn open_block(&mut self, line: usize, key: &str) -> MetalicResult<()> {
        if !matches!(self.block, Block::Top) {
            return Err(self.error(line, format!("nested block {:?}", key)));
        }
        self.block = match key {
            "deps" => Block::Dep(DependencyRecord::default(), line),
            "install_map" => Block::InstallMap(None, None, line),
            other => return Err(self.error(line, format!("unknown block {:?}", other))),
        };
        Ok(())
    }

    fn close_block(&mut self, line: usize) -> MetalicResult<()> {
        match std::mem::replace(&mut self.block, Block::Top) {
            Block::Top => Err(self.error(line, "unbalanced '}'")),
            Block::Dep(dep, _) => {
                if dep.file.is_empty() {
                    return Err(self.error(line, "dependency without file"));
                }
                self.record.deps.push(dep);
                Ok(())
            }
            Block::InstallMap(Some(from), Some(to), _) => {
                self.record.install_map.push((from, to));
                Ok(())
            }
            Block::InstallMap(..) => Err(self.error(line, "install_map needs from_path and container_path")),
        }
    }

    fn field(&mut self, line: usize, key: &str, value: Value) -> MetalicResult<()> {
        if matches!(self.block, Block::Top) {
            return self.top_field(line, key, value);
        }
        let text = value.string().map_err(|m| self.error(line, m));
        let file = self.file;
        let fail = |message: String| MetalicError::MalformedInput {
            file: file.to_string(),
            line,
            message,
        };
        match &mut self.block {
            Block::Dep(dep, _) => match key {
                "file" => {
                    if !dep.file.is_empty() {
                        return Err(fail("dependency has two files".to_string()));
                    }
                    dep.file = text?;
                }
                "annotations" => dep.annotations.push(text?),
                other => return Err(fail(format!("unknown dependency key {:?}", other))),
            },
            Block::InstallMap(from, to, _) => match key {
                "from_path" => *from = Some(text?),
                "container_path" => *to = Some(text?),
                other => return Err(fail(format!("unknown install_map key {:?}", other))),
            },
            Block::Top => {}
        }
        Ok(())
    }

    fn top_field(&mut self, line: usize, key: &str, value: Value) -> MetalicResult<()> {
        if key == "is_container" {
            self.record.is_container = match value {
                Value::Bare(ref b) if b == "true" => true,
                Value::Bare(ref b) if b == "false" => false,
                other => return Err(self.error(line, format!("invalid boolean is_container {}", other))),
            };
            return Ok(());
        }

        let s = value.string().map_err(|m| self.error(line, m))?;
        let r = &mut self.record;
        match key {
            "package_name" => {
                if !r.package_name.is_empty() {
                    let msg = format!("too many package names {:?} and {:?}", r.package_name, s);
                    return Err(self.error(line, msg));
                }
                r.package_name = s;
            }
            "module_types" => r.module_types.push(s),
            "module_classes" => r.module_classes.push(s),
            "projects" => r.projects.push(s),
            "license_kinds" => r.license_kinds.push(s),
            "license_conditions" => r.license_conditions.push(s),
            "license_texts" => r.license_texts.push(s),
            "built" => r.built.push(s),
            "installed" => r.installed.push(s),
            "sources" => r.sources.push(s),
            other => return Err(self.error(line, format!("unknown metadata key {:?}", other))),
        }
        Ok(())
    }
}

// ─── Values ─────────────────────────────────────────────────────────

enum Value {
    Quoted(String),
    Bare(String),
}

impl Value {
    fn string(self) -> Result<String, String> {
        match self {
            Value::Quoted(s) => Ok(s),
            Value::Bare(b) => Err(format!("expected quoted string, found {}", b)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Quoted(s) => write!(f, "{:?}", s),
            Value::Bare(b) => f.write_str(b),
        }
    }
}

fn parse_value(raw: &str) -> Result<Value, String> {
    let Some(body) = raw.strip_prefix('"') else {
        if raw.contains('"') || raw.contains(char::is_whitespace) {
            return Err(format!("invalid bare value {:?}", raw));
        }
        return Ok(Value::Bare(raw.to_string()));
    };

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let rest: String = chars.collect();
                if !rest.trim().is_empty() {
                    return Err(format!("trailing text after string: {:?}", rest));
                }
                return Ok(Value::Quoted(out));
            }
            '\\' => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => return Err(format!("unknown escape \\{}", other)),
                None => return Err("unterminated escape".to_string()),
            },
            other => out.push(other),
        }
    }
    Err(format!("unterminated string {:?}", raw))
}
