// Instance-identifier parsing, formatting and resolution.
//
// Grammar (the subset devices use):
//
//   path       = 1*("/" component)
//   component  = [prefix ":"] identifier *predicate
//   predicate  = "[" *WSP key *WSP "=" *WSP quoted *WSP "]"
//   key        = [prefix ":"] identifier / "."
//   quoted     = "'" *(not "'") "'" / DQUOTE *(not DQUOTE) DQUOTE
//
// Positional predicates (`[3]`) are rejected: list entries are addressed by
// key values only.

use std::fmt;
use std::str::FromStr;

use crate::error::{FormatError, SchemaError};
use crate::schema::{SchemaIndex, path};

/// One `key='value'` predicate. `key` is `.` for leaf-list entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Node name as written, possibly module-prefixed.
    pub name: String,
    pub predicates: Vec<Predicate>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePath {
    components: Vec<Component>,
}

/// A key predicate after schema resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub value: String,
    /// SID of the key leaf, when the predicate names a known node.
    pub leaf_sid: Option<u64>,
}

/// An instance path mapped onto the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub sid: u64,
    /// Stripped schema path of the target node.
    pub schema_path: String,
    /// Every predicate along the path, outermost first.
    pub keys: Vec<ResolvedKey>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn fail(&self, reason: &'static str) -> FormatError {
        FormatError::InvalidPath {
            path: self.text.to_string(),
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8, reason: &'static str) -> Result<(), FormatError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.fail(reason))
        }
    }

    fn identifier(&mut self) -> Result<&'a str, FormatError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.fail("expected a node name"));
        }
        let ident = &self.text[start..self.pos];
        if ident.starts_with(|c: char| c.is_ascii_digit()) {
            self.pos = start;
            return Err(self.fail("positional predicates are not supported"));
        }
        if ident.starts_with(':') || ident.ends_with(':') || ident.matches(':').count() > 1 {
            self.pos = start;
            return Err(self.fail("malformed module prefix"));
        }
        Ok(ident)
    }

    fn quoted(&mut self) -> Result<&'a str, FormatError> {
        let quote = match self.peek() {
            Some(q @ (b'\'' | b'"')) => q,
            _ => return Err(self.fail("expected a quoted key value")),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == quote {
                let value = &self.text[start..self.pos];
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(self.fail("unterminated key value"))
    }

    fn predicate(&mut self) -> Result<Predicate, FormatError> {
        self.expect(b'[', "expected '['")?;
        self.skip_ws();
        let key = if self.peek() == Some(b'.') {
            self.pos += 1;
            ".".to_string()
        } else {
            self.identifier()?.to_string()
        };
        self.skip_ws();
        self.expect(b'=', "expected '=' in predicate")?;
        self.skip_ws();
        let value = self.quoted()?.to_string();
        self.skip_ws();
        self.expect(b']', "expected ']'")?;
        Ok(Predicate { key, value })
    }

    fn parse(mut self) -> Result<InstancePath, FormatError> {
        if self.peek() != Some(b'/') {
            return Err(self.fail("must start with '/'"));
        }
        let mut components = Vec::new();
        while self.peek() == Some(b'/') {
            self.pos += 1;
            let name = self.identifier()?.to_string();
            let mut component = Component::new(name);
            while self.peek() == Some(b'[') {
                component.predicates.push(self.predicate()?);
            }
            components.push(component);
        }
        if self.pos != self.bytes.len() {
            return Err(self.fail("unexpected character"));
        }
        Ok(InstancePath { components })
    }
}

impl FromStr for InstancePath {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parser::new(s.trim()).parse()
    }
}

impl InstancePath {
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        text.parse()
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [Component] {
        &mut self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Path without its last `n` components.
    pub fn truncated(&self, n: usize) -> Self {
        let keep = self.components.len().saturating_sub(n);
        Self {
            components: self.components[..keep].to_vec(),
        }
    }

    /// Schema path: component names without predicates.
    pub fn schema_path(&self) -> String {
        let mut out = String::new();
        for c in &self.components {
            out.push('/');
            out.push_str(&c.name);
        }
        out
    }

    /// Every predicate value along the path, outermost first.
    pub fn key_values(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .flat_map(|c| c.predicates.iter().map(|p| p.value.as_str()))
    }

    /// Map the path onto the schema; the last component must resolve.
    ///
    /// Intermediate components without a SID (non-presence containers the
    /// SID file omits) are walked through by name.
    pub fn resolve(&self, index: &SchemaIndex) -> Result<ResolvedPath, SchemaError> {
        self.walk(index, true).map(|(resolved, _)| resolved)
    }

    /// Like [`resolve`](Self::resolve), but stops at the deepest component
    /// that has a SID. Returns the number of trailing components dropped.
    pub fn resolve_nearest(&self, index: &SchemaIndex) -> Result<(ResolvedPath, usize), SchemaError> {
        self.walk(index, false)
    }

    fn walk(&self, index: &SchemaIndex, strict: bool) -> Result<(ResolvedPath, usize), SchemaError> {
        let mut context = String::from("/");
        let mut keys = Vec::new();
        let mut found: Option<(u64, String, usize, usize)> = None;
        let mut last_err = None;

        for (i, component) in self.components.iter().enumerate() {
            let entry = match index.resolve_entry(&component.name, &context) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    if strict && i + 1 == self.components.len() {
                        return Err(e);
                    }
                    last_err = Some(e);
                    None
                }
            };
            context = match entry {
                Some(entry) => entry.stripped_path.clone(),
                None => path::join(&context, &component.name),
            };
            for p in &component.predicates {
                let leaf_sid = if p.key == "." {
                    None
                } else {
                    index.resolve(&p.key, &context).ok()
                };
                keys.push(ResolvedKey {
                    value: p.value.clone(),
                    leaf_sid,
                });
            }
            if let Some(entry) = entry {
                found = Some((entry.sid, context.clone(), keys.len(), i));
            }
        }

        let Some((sid, schema_path, key_count, at)) = found else {
            return Err(last_err.unwrap_or_else(|| SchemaError::UnknownNode {
                name: self.to_string(),
                context: "/".into(),
            }));
        };
        keys.truncate(key_count);
        let dropped = self.components.len() - at - 1;
        Ok((
            ResolvedPath {
                sid,
                schema_path,
                keys,
            },
            dropped,
        ))
    }

    /// Rebuild an instance path from a container address `[sid, key...]`.
    ///
    /// Lists with catalog key tables take their keys first, outermost first.
    /// Keys left over belong to the deepest ancestor-or-self that has
    /// children, named after its first declared children.
    pub fn from_address(
        index: &SchemaIndex,
        sid: u64,
        keys: &[String],
    ) -> Result<Self, SchemaError> {
        let entry = index.entry(sid).ok_or(SchemaError::UnknownSid(sid))?;
        let segs: Vec<&str> = path::segments(&entry.prefixed_path).collect();
        if segs.is_empty() {
            return Err(SchemaError::UnknownSid(sid));
        }

        let mut components: Vec<Component> = segs.iter().map(|s| Component::new(*s)).collect();
        let mut node_sids: Vec<Option<u64>> = Vec::with_capacity(segs.len());
        let mut prefix = String::new();
        for seg in &segs {
            prefix.push('/');
            prefix.push_str(seg);
            node_sids.push(index.sid_of(&prefix));
        }

        let mut remaining = keys;
        for (component, node) in components.iter_mut().zip(&node_sids) {
            if remaining.is_empty() {
                break;
            }
            let Some(names) = node.and_then(|s| index.declared_keys(s)) else {
                continue;
            };
            let take = names.len().min(remaining.len());
            for (name, value) in names.iter().zip(&remaining[..take]) {
                component.predicates.push(Predicate {
                    key: name.clone(),
                    value: value.clone(),
                });
            }
            remaining = &remaining[take..];
        }

        if !remaining.is_empty() {
            let holder = node_sids
                .iter()
                .rposition(|s| s.is_some_and(|s| !index.children(s).is_empty()));
            let at = holder.unwrap_or(components.len() - 1);
            let names = node_sids[at]
                .map(|s| index.key_names(s, remaining.len()))
                .unwrap_or_default();
            for (i, value) in remaining.iter().enumerate() {
                let key = names.get(i).cloned().unwrap_or_else(|| ".".into());
                components[at].predicates.push(Predicate {
                    key,
                    value: value.clone(),
                });
            }
        }

        Ok(Self { components })
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.contains('\'') {
            write!(f, "[{}=\"{}\"]", self.key, self.value)
        } else {
            write!(f, "[{}='{}']", self.key, self.value)
        }
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.components {
            write!(f, "/{}", c.name)?;
            for p in &c.predicates {
                write!(f, "{p}")?;
            }
        }
        Ok(())
    }
}
