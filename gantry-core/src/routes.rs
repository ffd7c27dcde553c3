//! # Route Table
//!
//! Maps HTTP verb + path pairs onto fully qualified gRPC method names.
//!
//! Templates follow the `google.api.http` path grammar: literal segments,
//! single-segment wildcards (`*` or `{name}`, also spelled `{name=*}`), and a
//! trailing multi-segment wildcard (`**` or `{name=**}`) that also matches an
//! empty remainder. Lookup prefers literal segments over wildcards at every
//! position and backtracks when a literal branch dead-ends, so `/v1/items/all`
//! and `/v1/items/{id}` coexist with the literal winning.
//!
//! The table is a plain value. Cloning it yields a fully independent copy,
//! which is what lets routing snapshots be rebuilt off to the side and
//! published atomically.

use std::collections::HashMap;

use http::Method;

/// Route registration failure.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Invalid path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: &'static str },

    #[error(
        "Duplicate route {verb} '{template}': already bound to '{existing}', cannot bind '{method}'"
    )]
    Conflict {
        verb: Method,
        template: String,
        existing: String,
        method: String,
    },
}

/// A successful lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    /// Full gRPC method name, e.g. `/library.v1.LibraryService/GetItem`.
    pub method: String,
    /// Values captured by the template's named wildcards, keyed by variable
    /// name. A `{name=**}` capture may be empty.
    pub variables: HashMap<String, String>,
}

/// Verb-aware path trie.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    root: Node,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `verb` + `template` to `method`.
    ///
    /// Re-adding an identical binding is a no-op; binding a template some
    /// other method already owns under the same verb is a conflict. The same
    /// template may be bound under different verbs.
    pub fn add_rule(
        &mut self,
        verb: Method,
        template: &str,
        method: &str,
    ) -> Result<(), RouteError> {
        let parsed = Template::parse(template)?;

        let mut node = &mut self.root;
        for segment in &parsed.segments {
            node = match segment {
                Segment::Literal(text) => node.literals.entry(text.clone()).or_default(),
                Segment::Wildcard(_) => node.wildcard.get_or_insert_with(Box::default).as_mut(),
            };
        }

        let slot = if parsed.rest.is_some() {
            &mut node.catch_all
        } else {
            &mut node.leaves
        };
        if let Some(existing) = slot.get(&verb) {
            if existing.method == method {
                return Ok(());
            }
            return Err(RouteError::Conflict {
                verb,
                template: template.to_owned(),
                existing: existing.method.clone(),
                method: method.to_owned(),
            });
        }
        slot.insert(
            verb,
            Leaf {
                method: method.to_owned(),
                vars: parsed.vars,
                rest: parsed.rest.flatten(),
            },
        );
        Ok(())
    }

    /// Resolves a request path against the table.
    pub fn lookup(&self, verb: &Method, path: &str) -> Option<RouteMatch> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut captured = Vec::new();
        let (leaf, rest) = self.root.find(verb, &segments, &mut captured)?;

        let mut variables = HashMap::new();
        for (name, value) in leaf.vars.iter().zip(captured) {
            if let Some(name) = name {
                variables.insert(name.clone(), value.to_owned());
            }
        }
        if let (Some(name), Some(value)) = (&leaf.rest, rest) {
            variables.insert(name.clone(), value);
        }
        Some(RouteMatch {
            method: leaf.method.clone(),
            variables,
        })
    }

    /// Removes every binding that targets `method`, pruning emptied branches
    /// so stale wildcard nodes cannot shadow later inserts.
    pub fn remove_method(&mut self, method: &str) {
        self.root.prune(method);
    }
}

#[derive(Clone, Debug, Default)]
struct Node {
    literals: HashMap<String, Node>,
    /// Single-segment wildcard child.
    wildcard: Option<Box<Node>>,
    /// Terminals for templates ending exactly here, per verb.
    leaves: HashMap<Method, Leaf>,
    /// Terminals for templates ending in `**` here, per verb.
    catch_all: HashMap<Method, Leaf>,
}

#[derive(Clone, Debug)]
struct Leaf {
    method: String,
    /// Capture name of each single-segment wildcard on the path here, in
    /// order; `None` for anonymous `*`.
    vars: Vec<Option<String>>,
    /// Capture name of the `**` tail, for catch-all leaves.
    rest: Option<String>,
}

impl Node {
    /// Depth-first match. Returns the leaf plus the joined remainder when a
    /// catch-all terminal won; `captured` collects one segment per wildcard
    /// hop on the winning path.
    fn find<'n, 'p>(
        &'n self,
        verb: &Method,
        segments: &[&'p str],
        captured: &mut Vec<&'p str>,
    ) -> Option<(&'n Leaf, Option<String>)> {
        let Some((&head, tail)) = segments.split_first() else {
            if let Some(leaf) = self.leaves.get(verb) {
                return Some((leaf, None));
            }
            // A trailing `**` also matches the empty remainder.
            return self.catch_all.get(verb).map(|leaf| (leaf, Some(String::new())));
        };

        if let Some(child) = self.literals.get(head)
            && let Some(hit) = child.find(verb, tail, captured)
        {
            return Some(hit);
        }

        if let Some(child) = &self.wildcard {
            captured.push(head);
            if let Some(hit) = child.find(verb, tail, captured) {
                return Some(hit);
            }
            captured.pop();
        }

        self.catch_all
            .get(verb)
            .map(|leaf| (leaf, Some(segments.join("/"))))
    }

    fn prune(&mut self, method: &str) {
        self.leaves.retain(|_, leaf| leaf.method != method);
        self.catch_all.retain(|_, leaf| leaf.method != method);
        self.literals.retain(|_, child| {
            child.prune(method);
            !child.is_empty()
        });
        if let Some(child) = &mut self.wildcard {
            child.prune(method);
            if child.is_empty() {
                self.wildcard = None;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.leaves.is_empty()
            && self.catch_all.is_empty()
            && self.literals.is_empty()
            && self.wildcard.is_none()
    }
}

enum Segment {
    Literal(String),
    Wildcard(Option<String>),
}

struct Template {
    segments: Vec<Segment>,
    vars: Vec<Option<String>>,
    /// `Some` when the template ends in `**`; the inner value is its capture
    /// name, if any.
    rest: Option<Option<String>>,
}

impl Template {
    fn parse(template: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &'static str| RouteError::InvalidTemplate {
            template: template.to_owned(),
            reason,
        };

        let Some(stripped) = template.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let mut parsed = Self {
            segments: Vec::new(),
            vars: Vec::new(),
            rest: None,
        };
        if stripped.is_empty() {
            // "/" on its own: matches the empty path.
            return Ok(parsed);
        }

        for piece in stripped.split('/') {
            if parsed.rest.is_some() {
                return Err(invalid("'**' must be the final segment"));
            }
            match piece {
                "" => return Err(invalid("empty segment")),
                "*" => {
                    parsed.segments.push(Segment::Wildcard(None));
                    parsed.vars.push(None);
                }
                "**" => parsed.rest = Some(None),
                _ if piece.starts_with('{') => {
                    let inner = piece
                        .strip_prefix('{')
                        .and_then(|p| p.strip_suffix('}'))
                        .ok_or_else(|| invalid("unterminated '{'"))?;
                    let (name, sub_pattern) = match inner.split_once('=') {
                        Some((name, sub_pattern)) => (name, Some(sub_pattern)),
                        None => (inner, None),
                    };
                    if name.is_empty() {
                        return Err(invalid("variable name is empty"));
                    }
                    if name.contains(['{', '}', '*']) {
                        return Err(invalid("malformed variable name"));
                    }
                    if parsed.names().any(|existing| existing == name) {
                        return Err(invalid("duplicate variable name"));
                    }
                    match sub_pattern {
                        None | Some("*") => {
                            parsed.segments.push(Segment::Wildcard(Some(name.to_owned())));
                            parsed.vars.push(Some(name.to_owned()));
                        }
                        Some("**") => parsed.rest = Some(Some(name.to_owned())),
                        Some(_) => return Err(invalid("unsupported variable sub-pattern")),
                    }
                }
                _ if piece.contains(['{', '}', '*']) => {
                    return Err(invalid("wildcards cannot be embedded in a literal segment"));
                }
                _ => parsed.segments.push(Segment::Literal(piece.to_owned())),
            }
        }
        Ok(parsed)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.vars
            .iter()
            .flatten()
            .chain(self.rest.iter().flatten())
            .map(String::as_str)
    }
}
