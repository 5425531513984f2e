//! Ordered include/exclude filter rules.
//!
//! Rules follow rsync's filter semantics: patterns are anchored at the
//! transfer root by a leading `/`, a trailing `/` restricts a rule to
//! directories, `*` never crosses a `/`, and the first matching rule decides.
//! A path whose ancestor directory is excluded is never reached.

use std::collections::HashSet;
use std::fmt;

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::error::PartitionError;

const WILDCARDS: [char; 3] = ['*', '?', '['];

/// Whether a rule admits or rejects what it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterAction {
    Include,
    Exclude,
}

impl FilterAction {
    fn symbol(self) -> char {
        match self {
            Self::Include => '+',
            Self::Exclude => '-',
        }
    }
}

/// One `+ pattern` or `- pattern` line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterRule {
    pub action: FilterAction,
    pub pattern: String,
}

impl FilterRule {
    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Include,
            pattern: pattern.into(),
        }
    }

    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Exclude,
            pattern: pattern.into(),
        }
    }

    /// Parse a `+ pattern` / `- pattern` line.
    pub fn parse(line: &str) -> Result<Self, PartitionError> {
        let invalid = |message: &str| PartitionError::InvalidRule {
            rule: line.to_string(),
            message: message.to_string(),
        };

        let (action, pattern) = match line.split_once(' ') {
            Some(("+", pattern)) => (FilterAction::Include, pattern),
            Some(("-", pattern)) => (FilterAction::Exclude, pattern),
            _ => return Err(invalid("expected '+ ' or '- ' prefix")),
        };
        if pattern.is_empty() {
            return Err(invalid("empty pattern"));
        }

        Ok(Self {
            action,
            pattern: pattern.to_string(),
        })
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.symbol(), self.pattern)
    }
}

/// Turn a raw anchored path plus suffix into a rule pattern.
///
/// Wildcard characters in names are backslash-escaped. Backslashes are only
/// escaped when the pattern ends up containing a wildcard, since that is the
/// only time rsync treats them as escapes.
pub(crate) fn to_pattern(raw: &str, suffix: &str) -> String {
    if suffix.is_empty() && !raw.contains(WILDCARDS) {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len() + suffix.len() + 4);
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str(suffix);
    out
}

/// Accumulates the filter rules of one bucket.
///
/// `path` arguments are the directory stack of the walk: `"/"` followed by
/// one `"name/"` component per level. `handled` holds, per level, the
/// anchored paths of children already claimed by this or an earlier bucket.
#[derive(Debug, Default)]
pub struct FilterRuleBuilder {
    rules: Vec<FilterRule>,
    last_path: Vec<String>,
    included: HashSet<String>,
    excluded: HashSet<String>,
}

impl FilterRuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules emitted so far, in order.
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    fn add_include(&mut self, pattern: String) {
        debug_assert!(!self.excluded.contains(&pattern));
        if self.included.insert(pattern.clone()) {
            self.rules.push(FilterRule::include(pattern));
        }
    }

    fn add_exclude(&mut self, pattern: String) {
        if self.included.contains(&pattern) || self.excluded.contains(&pattern) {
            return;
        }
        self.excluded.insert(pattern.clone());
        self.rules.push(FilterRule::exclude(pattern));
    }

    /// Make every directory on `path` reachable and shut out what earlier
    /// buckets already claimed at each level.
    pub fn ensure_ancestors(&mut self, path: &[String], handled: &[Vec<String>]) {
        let mut diverged = false;
        for depth in 0..path.len() {
            if diverged || self.last_path.get(depth) != Some(&path[depth]) {
                diverged = true;
                self.add_include(to_pattern(&path[..=depth].concat(), ""));
            }
            if let Some(done) = handled.get(depth) {
                for item in done {
                    self.add_exclude(to_pattern(item, ""));
                }
            }
        }
        self.last_path = path.to_vec();
    }

    /// Claim one child of the current directory. `item` is its anchored path.
    pub fn include_item(&mut self, path: &[String], handled: &[Vec<String>], item: &str) {
        self.ensure_ancestors(path, handled);
        self.add_include(to_pattern(item, ""));
    }

    /// Claim everything left in the current directory.
    pub fn include_remaining(&mut self, path: &[String], handled: &[Vec<String>]) {
        self.ensure_ancestors(path, handled);
        self.add_include(to_pattern(&path.concat(), "*"));
    }

    /// Close the bucket: nothing else under `path` or its ancestors belongs here.
    pub fn finish(&mut self, path: &[String]) {
        for depth in (1..=path.len()).rev() {
            self.add_exclude(to_pattern(&path[..depth].concat(), "*"));
        }
    }
}

#[derive(Debug)]
enum Matcher {
    Literal(String),
    Glob(GlobMatcher),
}

#[derive(Debug)]
struct CompiledRule {
    action: FilterAction,
    dir_only: bool,
    matcher: Matcher,
}

impl CompiledRule {
    fn matches(&self, anchored: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        match &self.matcher {
            Matcher::Literal(pattern) => pattern == anchored,
            Matcher::Glob(glob) => glob.is_match(anchored),
        }
    }
}

/// Rewrite an rsync pattern for globset, where braces and commas are
/// alternation syntax rather than literals.
fn glob_source(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 2);
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if matches!(c, '{' | '}' | ',') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Compiled rule list that decides whether a path would be transferred.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules for evaluation.
    pub fn compile(rules: &[FilterRule]) -> Result<Self, PartitionError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let (body, dir_only) = match rule.pattern.strip_suffix('/') {
                Some(body) => (body, true),
                None => (rule.pattern.as_str(), false),
            };

            // Only the root itself; never matched by anything below it.
            if body.is_empty() {
                continue;
            }

            let matcher = if body.contains(WILDCARDS) {
                let glob = GlobBuilder::new(&glob_source(body))
                    .literal_separator(true)
                    .backslash_escape(true)
                    .build()
                    .map_err(|e| PartitionError::InvalidRule {
                        rule: rule.to_string(),
                        message: e.to_string(),
                    })?;
                Matcher::Glob(glob.compile_matcher())
            } else {
                Matcher::Literal(body.to_string())
            };

            compiled.push(CompiledRule {
                action: rule.action,
                dir_only,
                matcher,
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Parse and compile a rule file's contents. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, PartitionError> {
        let rules = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(FilterRule::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Self::compile(&rules)
    }

    fn decide(&self, anchored: &str, is_dir: bool) -> Option<FilterAction> {
        self.rules
            .iter()
            .find(|rule| rule.matches(anchored, is_dir))
            .map(|rule| rule.action)
    }

    /// Whether a root-relative path is transferred. A trailing `/` marks a
    /// directory. Unmatched paths are included.
    pub fn allows(&self, path: &str) -> bool {
        let is_dir = path.ends_with('/');
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return true;
        }

        let components: Vec<&str> = trimmed.split('/').collect();
        let mut anchored = String::with_capacity(trimmed.len() + 1);
        for (i, component) in components.iter().enumerate() {
            anchored.push('/');
            anchored.push_str(component);
            let component_is_dir = i + 1 < components.len() || is_dir;
            if self.decide(&anchored, component_is_dir) == Some(FilterAction::Exclude) {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
