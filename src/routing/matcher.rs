//! Request matchers.
//!
//! A [`MatcherSet`] combines the matchers it holds with AND semantics; an
//! absent matcher is not evaluated. Matchers that resolve something (the
//! file matcher) publish what they found through the replacer.

use std::path::{Path, PathBuf};

use http::Request;
use serde::Serialize;

use crate::config::{ConfigError, ROOT_PLACEHOLDER};
use crate::directive::Directive;
use crate::execution::split_pos;
use crate::replacer::{self, Replacer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatcherSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileMatcher>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not: Vec<MatcherSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathMatcher>,
}

impl MatcherSet {
    pub fn path(matcher: PathMatcher) -> Self {
        Self {
            path: Some(matcher),
            ..Default::default()
        }
    }

    pub fn file(matcher: FileMatcher) -> Self {
        Self {
            file: Some(matcher),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn and_not(mut self, negated: MatcherSet) -> Self {
        self.not.push(negated);
        self
    }

    /// Reads a named matcher definition: `@name path <patterns...>` or a
    /// block holding `path` and `not path` lines.
    pub fn from_definition(directive: &Directive) -> Result<Self, ConfigError> {
        let mut set = MatcherSet::default();

        if !directive.args.is_empty() {
            set.apply_line(directive, &directive.args)?;
        }

        for entry in &directive.block {
            let mut line = Vec::with_capacity(entry.args.len() + 1);
            line.push(entry.name.clone());
            line.extend(entry.args.iter().cloned());
            set.apply_line(entry, &line)?;
        }

        if set == MatcherSet::default() {
            return Err(ConfigError::argument_count(directive));
        }

        Ok(set)
    }

    fn apply_line(
        &mut self,
        directive: &Directive,
        tokens: &[String],
    ) -> Result<(), ConfigError> {
        match tokens {
            [kind, patterns @ ..] if kind == "path" && !patterns.is_empty() => {
                self.path = Some(PathMatcher::new(patterns));
            }
            [not, kind, patterns @ ..]
                if not == "not" && kind == "path" && !patterns.is_empty() =>
            {
                self.not
                    .push(MatcherSet::path(PathMatcher::new(patterns)));
            }
            [kind, ..] if kind == "path" || kind == "not" => {
                return Err(ConfigError::argument_count(directive));
            }
            [kind, ..] => {
                return Err(ConfigError::invalid_value(
                    directive,
                    kind.as_str(),
                    "only 'path' and 'not path' matchers are supported",
                ));
            }
            [] => return Err(ConfigError::argument_count(directive)),
        }
        Ok(())
    }

    /// Evaluates every matcher in the set against the request.
    pub fn matches<B>(&self, req: &Request<B>, replacer: &mut Replacer) -> bool {
        if let Some(path) = &self.path {
            if !path.matches(req.uri().path()) {
                return false;
            }
        }

        if self
            .not
            .iter()
            .any(|set| set.matches(req, replacer))
        {
            return false;
        }

        if let Some(file) = &self.file {
            if !file.matches(replacer) {
                return false;
            }
        }

        true
    }
}

/// Case-insensitive path patterns: exact, `prefix*`, `*suffix`, `*infix*`
/// or `*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathMatcher(Vec<String>);

impl PathMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            patterns
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    /// `*<ext>` for every extension.
    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            extensions
                .into_iter()
                .map(|ext| format!("*{}", ext.as_ref())),
        )
    }

    pub fn patterns(&self) -> &[String] {
        &self.0
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.to_ascii_lowercase();

        self.0.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }

            let leading = pattern.starts_with('*');
            let trailing = pattern.len() > 1 && pattern.ends_with('*');

            match (leading, trailing) {
                (true, true) => path.contains(&pattern[1..pattern.len() - 1]),
                (true, false) => path.ends_with(&pattern[1..]),
                (false, true) => path.starts_with(&pattern[..pattern.len() - 1]),
                (false, false) => path == *pattern,
            }
        })
    }
}

/// Matches when one of `try_files` names an existing regular file.
///
/// Candidates are placeholder-expanded and cut right after the first split
/// marker they contain, so `/index.php/extra` is looked up as `/index.php`.
/// The first existing candidate wins and is published as
/// `http.matchers.file.relative` and `http.matchers.file.absolute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileMatcher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    pub try_files: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub split_path: Vec<String>,
}

impl FileMatcher {
    pub fn matches(&self, replacer: &mut Replacer) -> bool {
        let root = replacer.replace_all(
            self.root
                .as_deref()
                .unwrap_or(ROOT_PLACEHOLDER),
            ".",
        );

        for pattern in &self.try_files {
            let mut candidate = replacer.replace_all(pattern, "");

            if let Some(pos) = split_pos(&candidate, &self.split_path) {
                candidate.truncate(pos);
            }

            let relative = clean_path(&candidate);
            let absolute = join_root(Path::new(&root), &relative);

            #[cfg(feature = "tracing")]
            tracing::trace!(
                candidate = %absolute.display(),
                "Trying file"
            );

            if absolute.is_file() {
                replacer
                    .set(replacer::FILE_MATCH_RELATIVE, relative)
                    .set(
                        replacer::FILE_MATCH_ABSOLUTE,
                        absolute.to_string_lossy(),
                    );
                return true;
            }
        }

        false
    }
}

/// Normalizes a URL path: rooted, no empty, `.` or `..` segments.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }

    if cleaned.is_empty() {
        cleaned.push('/');
    }

    cleaned
}

/// Joins a cleaned URL path under `root`; the result never leaves `root`.
pub fn join_root(root: &Path, cleaned: &str) -> PathBuf {
    root.join(cleaned.trim_start_matches('/'))
}
