//! Directive tree built from configuration tokens.
//!
//! Tokens on the same line form one directive: a name followed by its
//! arguments. A trailing `{` opens a block of subdirectives that runs until the
//! matching `}`. Every node records the block depth it was found at, so callers
//! that only care about one level can say so explicitly instead of relying on a
//! cursor's position.

mod lexer;

pub use lexer::{tokenize, Token};

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    pub block: Vec<Directive>,
    pub nesting: usize,
    pub line: usize,
}

impl Directive {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            block: Vec::new(),
            nesting: 0,
            line,
        }
    }

    /// Parses configuration text into its top-level directives.
    pub fn parse_str(input: &str) -> Result<Vec<Directive>, ConfigError> {
        Self::parse_tokens(&tokenize(input)?)
    }

    /// Folds a token stream into a directive tree.
    pub fn parse_tokens(tokens: &[Token]) -> Result<Vec<Directive>, ConfigError> {
        let mut pos = 0;
        parse_block(tokens, &mut pos, 0, 0)
    }

    /// Subdirectives that sit exactly `nesting` levels below the top level.
    pub fn entries_at(&self, nesting: usize) -> impl Iterator<Item = &Directive> {
        self.block
            .iter()
            .filter(move |d| d.nesting == nesting)
    }

    /// Returns the only argument, failing if there are none or several.
    pub fn single_arg(&self) -> Result<&str, ConfigError> {
        match self.args.as_slice() {
            [arg] => Ok(arg.as_str()),
            _ => Err(ConfigError::argument_count(self)),
        }
    }

    /// Returns every argument, failing if there are none.
    pub fn required_args(&self) -> Result<&[String], ConfigError> {
        if self.args.is_empty() {
            return Err(ConfigError::argument_count(self));
        }
        Ok(&self.args)
    }

    pub fn no_args(&self) -> Result<(), ConfigError> {
        if !self.args.is_empty() {
            return Err(ConfigError::argument_count(self));
        }
        Ok(())
    }

    /// Returns exactly two arguments as a key/value pair.
    pub fn pair_args(&self) -> Result<(&str, &str), ConfigError> {
        match self.args.as_slice() {
            [key, value] => Ok((key.as_str(), value.as_str())),
            _ => Err(ConfigError::argument_count(self)),
        }
    }

    /// A copy of this directive whose block omits entries rejected by `keep`.
    pub fn retain_block<F>(&self, mut keep: F) -> Directive
    where
        F: FnMut(&Directive) -> bool,
    {
        Directive {
            block: self
                .block
                .iter()
                .filter(|d| keep(*d))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }
}

fn parse_block(
    tokens: &[Token],
    pos: &mut usize,
    nesting: usize,
    opened_at: usize,
) -> Result<Vec<Directive>, ConfigError> {
    let mut directives = Vec::new();

    loop {
        let Some(token) = tokens.get(*pos) else {
            if nesting > 0 {
                return Err(ConfigError::UnclosedBlock { line: opened_at });
            }
            return Ok(directives);
        };

        if token.is_block_close() {
            if nesting == 0 {
                return Err(ConfigError::UnexpectedBlockClose {
                    line: token.line,
                });
            }
            *pos += 1;
            return Ok(directives);
        }

        if token.is_block_open() {
            return Err(ConfigError::BlockWithoutDirective { line: token.line });
        }

        let mut directive = Directive::new(token.text.clone(), token.line);
        directive.nesting = nesting;
        *pos += 1;

        while let Some(arg) = tokens.get(*pos) {
            if arg.line != directive.line
                || arg.is_block_open()
                || arg.is_block_close()
            {
                break;
            }
            directive.args.push(arg.text.clone());
            *pos += 1;
        }

        if let Some(open) = tokens.get(*pos) {
            if open.is_block_open() && open.line == directive.line {
                *pos += 1;
                directive.block =
                    parse_block(tokens, pos, nesting + 1, directive.line)?;
            }
        }

        directives.push(directive);
    }
}
