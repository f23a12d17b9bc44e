use crate::config::ConfigError;

/// A single lexical token of configuration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub line: usize,
    pub quoted: bool,
}

impl Token {
    pub fn new(text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            line,
            quoted: false,
        }
    }

    pub(crate) fn is_block_open(&self) -> bool {
        !self.quoted && self.text == "{"
    }

    pub(crate) fn is_block_close(&self) -> bool {
        !self.quoted && self.text == "}"
    }
}

/// Splits configuration text into tokens.
///
/// Tokens are separated by whitespace. Double quotes group a token that may
/// contain whitespace (`\"` escapes a quote inside it), and `#` at the start
/// of a token comments out the rest of the line.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ConfigError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        if c == '\n' {
            line += 1;
            chars.next();
            continue;
        }

        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '#' {
            while let Some(&c) = chars.peek() {
                if c == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }

        if c == '"' {
            let start_line = line;
            chars.next();

            let mut text = String::new();
            let mut closed = false;

            while let Some(c) = chars.next() {
                match c {
                    '\\' if chars.peek() == Some(&'"') => {
                        text.push('"');
                        chars.next();
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\n' => {
                        line += 1;
                        text.push(c);
                    }
                    _ => text.push(c),
                }
            }

            if !closed {
                return Err(ConfigError::UnterminatedQuote { line: start_line });
            }

            tokens.push(Token {
                text,
                line: start_line,
                quoted: true,
            });
            continue;
        }

        let mut text = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            text.push(c);
            chars.next();
        }

        tokens.push(Token::new(text, line));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect()
    }

    #[test]
    fn test_tokenize_lines() {
        let tokens = tokenize("php_server {\n\troot /srv/app\n}\n").unwrap();

        assert_eq!(texts(&tokens), ["php_server", "{", "root", "/srv/app", "}"]);
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[2].line, 2);
        assert_eq!(tokens[4].line, 3);
    }

    #[test]
    fn test_tokenize_quoted() {
        let tokens = tokenize(r#"env GREETING "hello \"world\"""#).unwrap();

        assert_eq!(tokens[2].text, r#"hello "world""#);
        assert!(tokens[2].quoted);
        assert!(!tokens[0].quoted);
    }

    #[test]
    fn test_quoted_brace_is_not_a_block() {
        let tokens = tokenize(r#"env BRACE "{""#).unwrap();
        assert!(!tokens[2].is_block_open());
    }

    #[test]
    fn test_tokenize_comments() {
        let tokens = tokenize("# leading\nphp_server # trailing\n").unwrap();

        assert_eq!(texts(&tokens), ["php_server"]);
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn test_placeholder_is_single_token() {
        let tokens = tokenize("root {http.vars.root}").unwrap();
        assert_eq!(texts(&tokens), ["root", "{http.vars.root}"]);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = tokenize("env A \"oops\n").unwrap_err();
        assert_eq!(err, ConfigError::UnterminatedQuote { line: 1 });
    }
}
