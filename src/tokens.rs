//! Tokenizer for the search box query language.
//!
//! Only spaces and double quotes are structural. A quoted span becomes one
//! exact token; unquoted text splits on single spaces; a bare `AND` or `OR`
//! sets how the previous token combines with the next one.

/// How a token combines with the token that follows it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchToken {
    pub text: String,
    /// The token was written in double quotes.
    pub is_exact: bool,
    /// Operator joining this token to the next one.
    pub operator: Operator,
}

impl SearchToken {
    fn new(text: String, is_exact: bool) -> Self {
        Self {
            text,
            is_exact,
            operator: Operator::And,
        }
    }
}

/// Replace typographic quotes with their ASCII forms.
pub fn normalize_quotes(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect()
}

fn push_token(tokens: &mut Vec<SearchToken>, text: String, is_exact: bool) {
    if text.is_empty() && !is_exact {
        return;
    }

    if !is_exact {
        if text.eq_ignore_ascii_case("or") {
            if let Some(prev) = tokens.last_mut() {
                prev.operator = Operator::Or;
            }
            return;
        }
        if text.eq_ignore_ascii_case("and") {
            return;
        }
    }

    tokens.push(SearchToken::new(text, is_exact));
}

/// Split `input` into search tokens.
///
/// Text after an unclosed quote is dropped entirely, so `"abc` yields no
/// tokens.
pub fn tokenize(input: &str) -> Vec<SearchToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                if !in_quotes {
                    push_token(&mut tokens, std::mem::take(&mut current), true);
                }
            }
            ' ' if !in_quotes => {
                push_token(&mut tokens, std::mem::take(&mut current), false);
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() && !in_quotes {
        push_token(&mut tokens, current, false);
    }

    tokens
}
