//! Cypher lexer — tokenizes a query string.

use crate::{Error, Result};

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Source span: byte offsets plus 1-based line/column of the start byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Match, OptionalMatch, Where, Return, With, Unwind,
    Create, Merge, Delete, DetachDelete, Set, Remove,
    Order, By, Skip, Limit, Asc, Desc, Distinct,
    And, Or, Not, Xor, Is, Null, True, False, In,
    As, Case, When, Then, Else, End,
    Exists, All,
    StartsWith, EndsWith, Contains,
    On,
    Call, Yield, Union,

    // Literals
    Integer, Float, StringLiteral,

    // Identifiers and parameters
    Identifier, Parameter,

    // Punctuation
    LParen, RParen, LBracket, RBracket, LBrace, RBrace,
    Dot, Comma, Colon, Semicolon, Pipe, Star,
    Arrow,      // ->
    LeftArrow,  // <-
    Dash,       // -
    DotDot,     // ..

    // Operators
    Eq, Neq, Lt, Lte, Gt, Gte,
    Plus, Minus, Slash, Percent, Caret,
    PlusEq,     // +=
    RegexMatch, // =~

    // Whitespace / EOF
    Eof,
}

/// True for tokens that can end an expression — the previous token decides
/// whether a following `-` is a binary minus or part of a numeric literal.
fn ends_value(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::Integer
            | TokenKind::Float
            | TokenKind::StringLiteral
            | TokenKind::Parameter
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::RBrace
    )
}

/// Tokenize a Cypher query string.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut prev_kind: Option<TokenKind> = None;

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            // Skip whitespace
            c if c.is_whitespace() => { chars.next(); }

            // Skip block comments /* ... */
            '/' if matches!(chars.clone().nth(1), Some((_, '*'))) => {
                let comment_start = pos;
                chars.next(); // skip '/'
                chars.next(); // skip '*'
                loop {
                    match chars.next() {
                        Some((_, '*')) => {
                            if matches!(chars.peek(), Some(&(_, '/'))) {
                                chars.next(); // skip '/'
                                break;
                            }
                        }
                        Some(_) => {}
                        None => {
                            let (line, column) = line_col(input, comment_start);
                            return Err(Error::SyntaxError {
                                position: comment_start,
                                line,
                                column,
                                message: "Unterminated block comment".into(),
                            });
                        }
                    }
                }
            }

            // Skip line comments
            '/' if matches!(chars.clone().nth(1), Some((_, '/'))) => {
                while chars.peek().map_or(false, |&(_, c)| c != '\n') {
                    chars.next();
                }
            }

            // String literals
            '\'' | '"' => {
                let quote = ch;
                chars.next(); // consume opening quote
                let start = pos;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => {
                            if let Some((_, escaped)) = chars.next() {
                                match escaped {
                                    'n' => s.push('\n'),
                                    't' => s.push('\t'),
                                    '\\' => s.push('\\'),
                                    c if c == quote => s.push(c),
                                    c => { s.push('\\'); s.push(c); }
                                }
                            }
                        }
                        Some((end, c)) if c == quote => {
                            let (line, column) = line_col(input, start);
                            prev_kind = Some(TokenKind::StringLiteral);
                            tokens.push(Token {
                                kind: TokenKind::StringLiteral,
                                span: Span { start, end: end + 1, line, column },
                                text: s,
                            });
                            break;
                        }
                        Some((_, c)) => s.push(c),
                        None => {
                            let (line, column) = line_col(input, start);
                            return Err(Error::SyntaxError {
                                position: start,
                                line,
                                column,
                                message: "Unterminated string literal".into(),
                            });
                        }
                    }
                }
            }

            // Numbers (a leading '-' at a value-start position is absorbed here)
            c if c.is_ascii_digit() || (c == '-' && !prev_kind.map(ends_value).unwrap_or(false)
                && matches!(chars.clone().nth(1), Some((_, d)) if d.is_ascii_digit())) =>
            {
                let start = pos;
                let mut num = String::new();
                if c == '-' {
                    num.push('-');
                    chars.next();
                }
                let mut is_float = false;
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() {
                        num.push(c);
                        chars.next();
                    } else if c == '.' && !is_float && matches!(chars.clone().nth(1), Some((_, d)) if d.is_ascii_digit()) {
                        is_float = true;
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let kind = if is_float { TokenKind::Float } else { TokenKind::Integer };
                let (line, column) = line_col(input, start);
                prev_kind = Some(kind);
                tokens.push(Token {
                    kind,
                    span: Span { start, end: start + num.len(), line, column },
                    text: num,
                });
            }

            // Parameter: $name
            '$' => {
                chars.next();
                let start = pos;
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let (line, column) = line_col(input, start);
                prev_kind = Some(TokenKind::Parameter);
                tokens.push(Token {
                    kind: TokenKind::Parameter,
                    span: Span { start, end: start + name.len() + 1, line, column },
                    text: name,
                });
            }

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => {
                let start = pos;
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let kind = keyword_or_ident(&ident);
                let (line, column) = line_col(input, start);
                prev_kind = Some(kind);
                tokens.push(Token {
                    kind,
                    span: Span { start, end: start + ident.len(), line, column },
                    text: ident,
                });
            }

            // Punctuation
            '(' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::LParen, pos, "("); }
            ')' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::RParen, pos, ")"); }
            '[' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::LBracket, pos, "["); }
            ']' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::RBracket, pos, "]"); }
            '{' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::LBrace, pos, "{"); }
            '}' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::RBrace, pos, "}"); }
            ',' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Comma, pos, ","); }
            ':' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Colon, pos, ":"); }
            ';' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Semicolon, pos, ";"); }
            '|' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Pipe, pos, "|"); }
            '*' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Star, pos, "*"); }
            '.' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '.'))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::DotDot, pos, "..");
                } else {
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Dot, pos, ".");
                }
            }
            '+' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::PlusEq, pos, "+=");
                } else {
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Plus, pos, "+");
                }
            }
            '/' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Slash, pos, "/"); }
            '%' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Percent, pos, "%"); }
            '^' => { chars.next(); push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Caret, pos, "^"); }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '~'))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::RegexMatch, pos, "=~");
                } else {
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Eq, pos, "=");
                }
            }
            '<' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Lte, pos, "<=");
                } else if matches!(chars.peek(), Some(&(_, '-'))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::LeftArrow, pos, "<-");
                } else if matches!(chars.peek(), Some(&(_, '>'))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Neq, pos, "<>");
                } else {
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Lt, pos, "<");
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Gte, pos, ">=");
                } else {
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Gt, pos, ">");
                }
            }
            '-' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '>'))) {
                    chars.next();
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Arrow, pos, "->");
                } else {
                    push_punct(&mut tokens, &mut prev_kind, input, TokenKind::Dash, pos, "-");
                }
            }

            other => {
                let (line, column) = line_col(input, pos);
                return Err(Error::SyntaxError {
                    position: pos,
                    line,
                    column,
                    message: format!("Unexpected character: '{other}'"),
                });
            }
        }
    }

    let (line, column) = line_col(input, input.len());
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len(), line, column },
        text: String::new(),
    });

    Ok(merge_string_operators(tokens))
}

fn push_punct(tokens: &mut Vec<Token>, prev_kind: &mut Option<TokenKind>, input: &str, kind: TokenKind, pos: usize, text: &str) {
    let (line, column) = line_col(input, pos);
    *prev_kind = Some(kind);
    tokens.push(Token {
        kind,
        span: Span { start: pos, end: pos + text.len(), line, column },
        text: text.to_string(),
    });
}

/// Byte offset -> (1-based line, 1-based column).
fn line_col(input: &str, byte_offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in input.char_indices() {
        if i >= byte_offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// `STARTS` immediately followed by `WITH`, and `ENDS` immediately followed
/// by `WITH`, become a single StartsWith/EndsWith token spanning both words.
/// A lone `STARTS`/`ENDS` not followed by `WITH` is left as a plain identifier.
fn merge_string_operators(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let upper = tokens[i].text.to_uppercase();
        if (upper == "STARTS" || upper == "ENDS")
            && i + 1 < tokens.len()
            && tokens[i + 1].text.to_uppercase() == "WITH"
        {
            let kind = if upper == "STARTS" { TokenKind::StartsWith } else { TokenKind::EndsWith };
            let first = &tokens[i];
            let second = &tokens[i + 1];
            out.push(Token {
                kind,
                span: Span { start: first.span.start, end: second.span.end, line: first.span.line, column: first.span.column },
                text: format!("{} {}", first.text, second.text),
            });
            i += 2;
        } else {
            out.push(tokens[i].clone());
            i += 1;
        }
    }
    out
}

fn keyword_or_ident(s: &str) -> TokenKind {
    match s.to_uppercase().as_str() {
        "MATCH" => TokenKind::Match,
        "OPTIONAL" => TokenKind::OptionalMatch,
        "WHERE" => TokenKind::Where,
        "RETURN" => TokenKind::Return,
        "WITH" => TokenKind::With,
        "UNWIND" => TokenKind::Unwind,
        "CREATE" => TokenKind::Create,
        "MERGE" => TokenKind::Merge,
        "DELETE" => TokenKind::Delete,
        "DETACH" => TokenKind::DetachDelete,
        "SET" => TokenKind::Set,
        "REMOVE" => TokenKind::Remove,
        "ORDER" => TokenKind::Order,
        "BY" => TokenKind::By,
        "SKIP" => TokenKind::Skip,
        "LIMIT" => TokenKind::Limit,
        "ASC" | "ASCENDING" => TokenKind::Asc,
        "DESC" | "DESCENDING" => TokenKind::Desc,
        "DISTINCT" => TokenKind::Distinct,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "XOR" => TokenKind::Xor,
        "IS" => TokenKind::Is,
        "NULL" => TokenKind::Null,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        "IN" => TokenKind::In,
        "AS" => TokenKind::As,
        "CASE" => TokenKind::Case,
        "WHEN" => TokenKind::When,
        "THEN" => TokenKind::Then,
        "ELSE" => TokenKind::Else,
        "END" => TokenKind::End,
        "EXISTS" => TokenKind::Exists,
        "CONTAINS" => TokenKind::Contains,
        "ON" => TokenKind::On,
        "CALL" => TokenKind::Call,
        "YIELD" => TokenKind::Yield,
        "UNION" => TokenKind::Union,
        "ALL" => TokenKind::All,
        _ => TokenKind::Identifier,
    }
}

/// True for any reserved keyword — used by the parser to accept keywords as
/// identifiers in alias position (`AS <keyword>`) and as property keys.
pub fn is_keyword(kind: TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::Integer
            | TokenKind::Float
            | TokenKind::StringLiteral
            | TokenKind::Parameter
            | TokenKind::LParen | TokenKind::RParen
            | TokenKind::LBracket | TokenKind::RBracket
            | TokenKind::LBrace | TokenKind::RBrace
            | TokenKind::Dot | TokenKind::Comma | TokenKind::Colon | TokenKind::Semicolon
            | TokenKind::Pipe | TokenKind::Star
            | TokenKind::Arrow | TokenKind::LeftArrow | TokenKind::Dash | TokenKind::DotDot
            | TokenKind::Eq | TokenKind::Neq | TokenKind::Lt | TokenKind::Lte | TokenKind::Gt | TokenKind::Gte
            | TokenKind::Plus | TokenKind::Minus | TokenKind::Slash | TokenKind::Percent | TokenKind::Caret
            | TokenKind::PlusEq | TokenKind::RegexMatch
            | TokenKind::Eof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_match() {
        let tokens = tokenize("MATCH (n:Person) RETURN n").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::Match,
            TokenKind::LParen,
            TokenKind::Identifier, // n
            TokenKind::Colon,
            TokenKind::Identifier, // Person
            TokenKind::RParen,
            TokenKind::Return,
            TokenKind::Identifier, // n
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_relationship_pattern() {
        let tokens = tokenize("(a)-[:KNOWS]->(b)").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::LParen,
            TokenKind::Identifier, // a
            TokenKind::RParen,
            TokenKind::Dash,
            TokenKind::LBracket,
            TokenKind::Colon,
            TokenKind::Identifier, // KNOWS
            TokenKind::RBracket,
            TokenKind::Arrow,
            TokenKind::LParen,
            TokenKind::Identifier, // b
            TokenKind::RParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_string_literal() {
        let tokens = tokenize("'hello world'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, "hello world");
    }

    #[test]
    fn test_parameter() {
        let tokens = tokenize("$name").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Parameter);
        assert_eq!(tokens[0].text, "name");
    }

    #[test]
    fn test_block_comment() {
        let tokens = tokenize("MATCH /* this is a comment */ (n) RETURN n").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(kinds[0], &TokenKind::Match);
        assert_eq!(kinds[1], &TokenKind::LParen);
    }

    #[test]
    fn test_block_comment_multiline() {
        let tokens = tokenize("MATCH /* multi\nline\ncomment */ (n)").unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Match));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::LParen));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let result = tokenize("MATCH /* unterminated");
        assert!(result.is_err());
    }

    #[test]
    fn test_parameter_span() {
        let tokens = tokenize("$myParam").unwrap();
        let param_token = &tokens[0];
        assert_eq!(param_token.span.start, 0);
        assert_eq!(param_token.span.end, 8); // $ + myParam = 8 chars
    }

    #[test]
    fn test_line_column_tracking() {
        let tokens = tokenize("MATCH (n)\nRETURN n").unwrap();
        let ret = tokens.iter().find(|t| t.kind == TokenKind::Return).unwrap();
        assert_eq!(ret.span.line, 2);
        assert_eq!(ret.span.column, 1);
    }

    #[test]
    fn test_starts_with_merged() {
        let tokens = tokenize("n.name STARTS WITH 'A'").unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::StartsWith));
        assert!(!tokens.iter().any(|t| t.text.to_uppercase() == "WITH" && t.kind == TokenKind::With));
    }

    #[test]
    fn test_contains_keyword() {
        let tokens = tokenize("n.name CONTAINS 'A'").unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Contains));
    }

    #[test]
    fn test_leading_minus_literal() {
        let tokens = tokenize("RETURN -5").unwrap();
        let num = &tokens[1];
        assert_eq!(num.kind, TokenKind::Integer);
        assert_eq!(num.text, "-5");
    }

    #[test]
    fn test_minus_as_operator_after_value() {
        let tokens = tokenize("RETURN 5 - 3").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::Return,
            TokenKind::Integer,
            TokenKind::Dash,
            TokenKind::Integer,
            TokenKind::Eof,
        ]);
    }
}
