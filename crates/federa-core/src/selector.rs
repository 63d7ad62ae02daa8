//! Boolean selector expressions over verified fields
//!
//! A selector decides whether a binding rule applies to a login:
//!
//! ```text
//! serviceaccount.namespace==default and serviceaccount.name!=db
//! (token.scope == "read write" or not token.username is empty)
//! ```
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr  := and ("or" and)*
//! and   := unary ("and" unary)*
//! unary := "not" unary | "(" expr ")" | pred
//! pred  := path ("==" | "!=") value
//!        | path "is" ["not"] "empty"
//! ```
//!
//! Values are bare words or double-quoted strings (`\"` and `\\` escapes).
//! Keywords are only recognised unquoted. Parentheses and `not` may nest at
//! most [`MAX_NESTING`] levels deep.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::SelectorError;
use crate::types::SelectableFields;

/// Deepest accepted nesting of `(` and `not`
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        path: String,
        op: CompareOp,
        value: String,
    },
    IsEmpty {
        path: String,
        negated: bool,
    },
}

impl Expr {
    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::And(terms) | Expr::Or(terms) => {
                for term in terms {
                    term.collect_fields(out);
                }
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::Compare { path, .. } | Expr::IsEmpty { path, .. } => {
                out.insert(path.as_str());
            }
        }
    }

    fn eval(&self, fields: &SelectableFields) -> Result<bool, SelectorError> {
        Ok(match self {
            Expr::And(terms) => {
                for term in terms {
                    if !term.eval(fields)? {
                        return Ok(false);
                    }
                }
                true
            }
            Expr::Or(terms) => {
                for term in terms {
                    if term.eval(fields)? {
                        return Ok(true);
                    }
                }
                false
            }
            Expr::Not(inner) => !inner.eval(fields)?,
            Expr::Compare { path, op, value } => {
                let actual = lookup(fields, path)?;
                match op {
                    CompareOp::Equal => actual == value,
                    CompareOp::NotEqual => actual != value,
                }
            }
            Expr::IsEmpty { path, negated } => lookup(fields, path)?.is_empty() != *negated,
        })
    }
}

fn lookup<'a>(fields: &'a SelectableFields, path: &str) -> Result<&'a str, SelectorError> {
    fields
        .get(path)
        .ok_or_else(|| SelectorError::UnknownField(path.to_string()))
}

/// A compiled selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    expr: Expr,
}

impl Selector {
    /// Parse a selector expression
    ///
    /// A blank expression is a parse error here; callers that treat an empty
    /// selector as catch-all check for it before parsing.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(SelectorError::parse(tok.offset, "unexpected trailing input"));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Every field path the expression references
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.expr.collect_fields(&mut out);
        out
    }

    /// Evaluate against a selectable field set
    ///
    /// All referenced paths are checked before evaluation, so an undeclared
    /// field is always an error, even behind a short-circuiting operator.
    pub fn evaluate(&self, fields: &SelectableFields) -> Result<bool, SelectorError> {
        if let Some(unknown) = self.fields().into_iter().find(|p| !fields.contains(p)) {
            return Err(SelectorError::UnknownField(unknown.to_string()));
        }
        self.expr.eval(fields)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    Equal,
    NotEqual,
    Word(String),
    Quoted(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '=' | '!')
}

fn tokenize(source: &str) -> Result<Vec<Token>, SelectorError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::LParen, offset });
            }
            ')' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::RParen, offset });
            }
            '=' | '!' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => {
                        let kind = if c == '=' {
                            TokenKind::Equal
                        } else {
                            TokenKind::NotEqual
                        };
                        tokens.push(Token { kind, offset });
                    }
                    _ => {
                        return Err(SelectorError::parse(
                            offset,
                            format!("expected '{}='", c),
                        ))
                    }
                }
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, escaped @ ('"' | '\\'))) => value.push(escaped),
                            Some((at, other)) => {
                                return Err(SelectorError::parse(
                                    at,
                                    format!("invalid escape '\\{}'", other),
                                ))
                            }
                            None => break,
                        },
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(SelectorError::parse(offset, "unterminated string"));
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(value),
                    offset,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Word(word),
                    offset,
                });
            }
        }
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Word(w), .. }) if w == keyword)
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.end)
    }

    fn parse_or(&mut self) -> Result<Expr, SelectorError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek_keyword("or") {
            self.next();
            terms.push(self.parse_and()?);
        }
        Ok(match terms.len() {
            1 => terms.remove(0),
            _ => Expr::Or(terms),
        })
    }

    fn parse_and(&mut self) -> Result<Expr, SelectorError> {
        let mut terms = vec![self.parse_unary()?];
        while self.peek_keyword("and") {
            self.next();
            terms.push(self.parse_unary()?);
        }
        Ok(match terms.len() {
            1 => terms.remove(0),
            _ => Expr::And(terms),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, SelectorError> {
        if self.peek_keyword("not") {
            self.descend()?;
            self.next();
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }

        if matches!(self.peek(), Some(Token { kind: TokenKind::LParen, .. })) {
            self.descend()?;
            self.next();
            let inner = self.parse_or()?;
            self.depth -= 1;
            return match self.next() {
                Some(Token { kind: TokenKind::RParen, .. }) => Ok(inner),
                Some(tok) => Err(SelectorError::parse(tok.offset, "expected ')'")),
                None => Err(SelectorError::parse(self.end, "expected ')'")),
            };
        }

        self.parse_predicate()
    }

    fn descend(&mut self) -> Result<(), SelectorError> {
        if self.depth >= MAX_NESTING {
            return Err(SelectorError::parse(self.offset(), "expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_predicate(&mut self) -> Result<Expr, SelectorError> {
        let offset = self.offset();
        let path = match self.next() {
            Some(Token { kind: TokenKind::Word(w), offset }) => {
                if !is_valid_path(&w) || is_keyword(&w) {
                    return Err(SelectorError::parse(offset, format!("invalid field path '{}'", w)));
                }
                w
            }
            Some(tok) => return Err(SelectorError::parse(tok.offset, "expected field path")),
            None => return Err(SelectorError::parse(offset, "expected field path")),
        };

        let offset = self.offset();
        match self.next() {
            Some(Token { kind: TokenKind::Equal, .. }) => Ok(Expr::Compare {
                path,
                op: CompareOp::Equal,
                value: self.parse_value()?,
            }),
            Some(Token { kind: TokenKind::NotEqual, .. }) => Ok(Expr::Compare {
                path,
                op: CompareOp::NotEqual,
                value: self.parse_value()?,
            }),
            Some(Token { kind: TokenKind::Word(w), .. }) if w == "is" => {
                let negated = if self.peek_keyword("not") {
                    self.next();
                    true
                } else {
                    false
                };
                if !self.peek_keyword("empty") {
                    return Err(SelectorError::parse(self.offset(), "expected 'empty'"));
                }
                self.next();
                Ok(Expr::IsEmpty { path, negated })
            }
            _ => Err(SelectorError::parse(offset, "expected '==', '!=' or 'is'")),
        }
    }

    fn parse_value(&mut self) -> Result<String, SelectorError> {
        let offset = self.offset();
        match self.next() {
            Some(Token { kind: TokenKind::Quoted(v), .. }) => Ok(v),
            Some(Token { kind: TokenKind::Word(w), offset }) => {
                if is_keyword(&w) {
                    Err(SelectorError::parse(offset, format!("keyword '{}' must be quoted", w)))
                } else {
                    Ok(w)
                }
            }
            _ => Err(SelectorError::parse(offset, "expected value")),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "and" | "or" | "not" | "is" | "empty")
}

fn is_valid_path(path: &str) -> bool {
    path.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> SelectableFields {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn matches(selector: &str, pairs: &[(&str, &str)]) -> Result<bool, SelectorError> {
        Selector::parse(selector)?.evaluate(&fields(pairs))
    }

    #[test]
    fn test_match_table() {
        let declared = [("a", ""), ("c", "")];
        for (name, selector, values, expected) in [
            ("1 term ok", "a==b", vec![("a", "b")], true),
            ("1 term unset field", "a==b", vec![("c", "d")], false),
            ("1 term wrong value", "a==b", vec![("a", "z")], false),
            ("2 terms ok", "a==b and c==d", vec![("a", "b"), ("c", "d")], true),
            ("2 terms one unset", "a==b and c==d", vec![("a", "b")], false),
            ("2 terms one wrong", "a==b and c==d", vec![("a", "z"), ("c", "d")], false),
            ("or", "a==z or c==d", vec![("c", "d")], true),
            ("not equal", "a!=b", vec![("a", "z")], true),
            ("negation", "not a==b", vec![("a", "b")], false),
            ("is empty", "a is empty", vec![], true),
            ("is not empty", "a is not empty", vec![("a", "x")], true),
        ] {
            let mut pairs: Vec<(&str, &str)> = declared.to_vec();
            for (k, v) in values {
                pairs.retain(|(key, _)| *key != k);
                pairs.push((k, v));
            }
            assert_eq!(matches(selector, &pairs).unwrap(), expected, "{}", name);
        }
    }

    #[test]
    fn test_service_account_selector() {
        let selector = "serviceaccount.namespace==default and serviceaccount.name==web";
        assert!(matches(
            selector,
            &[("serviceaccount.namespace", "default"), ("serviceaccount.name", "web")]
        )
        .unwrap());
        assert!(!matches(
            selector,
            &[("serviceaccount.namespace", "default"), ("serviceaccount.name", "db")]
        )
        .unwrap());
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let pairs = [("a", "1"), ("b", "0"), ("c", "1")];
        // a==1 or (b==1 and c==0)
        assert!(matches("a==1 or b==1 and c==0", &pairs).unwrap());
        // (a==1 or b==1) and c==0
        assert!(!matches("(a==1 or b==1) and c==0", &pairs).unwrap());
    }

    #[test]
    fn test_quoted_values() {
        let pairs = [("token.scope", "read write"), ("name", "and")];
        assert!(matches(r#"token.scope == "read write""#, &pairs).unwrap());
        assert!(matches(r#"name == "and""#, &pairs).unwrap());
        assert!(matches(r#"name != "a\"b""#, &pairs).unwrap());
    }

    #[test]
    fn test_unknown_field_is_error_even_when_short_circuited() {
        let pairs = [("a", "x")];
        assert_eq!(
            matches("a==y and missing==z", &pairs),
            Err(SelectorError::UnknownField("missing".into()))
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "a",
            "a=b",
            "a==",
            "(a==b",
            "a==b)",
            "a==b and",
            "a is",
            "a is full",
            "and==b",
            "a==and",
            "a..b==c",
            r#"a=="unterminated"#,
        ] {
            assert!(
                matches!(Selector::parse(bad), Err(SelectorError::Parse { .. })),
                "expected parse error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}a==b{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(Selector::parse(&deep), Err(SelectorError::Parse { .. })));

        let negations = format!("{}a==b", "not ".repeat(100_000));
        assert!(matches!(Selector::parse(&negations), Err(SelectorError::Parse { .. })));

        let at_limit = format!("{}a==b{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(matches(&at_limit, &[("a", "b")]).unwrap());

        let past_limit = format!(
            "{}a==b{}",
            "(".repeat(MAX_NESTING + 1),
            ")".repeat(MAX_NESTING + 1)
        );
        assert!(Selector::parse(&past_limit).is_err());

        // Sibling groups do not accumulate depth
        let siblings = vec!["(a==b)"; 1_000].join(" and ");
        assert!(matches(&siblings, &[("a", "b")]).unwrap());
    }

    #[test]
    fn test_long_flat_chain() {
        let chain = vec!["a==z"; 100_000].join(" or ") + " or a==b";
        assert!(matches(&chain, &[("a", "b")]).unwrap());
    }

    #[test]
    fn test_fields_listing() {
        let selector = Selector::parse("x.a==1 and (x.b!=2 or x.a is empty)").unwrap();
        let listed: Vec<_> = selector.fields().into_iter().collect();
        assert_eq!(listed, vec!["x.a", "x.b"]);
    }
}
