//! Synthesizes INDENT/DEDENT markers from leading whitespace, the way a
//! Python-like grammar turns off-side-rule indentation into ordinary tokens
//! a recursive-descent grammar can match against (§4.2).

use super::TokenTransform;
use crate::error::ParseError;
use crate::symbol::Symbol;
use crate::token::Token;
use std::rc::Rc;

/// The marker symbols a call to [`indent`] mints. A grammar that uses this
/// transform must reference these exact `Rc`s in its rules - they are
/// produced by identity, not by name, so a freshly-built `Symbol::marker`
/// with the same name would never match.
pub struct IndentMarkers {
    pub indent: Rc<Symbol>,
    pub dedent: Rc<Symbol>,
    pub newline: Rc<Symbol>,
}

fn leading_indent_width(s: &str, tabsize: usize) -> usize {
    let mut width = 0;
    for ch in s.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += tabsize,
            _ => break,
        }
    }
    width
}

/// Build an indentation transform. `opening`/`closing` bracket terminals
/// suspend marker synthesis while nested (depth tracked by a signed counter:
/// `+1` per `opening` token, `-1` per `closing` token). `emit_newlines`, when
/// set, also emits a zero-length `NEWLINE` marker before an unchanged
/// same-indentation line break - grammars that want statement separators
/// turn this on, grammars that treat newlines as pure layout leave it off.
pub fn indent(
    opening: Vec<Rc<Symbol>>,
    closing: Vec<Rc<Symbol>>,
    tabsize: usize,
    emit_newlines: bool,
) -> (IndentMarkers, TokenTransform) {
    let markers = IndentMarkers {
        indent: Symbol::marker("INDENT"),
        dedent: Symbol::marker("DEDENT"),
        newline: Symbol::marker("NEWLINE"),
    };
    let indent_marker = markers.indent.clone();
    let dedent_marker = markers.dedent.clone();
    let newline_marker = markers.newline.clone();

    let transform: TokenTransform = Box::new(move |tokens| {
        let mut levels = vec![0usize];
        let mut depth: i32 = 0;
        let mut out = Vec::new();
        let mut last_end = None;

        for token in tokens {
            if opening.iter().any(|s| Rc::ptr_eq(s, &token.symbol)) {
                depth += 1;
            }
            if closing.iter().any(|s| Rc::ptr_eq(s, &token.symbol)) {
                depth -= 1;
            }
            last_end = Some(token.end());

            let newline_at = token.lexeme.find('\n');
            let newline_at = match newline_at {
                Some(i) if depth == 0 => i,
                _ => {
                    out.push(token);
                    continue;
                }
            };

            let (before, after) = token.split(newline_at + 1);
            let column = leading_indent_width(&after.lexeme, tabsize);
            let top = *levels.last().unwrap();
            out.push(before);
            match column.cmp(&top) {
                std::cmp::Ordering::Equal => {
                    if emit_newlines {
                        out.push(Token::new(newline_marker.clone(), String::new(), after.start));
                    }
                }
                std::cmp::Ordering::Greater => {
                    levels.push(column);
                    out.push(Token::new(indent_marker.clone(), String::new(), after.start));
                }
                std::cmp::Ordering::Less => {
                    while *levels.last().unwrap() > column {
                        out.push(Token::new(dedent_marker.clone(), String::new(), after.start));
                        levels.pop();
                    }
                    if *levels.last().unwrap() != column {
                        return Err(ParseError::new(
                            after.start,
                            "unindent does not match any outer indentation level".to_string(),
                        ));
                    }
                }
            }
            if !after.lexeme.is_empty() {
                out.push(after);
            }
        }

        if let Some(end) = last_end {
            while *levels.last().unwrap() != 0 {
                out.push(Token::new(dedent_marker.clone(), String::new(), end));
                levels.pop();
            }
        }
        Ok(out)
    });

    (markers, transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn token(symbol: &Rc<Symbol>, lexeme: &str) -> Token {
        Token::new(symbol.clone(), lexeme.to_string(), Position::start())
    }

    #[test]
    fn indent_and_dedent_bracket_a_nested_block() {
        let word = Symbol::regexp("[a-z]+").unwrap();
        let (markers, transform) = indent(vec![], vec![], 4, false);
        let tokens = vec![
            token(&word, "if"),
            token(&word, "\n    body"),
            token(&word, "\ndone"),
        ];
        let result = transform(tokens).unwrap();
        let kinds: Vec<&str> = result
            .iter()
            .map(|t| {
                if Rc::ptr_eq(&t.symbol, &markers.indent) {
                    "INDENT"
                } else if Rc::ptr_eq(&t.symbol, &markers.dedent) {
                    "DEDENT"
                } else {
                    "word"
                }
            })
            .collect();
        assert_eq!(kinds, vec!["word", "word", "INDENT", "word", "word", "DEDENT", "word"]);
    }

    #[test]
    fn depth_inside_brackets_suppresses_markers() {
        let lparen = Symbol::terminal("(");
        let rparen = Symbol::terminal(")");
        let word = Symbol::regexp("[a-z]+").unwrap();
        let (_, transform) = indent(vec![lparen.clone()], vec![rparen.clone()], 4, false);
        let tokens = vec![token(&lparen, "("), token(&word, "\n  a"), token(&rparen, ")")];
        let result = transform(tokens).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn mismatched_dedent_is_an_error() {
        let word = Symbol::regexp("[a-z]+").unwrap();
        let (_, transform) = indent(vec![], vec![], 4, false);
        let tokens = vec![token(&word, "a"), token(&word, "\n   b"), token(&word, "\n c")];
        assert!(transform(tokens).is_err());
    }
}
