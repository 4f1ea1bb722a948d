//! Combines terminal patterns into one alternation and walks it over the
//! source, anchoring each match at the current offset (§4.1).

use crate::error::ParseError;
use crate::position::{Code, Position};
use crate::symbol::{Symbol, SymbolBody};
use regex::Regex;
use std::rc::Rc;

/// A regex built once from a grammar's terminal list, used to split a whole
/// source string into a vector of tokens up front. `Marker` terminals are
/// skipped - they carry no pattern and only ever enter a stream through a
/// [transform](crate::transform).
pub struct Tokenizer {
    terminals: Vec<Rc<Symbol>>,
    combined: Regex,
}

fn terminal_pattern(symbol: &Symbol) -> Option<String> {
    match &symbol.body {
        SymbolBody::Terminal(lexeme) => Some(regex::escape(lexeme)),
        SymbolBody::Regexp(pattern, _) => Some(pattern.clone()),
        _ => None,
    }
}

impl Tokenizer {
    /// Build a tokenizer from a grammar's terminal symbols, in the order
    /// they were collected (§3: Terminal `priority` only breaks ties when
    /// two terminals would otherwise match the same text at the same
    /// offset; declaration order otherwise decides, since a stable sort
    /// preserves it).
    pub fn new(terminals: Vec<Rc<Symbol>>) -> Result<Self, crate::error::ImplementationError> {
        let mut ordered = terminals;
        ordered.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let mut patterns = Vec::new();
        for (index, terminal) in ordered.iter().enumerate() {
            if let Some(pattern) = terminal_pattern(terminal) {
                patterns.push(format!("(?P<_t{}>{})", index, pattern));
            }
        }
        if patterns.is_empty() {
            return Err(crate::error::ImplementationError::new(
                "EmptyTokenizer",
                "a tokenizer needs at least one terminal with a pattern".to_string(),
            ));
        }
        let combined = Regex::new(&format!("(?m:{})", patterns.join("|"))).map_err(|err| {
            crate::error::ImplementationError::new(
                "InvalidTokenizer",
                format!("combined terminal pattern failed to compile: {}", err),
            )
        })?;
        Ok(Self {
            terminals: ordered,
            combined,
        })
    }

    fn terminal_for_group(&self, group: &str) -> Option<&Rc<Symbol>> {
        let index: usize = group.strip_prefix("_t")?.parse().ok()?;
        self.terminals.get(index)
    }

    /// Tokenize the whole source eagerly into a flat list. The engine reads
    /// from this list through a [`TokenStream`](crate::stream::TokenStream)
    /// rather than re-scanning on demand, but production is still anchored
    /// match-by-match exactly as a restartable lazy sequence would do it.
    pub fn tokenize(&self, code: &Code) -> Result<Vec<crate::token::Token>, ParseError> {
        let source = code.text;
        let mut pos = Position::start();
        let mut tokens = Vec::new();
        while pos.offset < source.len() {
            let rest = &source[pos.offset..];
            let captures = self
                .combined
                .captures(rest)
                .filter(|c| c.get(0).map(|m| m.start()) == Some(0));
            let captures = match captures {
                Some(c) => c,
                None => {
                    let sample = code.sample_at(pos.offset, 10);
                    return Err(ParseError::tokenize(pos, &sample));
                }
            };
            let group_name = self
                .combined
                .capture_names()
                .flatten()
                .find(|name| captures.name(name).is_some())
                .expect("a successful match always names one group");
            let symbol = self
                .terminal_for_group(group_name)
                .expect("capture group name always maps back to a terminal")
                .clone();
            let lexeme = captures.get(0).unwrap().as_str().to_string();
            let next = pos.advance(&lexeme);
            tokens.push(crate::token::Token::new(symbol, lexeme, pos));
            pos = next;
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_longest_alternation_in_order() {
        let plus = Symbol::terminal("+");
        let number = Symbol::regexp(r"[0-9]+").unwrap();
        let tokenizer = Tokenizer::new(vec![plus.clone(), number.clone()]).unwrap();
        let code = Code::new("12+3");
        let tokens = tokenizer.tokenize(&code).unwrap();
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["12", "+", "3"]);
    }

    #[test]
    fn reports_position_of_unmatched_input() {
        let plus = Symbol::terminal("+");
        let tokenizer = Tokenizer::new(vec![plus]).unwrap();
        let code = Code::new("+ ?");
        let err = tokenizer.tokenize(&code).unwrap_err();
        assert_eq!(err.position.offset, 1);
    }

    #[test]
    fn markers_are_excluded_from_the_combined_pattern() {
        let marker = Symbol::marker("INDENT");
        let plus = Symbol::terminal("+");
        let tokenizer = Tokenizer::new(vec![marker, plus]).unwrap();
        assert_eq!(tokenizer.terminals.len(), 2);
        assert!(tokenizer.combined.as_str().matches("(?P<_t").count() == 1);
    }
}
