//! Drops whitespace/comment-style tokens before they ever reach the engine.

use super::TokenTransform;
use crate::symbol::Symbol;
use std::rc::Rc;

/// Build a transform that drops every token whose symbol is one of `ignored`.
/// Symbols are compared by identity, consistent with how the engine treats
/// compound symbols elsewhere - two grammar occurrences only count as "the
/// same" ignorable terminal if they are literally the same `Rc`.
pub fn ignore(ignored: Vec<Rc<Symbol>>) -> TokenTransform {
    Box::new(move |tokens| {
        Ok(tokens
            .into_iter()
            .filter(|token| !ignored.iter().any(|s| Rc::ptr_eq(s, &token.symbol)))
            .collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::token::Token;

    #[test]
    fn drops_only_the_named_symbols() {
        let space = Symbol::terminal(" ");
        let plus = Symbol::terminal("+");
        let tokens = vec![
            Token::new(space.clone(), " ".to_string(), Position::start()),
            Token::new(plus.clone(), "+".to_string(), Position::start()),
        ];
        let transform = ignore(vec![space]);
        let result = transform(tokens).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].lexeme, "+");
    }
}
