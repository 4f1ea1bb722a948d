//! Pretty-prints a grammar as `name ::= expression` rule listing (§6), one
//! line per named rule, for diagnostics and the tutorial binary.
//!
//! Grounded in the original Python `GrammarFormatter`: the same "depth"
//! trick - a named symbol nested inside another rule's expansion prints as
//! just its name, while the rule being defined always shows its own full
//! expansion - keeps recursive and mutually-referential grammars from
//! printing as an infinite expansion.

use crate::grammar::Grammar;
use crate::symbol::{Symbol, SymbolBody};
use std::rc::Rc;

pub struct GrammarFormatter;

impl Default for GrammarFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Render every named rule reachable in `grammar`, aligned on `::=`.
    pub fn format(&self, grammar: &Grammar) -> String {
        let rules: Vec<&Rc<Symbol>> = grammar.symbols().iter().filter(|s| s.name().is_some()).collect();
        let width = rules.iter().map(|s| s.name().unwrap().len()).max().unwrap_or(0);
        rules
            .iter()
            .map(|s| format!("{:width$}  ::=  {}", s.name().unwrap(), self.expand(s), width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// A symbol's own full expansion, used both for a rule's right-hand side
    /// and, recursively, for any anonymous sub-expression.
    fn expand(&self, symbol: &Rc<Symbol>) -> String {
        match &symbol.body {
            SymbolBody::Terminal(lexeme) => format!("{:?}", lexeme),
            SymbolBody::Regexp(pattern, _) => format!("/{}/", pattern),
            SymbolBody::Marker(name) => format!("<{}>", name),
            SymbolBody::Epsilon => "\u{025B}".to_string(),
            SymbolBody::Sequence(items) => self.join(items, ", "),
            SymbolBody::OneOf(items) => self.join(items, " | "),
            SymbolBody::Repeat {
                body,
                separator: Some(sep),
                ..
            } => format!("*({} {})", self.nested(body), self.nested(sep)),
            SymbolBody::Repeat { body, .. } => format!("*({})", self.nested(body)),
            SymbolBody::Optional(body) => format!("({})?", self.nested(body)),
            SymbolBody::Lookahead(body) => format!("(?>{})", self.nested(body)),
            SymbolBody::Proxy(slot) => match slot.borrow().as_ref() {
                Some(target) => self.nested(target),
                None => "<unresolved>".to_string(),
            },
            SymbolBody::Alias(target) => self.nested(target),
        }
    }

    fn join(&self, items: &[Rc<Symbol>], sep: &str) -> String {
        items.iter().map(|s| self.nested(s)).collect::<Vec<_>>().join(sep)
    }

    /// A symbol appearing *inside* another symbol's expansion: a named
    /// sub-rule prints as just its name, deferring to its own top-level
    /// `name ::= ...` line rather than inlining its whole body again.
    fn nested(&self, symbol: &Rc<Symbol>) -> String {
        match symbol.name() {
            Some(name) => name.to_string(),
            None => self.expand(symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ParseOptions;
    use crate::symbol::Symbol;

    #[test]
    fn renders_sequence_and_terminal_symbols() {
        let plus = Symbol::terminal("+");
        let number = Symbol::regexp("[0-9]+").unwrap();
        let expr = Symbol::sequence(vec![number, plus, Symbol::epsilon()]).named("expr");
        let grammar = Grammar::new(expr, Vec::new(), false, ParseOptions::default()).unwrap();
        let text = GrammarFormatter::new().format(&grammar);
        assert_eq!(text, "expr  ::=  /[0-9]+/, \"+\", \u{025B}");
    }

    #[test]
    fn a_named_sub_rule_prints_by_name_when_nested() {
        let digit = Symbol::regexp("[0-9]").unwrap().named("digit");
        let repeated = Symbol::repeat(digit, None, 1, false).named("digits");
        let grammar = Grammar::new(repeated, Vec::new(), false, ParseOptions::default()).unwrap();
        let text = GrammarFormatter::new().format(&grammar);
        assert!(text.contains("*(digit)"));
        assert!(text.contains("::=  /[0-9]/"));
    }
}
