//! Wires the symbol algebra, tokenizer and transform pipeline together into
//! a single entry point (§3 "Grammar", §6 "Build"/"Parse").
//!
//! [`GrammarBuilder`] stands in for the teacher corpus's dynamic
//! `__getattr__`/`__setattr__` forward-declaration trick, which has no
//! direct Rust equivalent: [`GrammarBuilder::rule`] returns (and, the first
//! time, mints) a named slot, and [`GrammarBuilder::define`] binds it. A
//! name asked for before it is defined comes back as a [`Symbol::proxy`];
//! defining it later fills that proxy's slot in place, so every earlier
//! occurrence observes the new target.

use crate::engine::{self, ParseOptions};
use crate::error::{ImplementationError, ParseError};
use crate::node::ParseNode;
use crate::position::Code;
use crate::stream::TokenStream;
use crate::symbol::{Symbol, SymbolBody};
use crate::tokenizer::Tokenizer;
use crate::transform::{self, TokenTransform};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Accumulates named symbols while a grammar's rules are being written,
/// resolving forward references as they're filled in.
#[derive(Default)]
pub struct GrammarBuilder {
    symbols: RefCell<HashMap<&'static str, Rc<Symbol>>>,
    forward_declarations: RefCell<HashMap<&'static str, Rc<Symbol>>>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a named rule, minting a forward-declared [`Symbol::proxy`]
    /// the first time a name is asked for before [`define`](Self::define)
    /// has bound it.
    pub fn rule(&self, name: &'static str) -> Rc<Symbol> {
        if let Some(symbol) = self.symbols.borrow().get(name) {
            return symbol.clone();
        }
        if let Some(proxy) = self.forward_declarations.borrow().get(name) {
            return proxy.clone();
        }
        let proxy = Symbol::proxy();
        self.forward_declarations.borrow_mut().insert(name, proxy.clone());
        proxy
    }

    /// Bind `name` to `symbol`. If `name` was already asked for via
    /// [`rule`](Self::rule), the pending proxy's slot is filled so every
    /// earlier reference now resolves through to `symbol`.
    pub fn define(&self, name: &'static str, symbol: Rc<Symbol>) -> Rc<Symbol> {
        let named = symbol.named(name);
        if let Some(proxy) = self.forward_declarations.borrow_mut().remove(name) {
            if let SymbolBody::Proxy(slot) = &proxy.body {
                *slot.borrow_mut() = Some(named.clone());
            }
        }
        self.symbols.borrow_mut().insert(name, named.clone());
        named
    }

    /// Finalize the grammar: every name asked for via [`rule`](Self::rule)
    /// must have been bound via [`define`](Self::define) by now, and every
    /// `Regexp`/terminal reachable from `start` is collected into the
    /// tokenizer's terminal list.
    pub fn build(
        self,
        start: Rc<Symbol>,
        pipeline: Vec<TokenTransform>,
        drop_terminals: bool,
        options: ParseOptions,
    ) -> Result<Grammar, ImplementationError> {
        if let Some(name) = self.forward_declarations.borrow().keys().next() {
            return Err(ImplementationError::new(
                "UnresolvedProxy",
                format!("rule '{}' was referenced but never defined", name),
            ));
        }
        let declared: Vec<Rc<Symbol>> = self.symbols.borrow().values().cloned().collect();
        Grammar::with_extra_roots(start, declared, pipeline, drop_terminals, options)
    }
}

/// A key identifying a symbol for traversal deduplication, mirroring how
/// the engine's packrat memo treats symbol identity (§9 "Equality for
/// Terminals is by lexeme; equality for other symbols is identity") - two
/// `Symbol::terminal("+")` calls anywhere in a grammar name the same
/// tokenizer terminal, but two otherwise-identical compound rules remain
/// distinct.
#[derive(PartialEq, Eq, Hash)]
enum SeenKey {
    Lexeme(String),
    Pointer(usize),
}

fn seen_key(symbol: &Rc<Symbol>) -> SeenKey {
    match &symbol.body {
        SymbolBody::Terminal(lexeme) => SeenKey::Lexeme(lexeme.clone()),
        _ => SeenKey::Pointer(Rc::as_ptr(symbol) as *const () as usize),
    }
}

/// The symbols a compound symbol directly refers to, resolving `Proxy`
/// indirection so traversal can walk straight through a forward reference.
fn children_of(symbol: &Rc<Symbol>) -> Vec<Rc<Symbol>> {
    match &symbol.body {
        SymbolBody::Sequence(items) | SymbolBody::OneOf(items) => items.clone(),
        SymbolBody::Repeat { body, separator, .. } => {
            let mut out = vec![body.clone()];
            if let Some(sep) = separator {
                out.push(sep.clone());
            }
            out
        }
        SymbolBody::Optional(body) | SymbolBody::Lookahead(body) | SymbolBody::Alias(body) => {
            vec![body.clone()]
        }
        SymbolBody::Proxy(slot) => slot.borrow().as_ref().map(|target| vec![target.clone()]).unwrap_or_default(),
        SymbolBody::Terminal(_) | SymbolBody::Regexp(_, _) | SymbolBody::Marker(_) | SymbolBody::Epsilon => Vec::new(),
    }
}

fn is_pattern_terminal(symbol: &Symbol) -> bool {
    matches!(symbol.body, SymbolBody::Terminal(_) | SymbolBody::Regexp(_, _))
}

/// Breadth-first walk of every symbol reachable from any of `roots`, in the
/// order first reached - the order the tokenizer's terminal list receives
/// its entries in (§4.1), and the set the `Grammar` itself reports via
/// [`Grammar::symbols`]. A builder-declared rule that the start symbol never
/// actually refers to (the typical case: a whitespace terminal consumed only
/// by an `ignore` transform) is still reachable this way, as long as it was
/// passed in as one of the roots.
fn reachable(roots: &[Rc<Symbol>]) -> Vec<Rc<Symbol>> {
    let mut seen = std::collections::HashSet::new();
    let mut queue = std::collections::VecDeque::new();
    let mut order = Vec::new();
    for root in roots {
        if seen.insert(seen_key(root)) {
            queue.push_back(root.clone());
        }
    }
    while let Some(symbol) = queue.pop_front() {
        order.push(symbol.clone());
        for child in children_of(&symbol) {
            let key = seen_key(&child);
            if seen.insert(key) {
                queue.push_back(child);
            }
        }
    }
    order
}

/// Owns the symbol set, the assembled tokenizer, the token-transform
/// pipeline and the default drop policy; `parse` is the library's single
/// entry point (§6).
pub struct Grammar {
    start: Rc<Symbol>,
    symbols: Vec<Rc<Symbol>>,
    terminals: Vec<Rc<Symbol>>,
    tokenizer: Tokenizer,
    pipeline: Vec<TokenTransform>,
    drop_terminals: bool,
    options: ParseOptions,
}

impl Grammar {
    pub fn new(
        start: Rc<Symbol>,
        pipeline: Vec<TokenTransform>,
        drop_terminals: bool,
        options: ParseOptions,
    ) -> Result<Self, ImplementationError> {
        Self::with_extra_roots(start, Vec::new(), pipeline, drop_terminals, options)
    }

    /// Like [`new`](Self::new), but also roots the reachability traversal at
    /// `extra_roots` - every symbol a [`GrammarBuilder`] was ever asked to
    /// [`define`](GrammarBuilder::define), so a rule the start symbol never
    /// refers to directly (a whitespace terminal meant only for an `ignore`
    /// transform) still joins the tokenizer's terminal set.
    pub(crate) fn with_extra_roots(
        start: Rc<Symbol>,
        extra_roots: Vec<Rc<Symbol>>,
        pipeline: Vec<TokenTransform>,
        drop_terminals: bool,
        options: ParseOptions,
    ) -> Result<Self, ImplementationError> {
        let start = start.resolved();
        let mut roots = vec![start.clone()];
        roots.extend(extra_roots);
        let symbols = reachable(&roots);
        let terminals: Vec<Rc<Symbol>> = symbols.iter().filter(|s| is_pattern_terminal(s)).cloned().collect();
        let tokenizer = Tokenizer::new(terminals.clone())?;
        Ok(Self {
            start,
            symbols,
            terminals,
            tokenizer,
            pipeline,
            drop_terminals,
            options,
        })
    }

    /// Every symbol reachable from the grammar's start rule, in traversal
    /// order. Mostly useful for the [formatter](crate::format).
    pub fn symbols(&self) -> &[Rc<Symbol>] {
        &self.symbols
    }

    pub fn start(&self) -> &Rc<Symbol> {
        &self.start
    }

    /// Tokenize, run the transform pipeline, then drive the engine over
    /// `source` from the grammar's start symbol.
    pub fn parse(&self, source: &str) -> Result<ParseNode, ParseError> {
        let code = Code::new(source);
        let tokens = self.tokenizer.tokenize(&code)?;
        let tokens = transform::apply_pipeline(&self.pipeline, tokens)?;
        let mut stream = TokenStream::new(tokens);
        engine::run(&self.start, &code, &mut stream, self.drop_terminals, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_resolves_a_forward_reference() {
        let builder = GrammarBuilder::new();
        let expr = builder.rule("expr");
        assert!(matches!(expr.body, SymbolBody::Proxy(_)));
        let number = Symbol::regexp("[0-9]+").unwrap();
        builder.define("expr", number);
        assert_eq!(expr.resolved().to_string(), "expr");
        assert!(matches!(expr.resolved().body, SymbolBody::Regexp(_, _)));
    }

    #[test]
    fn build_fails_on_an_unresolved_forward_reference() {
        let builder = GrammarBuilder::new();
        let dangling = builder.rule("never_defined");
        let result = builder.build(dangling, Vec::new(), false, ParseOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn grammar_collects_terminals_reachable_from_start() {
        let plus = Symbol::terminal("+");
        let number = Symbol::regexp("[0-9]+").unwrap();
        let expr = Symbol::sequence(vec![number.clone(), plus.clone(), number.clone()]);
        let grammar = Grammar::new(expr, Vec::new(), false, ParseOptions::default()).unwrap();
        assert_eq!(grammar.terminals.len(), 2);
    }

    #[test]
    fn parse_runs_the_engine_end_to_end() {
        let plus = Symbol::terminal("+");
        let number = Symbol::regexp("[0-9]+").unwrap();
        let expr = Symbol::sequence(vec![number.clone(), plus.clone(), number.clone()]).named("expr");
        let grammar = Grammar::new(expr, Vec::new(), false, ParseOptions::default()).unwrap();
        let tree = grammar.parse("12+3").unwrap();
        assert_eq!(tree.children.len(), 3);
    }

    #[test]
    fn parse_reports_unparsed_trailing_input() {
        let plus = Symbol::terminal("+");
        let number = Symbol::regexp("[0-9]+").unwrap();
        let start = Symbol::sequence(vec![number, Symbol::optional(plus)]);
        let grammar = Grammar::new(start, Vec::new(), false, ParseOptions::default()).unwrap();
        let err = grammar.parse("12+3").unwrap_err();
        assert!(err.message.contains("unparsed"));
    }
}
