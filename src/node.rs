//! The parse tree and the structural rewrite applied as nodes are appended
//! to their parent during evaluation (§3, §4.4).

use crate::position::Position;
use crate::symbol::Symbol;
use crate::token::Token;
use crate::value::{TransformInput, Value};
use ptree::TreeItem;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// A node of the parse tree. Constructed when a symbol begins evaluating,
/// mutated only through [`ParseNode::append`] while that symbol is on top of
/// the engine's stack, and finalized when the symbol yields it.
#[derive(Clone)]
pub struct ParseNode {
    pub symbol: Rc<Symbol>,
    pub token: Option<Token>,
    pub children: Vec<ParseNode>,
    /// The smallest token offset covered by this node or any of its
    /// descendants; used to re-synchronize the token stream on backtrack.
    pub covered_from: usize,
    /// True only for the canonical empty placeholder yielded by `Optional`
    /// on failure or `Lookahead` on success - the equivalent of the "null
    /// symbol" child in §3 rule 1, which is unconditionally discarded on
    /// append regardless of any symbol's drop flag.
    null: bool,
}

impl ParseNode {
    pub fn new(symbol: Rc<Symbol>, token: Option<Token>, offset: usize) -> Self {
        Self {
            symbol,
            token,
            children: Vec::new(),
            covered_from: offset,
            null: false,
        }
    }

    /// An empty sentinel node produced by `Optional`/`Lookahead` on failure,
    /// discarded unconditionally wherever it is appended (§3 rule 1).
    pub fn empty(offset: usize) -> Self {
        Self {
            symbol: Symbol::epsilon(),
            token: None,
            children: Vec::new(),
            covered_from: offset,
            null: true,
        }
    }

    /// Append `child` to this node, applying the structural rewrite:
    /// 1. A null sentinel, or a child marked `drop`, is discarded outright.
    /// 2. A child marked `flatten` has its own children spliced in instead
    ///    of the child itself.
    /// 3. Otherwise the child is appended as-is and the covered-offset is
    ///    updated to the minimum of parent and child.
    pub fn append(&mut self, child: ParseNode, drop_terminals: bool) {
        if Self::should_drop(&child, drop_terminals) {
            return;
        }
        if child.symbol.is_flatten() {
            for grandchild in child.children {
                self.append(grandchild, drop_terminals);
            }
            return;
        }
        self.covered_from = self.covered_from.min(child.covered_from);
        self.children.push(child);
    }

    fn should_drop(child: &ParseNode, drop_terminals: bool) -> bool {
        if child.null {
            return true;
        }
        match child.symbol.drop_flag() {
            Some(true) => true,
            Some(false) => false,
            None => drop_terminals && crate::symbol::is_bare_terminal(&child.symbol),
        }
    }

    pub fn start(&self) -> Option<Position> {
        self.token.as_ref().map(|t| t.start)
    }

    /// Apply this node's symbol's transform to the symbol-kind-specific
    /// pre-value (§4.6): terminals hand their lexeme, `OneOf` hands its
    /// single child's value (not wrapped in a list), everything else hands
    /// the list of children's transformed values.
    ///
    /// An aliased node keeps the structure of whatever it aliases (§3: "a
    /// node produced through an alias carries the alias as its symbol", not
    /// an extra wrapping layer) - a `name ::= <other>` node has exactly the
    /// children `<other>` itself would have, so the pre-value shape is
    /// chosen by walking past `Alias` to find the real underlying kind,
    /// while the alias symbol's own transform function still runs.
    pub fn transform(&self) -> Value {
        use crate::symbol::SymbolBody::*;
        let mut effective = &self.symbol;
        while let Alias(target) = &effective.body {
            effective = target;
        }
        let input = match &effective.body {
            Terminal(_) | Regexp(_, _) => {
                TransformInput::Leaf(self.token.as_ref().map(|t| t.lexeme.clone()).unwrap_or_default())
            }
            Marker(_) | Epsilon => TransformInput::Empty,
            OneOf(_) => match self.children.first() {
                Some(only) => TransformInput::Single(only.transform()),
                None => TransformInput::Empty,
            },
            Proxy(_) => unreachable!("proxies are resolved before a node can be produced for them"),
            _ => TransformInput::List(self.children.iter().map(|c| c.transform()).collect()),
        };
        self.symbol.transform_value(input)
    }

    pub fn contains(&self, predicate: &dyn Fn(&Symbol) -> bool) -> bool {
        predicate(&self.symbol) || self.children.iter().any(|c| c.contains(predicate))
    }

    pub fn find<'a>(&'a self, predicate: &dyn Fn(&Symbol) -> bool) -> Option<&'a ParseNode> {
        if predicate(&self.symbol) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(predicate))
    }

    /// Concatenation of leaf lexemes, left to right, skipping nodes with no
    /// token of their own (markers, epsilon, dropped/flattened internals
    /// already spliced away). Used by the yield-equals-source-tokens
    /// invariant in the test suite.
    pub fn leaf_lexemes(&self, out: &mut Vec<String>) {
        if self.children.is_empty() {
            if let Some(token) = &self.token {
                out.push(token.lexeme.clone());
            }
            return;
        }
        for child in &self.children {
            child.leaf_lexemes(out);
        }
    }

    pub fn print(&self) -> std::io::Result<()> {
        ptree::print_tree(self)
    }
}

impl Debug for ParseNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseNode")
            .field("symbol", &self.symbol.to_string())
            .field("lexeme", &self.token.as_ref().map(|t| &t.lexeme))
            .field("children", &self.children)
            .finish()
    }
}

impl TreeItem for ParseNode {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match &self.token {
            Some(token) => write!(f, "{} {:?}", self.symbol, token.lexeme),
            None => write!(f, "{}", self.symbol),
        }
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        std::borrow::Cow::from(&self.children)
    }
}
