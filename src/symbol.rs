//! The grammar DSL: the small algebra of symbols a grammar is built from.
//!
//! A [`Symbol`] is always held behind an [`Rc`] once it is wired into a
//! grammar, mirroring how the teacher crate wires up its own production
//! utilities (`Rc<dyn IProduction>`). Structural annotations ([`flatten`],
//! [`drop`], [`keep`]) clone the symbol so that one grammar rule can be
//! dropped in one context and kept in another - the flags live on the
//! *occurrence*, not on the underlying definition.

use crate::error::ImplementationError;
use crate::value::{identity_transform, TransformInput, Value};
use regex::Regex;
use std::cell::{Cell, RefCell};
use std::fmt::{self, Display, Formatter};
use std::ops::{Add, BitOr};
use std::rc::Rc;

pub type TransformFn = Rc<dyn Fn(Value) -> Value>;

/// Fields shared by every symbol variant: name, structural flags, the
/// transform function, tokenizer tie-break priority, and a stable position
/// used for deterministic iteration over named rules.
pub struct SymbolData {
    name: RefCell<Option<&'static str>>,
    flatten: Cell<bool>,
    drop: Cell<Option<bool>>,
    transform: RefCell<TransformFn>,
    priority: Cell<i32>,
    position: Cell<i64>,
    debug_label: Cell<Option<&'static str>>,
}

impl Default for SymbolData {
    fn default() -> Self {
        Self {
            name: RefCell::new(None),
            flatten: Cell::new(false),
            drop: Cell::new(None),
            transform: RefCell::new(Rc::new(|value| value)),
            priority: Cell::new(-1),
            position: Cell::new(-1),
            debug_label: Cell::new(None),
        }
    }
}

impl Clone for SymbolData {
    fn clone(&self) -> Self {
        Self {
            name: RefCell::new(*self.name.borrow()),
            flatten: Cell::new(self.flatten.get()),
            drop: Cell::new(self.drop.get()),
            transform: RefCell::new(self.transform.borrow().clone()),
            priority: Cell::new(self.priority.get()),
            position: Cell::new(self.position.get()),
            debug_label: Cell::new(self.debug_label.get()),
        }
    }
}

/// A single resolution slot for a forward-declared rule. Cloning a
/// [`Symbol`] whose body is `Proxy` clones this `Rc`, not its contents, so
/// every occurrence of the forward reference observes the same eventual
/// binding regardless of when it was annotated.
pub type ProxySlot = Rc<RefCell<Option<Rc<Symbol>>>>;

pub enum SymbolBody {
    Terminal(String),
    Regexp(String, Regex),
    Marker(&'static str),
    Epsilon,
    Sequence(Vec<Rc<Symbol>>),
    OneOf(Vec<Rc<Symbol>>),
    Repeat {
        body: Rc<Symbol>,
        separator: Option<Rc<Symbol>>,
        min_matches: usize,
        trailing: bool,
    },
    Optional(Rc<Symbol>),
    Lookahead(Rc<Symbol>),
    Proxy(ProxySlot),
    Alias(Rc<Symbol>),
}

impl Clone for SymbolBody {
    fn clone(&self) -> Self {
        match self {
            SymbolBody::Terminal(s) => SymbolBody::Terminal(s.clone()),
            SymbolBody::Regexp(s, re) => SymbolBody::Regexp(s.clone(), re.clone()),
            SymbolBody::Marker(name) => SymbolBody::Marker(name),
            SymbolBody::Epsilon => SymbolBody::Epsilon,
            SymbolBody::Sequence(items) => SymbolBody::Sequence(items.clone()),
            SymbolBody::OneOf(items) => SymbolBody::OneOf(items.clone()),
            SymbolBody::Repeat {
                body,
                separator,
                min_matches,
                trailing,
            } => SymbolBody::Repeat {
                body: body.clone(),
                separator: separator.clone(),
                min_matches: *min_matches,
                trailing: *trailing,
            },
            SymbolBody::Optional(s) => SymbolBody::Optional(s.clone()),
            SymbolBody::Lookahead(s) => SymbolBody::Lookahead(s.clone()),
            SymbolBody::Proxy(slot) => SymbolBody::Proxy(slot.clone()),
            SymbolBody::Alias(s) => SymbolBody::Alias(s.clone()),
        }
    }
}

pub struct Symbol {
    pub data: SymbolData,
    pub body: SymbolBody,
}

impl Clone for Symbol {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            body: self.body.clone(),
        }
    }
}

impl Symbol {
    fn wrap(body: SymbolBody) -> Rc<Self> {
        Rc::new(Self {
            data: SymbolData::default(),
            body,
        })
    }

    pub fn terminal(lexeme: impl Into<String>) -> Rc<Self> {
        Self::wrap(SymbolBody::Terminal(lexeme.into()))
    }

    /// A terminal matched by a user regular expression. Rejected if the
    /// pattern can match the empty string, since a nullable terminal would
    /// let the tokenizer spin in place without consuming input.
    pub fn regexp(pattern: &str) -> Result<Rc<Self>, ImplementationError> {
        let anchored = format!("\\A(?:{})", pattern);
        let regexp = Regex::new(&anchored).map_err(|err| {
            ImplementationError::new(
                "InvalidPattern",
                format!("'{}' is not a valid regular expression: {}", pattern, err),
            )
        })?;
        if regexp.is_match("") {
            return Err(ImplementationError::new(
                "NullableRegexp",
                format!(
                    "regexp '{}' matches the empty string; use Symbol::epsilon() instead",
                    pattern
                ),
            ));
        }
        Ok(Self::wrap(SymbolBody::Regexp(pattern.to_string(), regexp)))
    }

    pub fn marker(name: &'static str) -> Rc<Self> {
        Self::wrap(SymbolBody::Marker(name))
    }

    pub fn epsilon() -> Rc<Self> {
        Self::wrap(SymbolBody::Epsilon)
    }

    pub fn sequence(symbols: Vec<Rc<Self>>) -> Rc<Self> {
        Self::wrap(SymbolBody::Sequence(symbols))
    }

    pub fn one_of(symbols: Vec<Rc<Self>>) -> Rc<Self> {
        Self::wrap(SymbolBody::OneOf(symbols))
    }

    pub fn repeat(body: Rc<Self>, separator: Option<Rc<Self>>, min_matches: usize, trailing: bool) -> Rc<Self> {
        Self::wrap(SymbolBody::Repeat {
            body,
            separator,
            min_matches,
            trailing,
        })
    }

    pub fn optional(body: Rc<Self>) -> Rc<Self> {
        Self::wrap(SymbolBody::Optional(body))
    }

    pub fn lookahead(body: Rc<Self>) -> Rc<Self> {
        Self::wrap(SymbolBody::Lookahead(body))
    }

    /// Create a forward reference. Its resolution slot starts empty and is
    /// filled in later by [`crate::grammar::GrammarBuilder`].
    pub fn proxy() -> Rc<Self> {
        Self::wrap(SymbolBody::Proxy(Rc::new(RefCell::new(None))))
    }

    pub fn alias(target: Rc<Self>, name: &'static str) -> Rc<Self> {
        let aliased = Self::wrap(SymbolBody::Alias(target));
        *aliased.data.name.borrow_mut() = Some(name);
        aliased
    }

    /// Bind a name onto this symbol, idempotently. Renaming an already-named
    /// symbol produces an [`Alias`](SymbolBody::Alias) rather than mutating
    /// the name in place, per §6.
    pub fn named(self: &Rc<Self>, name: &'static str) -> Rc<Self> {
        if self.data.name.borrow().is_some() {
            return Self::alias(self.clone(), name);
        }
        *self.data.name.borrow_mut() = Some(name);
        self.clone()
    }

    pub fn name(&self) -> Option<&'static str> {
        *self.data.name.borrow()
    }

    pub(crate) fn set_position(&self, position: i64) {
        self.data.position.set(position);
    }
    pub fn position(&self) -> i64 {
        self.data.position.get()
    }

    pub fn is_flatten(&self) -> bool {
        self.data.flatten.get()
    }
    pub fn drop_flag(&self) -> Option<bool> {
        self.data.drop.get()
    }
    pub fn priority(&self) -> i32 {
        self.data.priority.get()
    }

    /// Attach a debug label, traced via `eprintln!` as the engine enters and
    /// leaves this symbol's frame in `cfg(debug_assertions)` builds. Has no
    /// effect in release builds.
    pub fn debug(self: &Rc<Self>, label: &'static str) -> Rc<Self> {
        let clone = Rc::new(self.as_ref().clone());
        clone.data.debug_label.set(Some(label));
        clone
    }
    pub fn debug_label(&self) -> Option<&'static str> {
        self.data.debug_label.get()
    }
    pub fn with_priority(self: &Rc<Self>, priority: i32) -> Rc<Self> {
        let clone = Rc::new(self.as_ref().clone());
        clone.data.priority.set(priority);
        clone
    }

    /// Resolve through any chain of `Proxy`/`Alias` wrappers to the concrete
    /// symbol that actually performs the match. Used by the tokenizer and by
    /// terminal-set comparisons (e.g. `ignore`).
    pub fn resolved(self: &Rc<Self>) -> Rc<Self> {
        match &self.body {
            SymbolBody::Proxy(slot) => slot
                .borrow()
                .as_ref()
                .expect("proxy symbol used before it was resolved")
                .resolved(),
            _ => self.clone(),
        }
    }

    /// Chain a new transform function onto this occurrence: `g ∘ f`, where
    /// `f` is whatever was already attached (identity by default).
    pub fn set_transform<F: Fn(Value) -> Value + 'static>(self: &Rc<Self>, f: F) -> Rc<Self> {
        let clone = Rc::new(self.as_ref().clone());
        let previous = self.data.transform.borrow().clone();
        *clone.data.transform.borrow_mut() = Rc::new(move |value| f(previous(value)));
        clone
    }

    /// Apply this symbol's attached transform to the default, symbol-kind
    /// shaped pre-value (see §4.6).
    pub fn transform_value(&self, input: TransformInput) -> Value {
        let shaped = identity_transform(input);
        (self.data.transform.borrow())(shaped)
    }
}

/// Whether a token produced by the tokenizer for `token_symbol` satisfies a
/// grammar's request for `want`. `Terminal`s match by lexeme (so two
/// `Symbol::terminal("+")` calls in unrelated rules are interchangeable, per
/// §3), `Regexp`s by pattern text, and `Marker`/`Epsilon` by identity -
/// unlike a literal terminal a marker carries no lexeme to distinguish it
/// from any other marker, so only the exact `Rc` minted for it (e.g. by
/// [`crate::transform::indent::indent`]) counts as a match.
pub(crate) fn terminal_matches(token_symbol: &Rc<Symbol>, want: &Rc<Symbol>) -> bool {
    match (&token_symbol.body, &want.body) {
        (SymbolBody::Terminal(a), SymbolBody::Terminal(b)) => a == b,
        (SymbolBody::Regexp(a, _), SymbolBody::Regexp(b, _)) => a == b,
        (SymbolBody::Marker(_), SymbolBody::Marker(_)) | (SymbolBody::Epsilon, SymbolBody::Epsilon) => {
            Rc::ptr_eq(token_symbol, want)
        }
        _ => false,
    }
}

/// Whether `symbol` is a literal [`Terminal`](SymbolBody::Terminal), as
/// opposed to a `Regexp`, `Marker`, or compound symbol - used to decide
/// whether a grammar's `drop_terminals` default applies to it.
pub fn is_bare_terminal(symbol: &Rc<Symbol>) -> bool {
    matches!(symbol.body, SymbolBody::Terminal(_))
}

/// Clone `symbol`, setting `flatten = true` on the clone. Applying `flatten`
/// twice is idempotent since the flag is boolean.
pub fn flatten(symbol: &Rc<Symbol>) -> Rc<Symbol> {
    let clone = Rc::new(symbol.as_ref().clone());
    clone.data.flatten.set(true);
    clone
}

/// Clone `symbol`, setting `drop = true` on the clone: the produced node is
/// discarded entirely when its parent appends it.
pub fn drop_sym(symbol: &Rc<Symbol>) -> Rc<Symbol> {
    let clone = Rc::new(symbol.as_ref().clone());
    clone.data.drop.set(Some(true));
    clone
}

/// Clone `symbol`, setting `drop = false`: overrides a grammar-wide
/// `drop_terminals` default for this one occurrence.
pub fn keep(symbol: &Rc<Symbol>) -> Rc<Symbol> {
    let clone = Rc::new(symbol.as_ref().clone());
    clone.data.drop.set(Some(false));
    clone
}

impl Add for Rc<Symbol> {
    type Output = Rc<Symbol>;
    fn add(self, rhs: Rc<Symbol>) -> Rc<Symbol> {
        Symbol::sequence(vec![self, rhs])
    }
}

impl BitOr for Rc<Symbol> {
    type Output = Rc<Symbol>;
    fn bitor(self, rhs: Rc<Symbol>) -> Rc<Symbol> {
        Symbol::one_of(vec![self, rhs])
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return write!(f, "{}", name);
        }
        match &self.body {
            SymbolBody::Terminal(lexeme) => write!(f, "{:?}", lexeme),
            SymbolBody::Regexp(pattern, _) => write!(f, "/{}/", pattern),
            SymbolBody::Marker(name) => write!(f, "<{}>", name),
            SymbolBody::Epsilon => write!(f, "\u{025B}"),
            SymbolBody::Sequence(items) => {
                let rendered: Vec<String> = items.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", rendered.join(", "))
            }
            SymbolBody::OneOf(items) => {
                let rendered: Vec<String> = items.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", rendered.join(" | "))
            }
            SymbolBody::Repeat {
                body,
                separator: Some(sep),
                ..
            } => write!(f, "*({} {})", body, sep),
            SymbolBody::Repeat { body, .. } => write!(f, "*({})", body),
            SymbolBody::Optional(body) => write!(f, "({})?", body),
            SymbolBody::Lookahead(body) => write!(f, "(?>{})", body),
            SymbolBody::Proxy(slot) => match slot.borrow().as_ref() {
                Some(target) => write!(f, "{}", target),
                None => write!(f, "<unresolved>"),
            },
            SymbolBody::Alias(target) => write!(f, "{}", target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regexp_rejects_empty_match() {
        assert!(Symbol::regexp("a*").is_err());
        assert!(Symbol::regexp("a+").is_ok());
    }

    #[test]
    fn flatten_is_idempotent() {
        let a = Symbol::terminal("A");
        let once = flatten(&a);
        let twice = flatten(&once);
        assert_eq!(once.is_flatten(), twice.is_flatten());
        assert!(twice.is_flatten());
    }

    #[test]
    fn named_on_named_symbol_produces_alias() {
        let a = Symbol::terminal("A");
        let first = a.named("ab");
        let second = first.named("renamed");
        assert!(matches!(second.body, SymbolBody::Alias(_)));
        assert_eq!(second.name(), Some("renamed"));
    }

    #[test]
    fn proxy_resolution_is_shared_across_clones() {
        let proxy = Symbol::proxy();
        let flattened = flatten(&proxy);
        if let SymbolBody::Proxy(slot) = &proxy.body {
            *slot.borrow_mut() = Some(Symbol::terminal("A"));
        }
        assert_eq!(flattened.resolved().to_string(), "\"A\"");
    }
}
