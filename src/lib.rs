//! A recursive-descent parser construction library: compose a grammar from
//! symbols and get a backtracking, memoizing parser with an explicit-stack
//! engine.
//!
//! # Overview
//!
//! A grammar is built from [`Symbol`] values composed with [`Symbol::sequence`],
//! [`Symbol::one_of`], [`Symbol::repeat`] and friends (or the `+`/`|` operator
//! sugar), bound into named rules through a [`GrammarBuilder`], and handed to
//! [`Grammar::new`] (or [`GrammarBuilder::build`]) to assemble a tokenizer and
//! a runnable [`Grammar`]. [`Grammar::parse`] tokenizes, runs any configured
//! [token transforms](transform), and drives the engine to a [`ParseNode`]
//! tree or a [`ParseError`].
//!
//! # Design
//!
//! Unlike a parser generator that compiles a grammar to tables in a separate
//! language, this crate represents a grammar as ordinary Rust values and
//! parses it with an **iterative** driver: each symbol's evaluation is
//! represented as an explicit per-kind state (see [the engine's internal
//! `Frame`]) advanced by a stack-based loop rather than native recursion, so
//! that backtracking is a stack pop and a token-stream seek rather than an
//! unwind. A packrat memo keyed by `(symbol, token offset)` keeps exponential
//! backtracking blowups from recomputing the same subproblem twice, and a
//! left-recursion check over the live stack turns infinite descent into an
//! ordinary parse error.
//!
//! # Example
//!
//! ```
//! use rdparse::{GrammarBuilder, Symbol};
//!
//! let plus = Symbol::terminal("+");
//! let number = Symbol::regexp("[0-9]+").unwrap();
//! let builder = GrammarBuilder::new();
//! let expr = builder.define(
//!     "expr",
//!     Symbol::repeat(number, Some(plus), 1, false),
//! );
//! let grammar = builder.build(expr, Vec::new(), false, Default::default()).unwrap();
//! let tree = grammar.parse("1+2+3").unwrap();
//! assert_eq!(tree.children.len(), 5);
//! ```
//!
//! [the engine's internal `Frame`]: https://docs.rs/rdparse

mod engine;
mod error;
mod format;
mod grammar;
mod node;
mod position;
pub mod showcase;
mod stream;
mod symbol;
mod token;
mod tokenizer;
pub mod transform;
mod value;

pub use crate::engine::ParseOptions;
pub use crate::error::{ImplementationError, ParseError};
pub use crate::format::GrammarFormatter;
pub use crate::grammar::{Grammar, GrammarBuilder};
pub use crate::node::ParseNode;
pub use crate::position::{Code, Position};
pub use crate::symbol::{drop_sym as drop, flatten, keep, Symbol};
pub use crate::token::Token;
pub use crate::value::{identity_transform, TransformInput, Value};
