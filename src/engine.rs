//! The iterative driver (§4.5): a stack of frames advanced by hand instead
//! of native recursion, a packrat memo keyed by (symbol, offset), and
//! left-recursion detection over the live stack.
//!
//! Each symbol variant implements the same three-way protocol a Python
//! generator would: given either nothing (first resumption), a child's
//! finished node, or a child's error, it either asks for another child or
//! produces its own final result. Here that protocol is `Frame::resume`,
//! called by the driver loop instead of `next()`/`send()`/`throw()`.

use crate::error::{ImplementationError, ParseError, ProductionError};
use crate::node::ParseNode;
use crate::position::{Code, Position};
use crate::stream::TokenStream;
use crate::symbol::{terminal_matches, Symbol, SymbolBody};
use std::collections::HashMap;
use std::rc::Rc;

/// Bounds a parse: whether left-recursion is checked for, and how many
/// driver steps to allow before giving up rather than looping forever on a
/// pathological or (with detection off) left-recursive grammar.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub step_limit: Option<usize>,
    pub detect_left_recursion: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            step_limit: None,
            detect_left_recursion: true,
        }
    }
}

/// What a frame is doing when not waiting on a child - only compound
/// symbols need to remember progress between resumptions; terminals and the
/// wrapper symbols (Optional/Lookahead/Alias) finish or request their one
/// child in a single step and need nothing extra.
enum FrameState {
    Simple,
    Sequence {
        index: usize,
        node: ParseNode,
    },
    OneOf {
        index: usize,
        node: ParseNode,
        longest_error: Option<ProductionError>,
    },
    Repeat {
        matches: usize,
        node: ParseNode,
        phase: RepeatPhase,
        loop_offset: usize,
    },
}

/// Which child a `Repeat` frame is currently waiting on, which in turn
/// decides how a failure of that child is interpreted (§4.4/§8):
/// a bare body or a separator failing just ends the loop normally, but a
/// body failing right after its leading separator was already consumed
/// fails the whole repeat unless `trailing` forgives the dangling separator.
#[derive(Clone, Copy, PartialEq, Eq)]
enum RepeatPhase {
    Body,
    Separator,
    BodyAfterSeparator,
}

struct Frame {
    symbol: Rc<Symbol>,
    offset: usize,
    state: FrameState,
}

#[derive(PartialEq, Eq, Hash, Clone)]
enum MemoKey {
    Terminal(String),
    Identity(usize),
}

impl MemoKey {
    fn for_symbol(symbol: &Rc<Symbol>) -> Self {
        match &symbol.body {
            SymbolBody::Terminal(lexeme) => MemoKey::Terminal(lexeme.clone()),
            _ => MemoKey::Identity(Rc::as_ptr(symbol) as *const () as usize),
        }
    }
}

/// Caches a finished node keyed by the symbol that produced it and the
/// token offset it started at, so any subsequent request for the same
/// subproblem seeks straight to the recorded end offset instead of
/// re-running the frame. Entries stay valid for the whole parse: the token
/// buffer is append-only, so nothing a cached entry depends on ever changes
/// underneath it.
struct Memo {
    entries: HashMap<(MemoKey, usize), (ParseNode, usize)>,
    drop_terminals: bool,
}

impl Memo {
    fn new(drop_terminals: bool) -> Self {
        Self {
            entries: HashMap::new(),
            drop_terminals,
        }
    }
    fn get(&self, symbol: &Rc<Symbol>, offset: usize) -> Option<&(ParseNode, usize)> {
        self.entries.get(&(MemoKey::for_symbol(symbol), offset))
    }
    fn insert(&mut self, symbol: &Rc<Symbol>, offset: usize, node: ParseNode, end_offset: usize) {
        self.entries
            .insert((MemoKey::for_symbol(symbol), offset), (node, end_offset));
    }
}

enum Arg {
    Descend(Rc<Symbol>),
}

/// Resolve a token-stream index (what `ProductionError::offset`, `frame.offset`
/// and `stream.tell()` all carry) to the source position it actually points
/// at. `Code::position_at` expects a byte offset, not a token index, so a
/// raw index can only be handed to it after this lookup - past the end of
/// the stream there is no token left to ask, so it falls back to the
/// position just past the end of the source.
fn token_position(stream: &TokenStream, code: &Code, token_index: usize) -> Position {
    match stream.token_at(token_index) {
        Some(token) => token.start,
        None => code.position_at(code.text.len()),
    }
}

/// Run a grammar's `start` symbol against `stream`, returning the completed
/// tree or the first error that escapes the stack.
pub(crate) fn run(
    start: &Rc<Symbol>,
    code: &Code,
    stream: &mut TokenStream,
    drop_terminals: bool,
    options: &ParseOptions,
) -> Result<ParseNode, ParseError> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut memo = Memo::new(drop_terminals);
    let mut arg = Arg::Descend(start.resolved());
    let mut steps: usize = 0;

    loop {
        if let Some(limit) = options.step_limit {
            if steps >= limit {
                return Err(ParseError::new(
                    token_position(stream, code, stream.tell()),
                    "parse exceeded its step limit".to_string(),
                ));
            }
        }
        steps += 1;

        match arg {
            Arg::Descend(symbol) => {
                let offset = stream.tell();

                if let Some((node, end_offset)) = memo.get(&symbol, offset) {
                    let node = node.clone();
                    let end_offset = *end_offset;
                    stream.seek(end_offset);
                    match resume_top(&mut stack, node, stream, &mut memo) {
                        Ok(Flow::Continue(next_arg)) => {
                            arg = next_arg;
                            continue;
                        }
                        Ok(Flow::Done(root)) => return Ok(finish(root, code, stream)?),
                        Err((fail_offset, error)) => {
                            match propagate_error(&mut stack, stream, &mut memo, code, fail_offset, error)? {
                                Flow::Continue(next_arg) => {
                                    arg = next_arg;
                                    continue;
                                }
                                Flow::Done(root) => return Ok(finish(root, code, stream)?),
                            }
                        }
                    }
                }

                if options.detect_left_recursion
                    && stack
                        .iter()
                        .any(|frame| frame.offset == offset && Rc::ptr_eq(&frame.symbol, &symbol))
                {
                    return Err(ParseError::new(
                        token_position(stream, code, offset),
                        ImplementationError::left_recursion(&symbol.to_string()).message,
                    ));
                }

                let mut frame = Frame {
                    symbol: symbol.clone(),
                    offset,
                    state: initial_state(&symbol, offset),
                };
                match start_frame(&mut frame, stream) {
                    StepOutcome::RequestChild(child) => {
                        stack.push(frame);
                        arg = Arg::Descend(child.resolved());
                    }
                    StepOutcome::Done(node) => {
                        stack.push(frame);
                        match resolve_top(&mut stack, node, &mut memo, stream) {
                            Flow::Continue(next_arg) => arg = next_arg,
                            Flow::Done(root) => return Ok(finish(root, code, stream)?),
                        }
                    }
                    StepOutcome::Fail(error) => {
                        stack.push(frame);
                        match propagate_error(&mut stack, stream, &mut memo, code, offset, error)? {
                            Flow::Continue(next_arg) => arg = next_arg,
                            Flow::Done(root) => return Ok(finish(root, code, stream)?),
                        }
                    }
                }
            }
        }
    }
}

enum Flow {
    Continue(Arg),
    Done(ParseNode),
}

/// The top frame's producer just yielded a finished node: memoize it,
/// pop, and either hand the node to the new top or, if the stack is now
/// empty, finish.
fn resolve_top(stack: &mut Vec<Frame>, node: ParseNode, memo: &mut Memo, stream: &mut TokenStream) -> Flow {
    let top = stack.pop().expect("resolve_top called with an empty stack");
    memo.insert(&top.symbol, top.offset, node.clone(), stream.tell());
    if stack.is_empty() {
        Flow::Done(node)
    } else {
        match resume_top(stack, node, stream, memo) {
            Ok(flow) => flow,
            Err(_) => unreachable!("sending a node upward never produces a ParseError"),
        }
    }
}

/// Resume the stack's top frame with a finished child node, memoizing/
/// popping frames that finish as a result the same way [`resolve_top`]
/// would, without re-entering the driver loop. Used both for ordinary
/// upward returns and for memo hits, which hand a cached node directly to
/// the top frame rather than going through `start_frame`.
fn resume_top(
    stack: &mut Vec<Frame>,
    node: ParseNode,
    stream: &mut TokenStream,
    memo: &mut Memo,
) -> Result<Flow, (usize, ProductionError)> {
    let top = stack.last_mut().expect("resume_top called with an empty stack");
    let offset = top.offset;
    match resume_frame(top, node, stream, memo.drop_terminals) {
        StepOutcome::RequestChild(child) => Ok(Flow::Continue(Arg::Descend(child.resolved()))),
        StepOutcome::Done(node) => Ok(resolve_top(stack, node, memo, stream)),
        StepOutcome::Fail(error) => Err((offset, error)),
    }
}

/// Unwind the stack on failure: rewind to the failed frame's entry offset,
/// pop it, and throw the error into the new top. If the stack empties
/// without anyone catching it, the parse has failed outright. Each frame is
/// popped exactly once, on entry to this call - a frame that re-fails is
/// handed to the next recursive call rather than popped again here.
fn propagate_error(
    stack: &mut Vec<Frame>,
    stream: &mut TokenStream,
    memo: &mut Memo,
    code: &Code,
    fail_offset: usize,
    error: ProductionError,
) -> Result<Flow, ParseError> {
    stream.seek(fail_offset);
    stack.pop();
    loop {
        let Some(top) = stack.last_mut() else {
            let position = token_position(stream, code, error.offset());
            return Err(ParseError::from_production(position, &error));
        };
        match resume_frame_with_error(top, error.clone(), stream) {
            StepOutcome::RequestChild(child) => return Ok(Flow::Continue(Arg::Descend(child.resolved()))),
            StepOutcome::Done(node) => return Ok(resolve_top(stack, node, memo, stream)),
            StepOutcome::Fail(next_error) => {
                let next_offset = top.offset;
                return propagate_error(stack, stream, memo, code, next_offset, next_error);
            }
        }
    }
}

fn finish(root: ParseNode, code: &Code, stream: &mut TokenStream) -> Result<ParseNode, ParseError> {
    match stream.next() {
        Some(token) => Err(ParseError::new(
            code.position_at(token.start.offset),
            format!("unparsed trailing input: {:?}", token.lexeme),
        )),
        None => Ok(root),
    }
}

enum StepOutcome {
    RequestChild(Rc<Symbol>),
    Done(ParseNode),
    Fail(ProductionError),
}

fn initial_state(symbol: &Rc<Symbol>, offset: usize) -> FrameState {
    match &symbol.body {
        SymbolBody::Sequence(_) => FrameState::Sequence {
            index: 0,
            node: ParseNode::new(symbol.clone(), None, offset),
        },
        SymbolBody::OneOf(_) => FrameState::OneOf {
            index: 0,
            node: ParseNode::new(symbol.clone(), None, offset),
            longest_error: None,
        },
        SymbolBody::Repeat { .. } => FrameState::Repeat {
            matches: 0,
            node: ParseNode::new(symbol.clone(), None, offset),
            phase: RepeatPhase::Body,
            loop_offset: offset,
        },
        _ => FrameState::Simple,
    }
}

fn unexpected(offset: usize, expected: &Rc<Symbol>, found: &str) -> ProductionError {
    ProductionError::UnexpectedToken {
        offset,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

#[cfg(debug_assertions)]
fn trace(event: &str, symbol: &Rc<Symbol>, offset: usize) {
    if let Some(label) = symbol.debug_label() {
        eprintln!("[{}] {} at offset {}", label, event, offset);
    }
}

/// Run a freshly-pushed frame to its first suspension point or completion.
fn start_frame(frame: &mut Frame, stream: &mut TokenStream) -> StepOutcome {
    #[cfg(debug_assertions)]
    trace("entering", &frame.symbol, frame.offset);
    let outcome = start_frame_inner(frame, stream);
    #[cfg(debug_assertions)]
    match &outcome {
        StepOutcome::Done(_) => trace("matched", &frame.symbol, frame.offset),
        StepOutcome::Fail(_) => trace("failed", &frame.symbol, frame.offset),
        StepOutcome::RequestChild(_) => {}
    }
    outcome
}

fn start_frame_inner(frame: &mut Frame, stream: &mut TokenStream) -> StepOutcome {
    match &frame.symbol.body {
        SymbolBody::Terminal(_) | SymbolBody::Regexp(_, _) | SymbolBody::Marker(_) => {
            match stream.next() {
                Some(token) if terminal_matches(&token.symbol, &frame.symbol) => {
                    let token = token.clone();
                    StepOutcome::Done(ParseNode::new(frame.symbol.clone(), Some(token), frame.offset))
                }
                Some(token) => {
                    let found = token.lexeme.clone();
                    StepOutcome::Fail(unexpected(frame.offset, &frame.symbol, &found))
                }
                None => StepOutcome::Fail(unexpected(frame.offset, &frame.symbol, "end of input")),
            }
        }
        SymbolBody::Epsilon => StepOutcome::Done(ParseNode::new(frame.symbol.clone(), None, frame.offset)),
        SymbolBody::Sequence(items) => match items.first() {
            Some(first) => StepOutcome::RequestChild(first.clone()),
            None => StepOutcome::Done(ParseNode::new(frame.symbol.clone(), None, frame.offset)),
        },
        SymbolBody::OneOf(items) => match items.first() {
            Some(first) => StepOutcome::RequestChild(first.clone()),
            None => StepOutcome::Fail(ProductionError::Unparsed {
                offset: frame.offset,
                message: "OneOf with no alternatives".to_string(),
            }),
        },
        SymbolBody::Repeat { body, .. } => StepOutcome::RequestChild(body.clone()),
        SymbolBody::Optional(body) | SymbolBody::Lookahead(body) | SymbolBody::Alias(body) => {
            StepOutcome::RequestChild(body.clone())
        }
        SymbolBody::Proxy(_) => unreachable!("proxies are resolved before being pushed"),
    }
}

/// Resume a frame already on the stack with its child's finished node.
fn resume_frame(frame: &mut Frame, child: ParseNode, stream: &mut TokenStream, drop_terminals: bool) -> StepOutcome {
    match (&frame.symbol.body, &mut frame.state) {
        (SymbolBody::Sequence(items), FrameState::Sequence { index, node }) => {
            node.append(child, drop_terminals);
            *index += 1;
            match items.get(*index) {
                Some(next) => StepOutcome::RequestChild(next.clone()),
                None => StepOutcome::Done(node.clone()),
            }
        }
        (SymbolBody::OneOf(_), FrameState::OneOf { node, .. }) => {
            node.append(child, drop_terminals);
            StepOutcome::Done(node.clone())
        }
        (
            SymbolBody::Repeat {
                body,
                separator,
                min_matches,
                ..
            },
            FrameState::Repeat {
                matches,
                node,
                phase,
                loop_offset,
            },
        ) => {
            node.append(child, drop_terminals);
            match phase {
                RepeatPhase::Body => {
                    *matches += 1;
                    match separator {
                        None => {
                            let progressed = stream.tell() != *loop_offset;
                            if !progressed {
                                return finish_repeat(node.clone(), *matches, *min_matches, frame.offset);
                            }
                            *loop_offset = stream.tell();
                            StepOutcome::RequestChild(body.clone())
                        }
                        Some(sep) => {
                            *phase = RepeatPhase::Separator;
                            StepOutcome::RequestChild(sep.clone())
                        }
                    }
                }
                RepeatPhase::Separator => {
                    *phase = RepeatPhase::BodyAfterSeparator;
                    StepOutcome::RequestChild(body.clone())
                }
                RepeatPhase::BodyAfterSeparator => {
                    *matches += 1;
                    let progressed = stream.tell() != *loop_offset;
                    if !progressed {
                        return finish_repeat(node.clone(), *matches, *min_matches, frame.offset);
                    }
                    *loop_offset = stream.tell();
                    *phase = RepeatPhase::Separator;
                    let sep = separator.as_ref().expect("BodyAfterSeparator only reached when a separator is configured");
                    StepOutcome::RequestChild(sep.clone())
                }
            }
        }
        (SymbolBody::Optional(_), FrameState::Simple) => StepOutcome::Done(child),
        (SymbolBody::Lookahead(_), FrameState::Simple) => {
            stream.seek(frame.offset);
            StepOutcome::Done(ParseNode::empty(frame.offset))
        }
        (SymbolBody::Alias(target), FrameState::Simple) => {
            let mut child = child;
            if Rc::ptr_eq(&child.symbol, &target.resolved()) {
                child.symbol = frame.symbol.clone();
            }
            StepOutcome::Done(child)
        }
        _ => unreachable!("frame state does not match its symbol's kind"),
    }
}

fn finish_repeat(node: ParseNode, matches: usize, min_matches: usize, offset: usize) -> StepOutcome {
    if matches >= min_matches {
        StepOutcome::Done(node)
    } else {
        StepOutcome::Fail(ProductionError::Unparsed {
            offset,
            message: format!("expected at least {} repetitions, found {}", min_matches, matches),
        })
    }
}

/// Resume a frame already on the stack with a child's error instead of a
/// node - the only frames that ever catch one are `OneOf`, `Repeat`
/// (body failure ends the loop rather than propagating), and a `Repeat`
/// whose dangling separator is accepted by `trailing`.
fn resume_frame_with_error(frame: &mut Frame, error: ProductionError, _stream: &mut TokenStream) -> StepOutcome {
    match (&frame.symbol.body, &mut frame.state) {
        (SymbolBody::OneOf(items), FrameState::OneOf { index, longest_error, .. }) => {
            let worse = match longest_error {
                Some(existing) if existing.offset() >= error.offset() => existing.clone(),
                _ => error,
            };
            *longest_error = Some(worse);
            *index += 1;
            match items.get(*index) {
                Some(next) => StepOutcome::RequestChild(next.clone()),
                None => StepOutcome::Fail(longest_error.clone().expect("at least this error was recorded")),
            }
        }
        (
            SymbolBody::Repeat { min_matches, trailing, .. },
            FrameState::Repeat { matches, node, phase, .. },
        ) => match phase {
            // The body (first attempt) or a separator failed to match: the
            // loop simply ends here, same as finding the end of the list.
            RepeatPhase::Body | RepeatPhase::Separator => {
                finish_repeat(node.clone(), *matches, *min_matches, frame.offset)
            }
            // A separator was already consumed and appended, but the body
            // that should follow it failed to match: the whole repeat fails
            // unless `trailing` forgives the dangling separator (§4.4/§8).
            RepeatPhase::BodyAfterSeparator if *trailing => {
                finish_repeat(node.clone(), *matches, *min_matches, frame.offset)
            }
            RepeatPhase::BodyAfterSeparator => StepOutcome::Fail(error),
        },
        (SymbolBody::Sequence(_), _) => StepOutcome::Fail(error),
        (SymbolBody::Optional(_), FrameState::Simple) => StepOutcome::Done(ParseNode::empty(frame.offset)),
        (SymbolBody::Lookahead(_), FrameState::Simple) => StepOutcome::Fail(error),
        (SymbolBody::Alias(_), FrameState::Simple) => StepOutcome::Fail(error),
        _ => unreachable!("frame state does not match its symbol's kind"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn drive(start: &Rc<Symbol>, terminals: Vec<Rc<Symbol>>, source: &str) -> Result<ParseNode, ParseError> {
        let tokenizer = Tokenizer::new(terminals).unwrap();
        let code = Code::new(source);
        let tokens = tokenizer.tokenize(&code).unwrap();
        let mut stream = TokenStream::new(tokens);
        run(start, &code, &mut stream, false, &ParseOptions::default())
    }

    #[test]
    fn one_of_picks_the_first_matching_alternative() {
        let a = Symbol::terminal("A");
        let b = Symbol::terminal("B");
        let ab = Symbol::one_of(vec![a.clone(), b.clone()]);
        let node = drive(&ab, vec![a, b], "A").unwrap();
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].token.as_ref().unwrap().lexeme, "A");
    }

    #[test]
    fn one_of_reports_longest_match_error_on_total_failure() {
        let a = Symbol::terminal("A");
        let bc = Symbol::terminal("BC");
        let one = Symbol::one_of(vec![a.clone(), bc.clone()]);
        let err = drive(&one, vec![a, bc], "BD").unwrap_err();
        assert!(err.message.contains("BD"));
    }

    #[test]
    fn sequence_requires_every_child_in_order() {
        let a = Symbol::terminal("A");
        let b = Symbol::terminal("B");
        let seq = Symbol::sequence(vec![a.clone(), b.clone()]);
        let node = drive(&seq, vec![a, b], "AB").unwrap();
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn repeat_with_separator_collects_bodies_and_separators() {
        let a = Symbol::terminal("A");
        let comma = Symbol::terminal(",");
        let repeat = Symbol::repeat(a.clone(), Some(comma.clone()), 0, false);
        let node = drive(&repeat, vec![a, comma], "A,A").unwrap();
        assert_eq!(node.children.len(), 3);
    }

    #[test]
    fn repeat_with_separator_rejects_dangling_separator_unless_trailing() {
        let a = Symbol::terminal("A");
        let comma = Symbol::terminal(",");
        let strict = Symbol::repeat(a.clone(), Some(comma.clone()), 0, false);
        assert!(drive(&strict, vec![a.clone(), comma.clone()], "A,").is_err());

        let trailing = Symbol::repeat(a.clone(), Some(comma.clone()), 0, true);
        let node = drive(&trailing, vec![a, comma], "A,").unwrap();
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn left_recursion_is_detected() {
        let proxy = Symbol::proxy();
        let plus = Symbol::terminal("+");
        let x = Symbol::terminal("x");
        let recursive = Symbol::one_of(vec![Symbol::sequence(vec![proxy.clone(), plus.clone(), x.clone()]), x.clone()]);
        if let SymbolBody::Proxy(slot) = &proxy.body {
            *slot.borrow_mut() = Some(recursive.clone());
        }
        let err = drive(&recursive, vec![plus, x], "x+x").unwrap_err();
        assert!(err.message.contains("left recursive"));
    }

    #[test]
    fn optional_yields_the_inner_node_unwrapped_on_success() {
        let a = Symbol::terminal("A");
        let start = Symbol::sequence(vec![a.clone(), Symbol::optional(a.clone())]);
        let node = drive(&start, vec![a], "AA").unwrap();
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn lookahead_rewinds_and_consumes_nothing() {
        let x = Symbol::terminal("x");
        let y = Symbol::terminal("y");
        let start = Symbol::sequence(vec![Symbol::lookahead(x.clone()), x.clone()]);
        let node = drive(&start, vec![x, y], "x").unwrap();
        assert_eq!(node.children.len(), 1);
    }
}
