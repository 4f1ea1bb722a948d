//! An arithmetic calculator: `+`/`-` unary signs, `*` and `+` binary
//! operators with the usual precedence, and parenthesized grouping.
//!
//! Grounded in `rdp/tests/test_parser.py`'s `CalculatorTest` - same rule
//! shape (`signed`, `product_expr`, `expr` each a `Repeat` folded down by its
//! transform), rebuilt against this crate's explicit `min_matches`/`trailing`
//! `Repeat` rather than the original's unary `+` sugar.

use crate::engine::ParseOptions;
use crate::grammar::{Grammar, GrammarBuilder};
use crate::symbol::{drop_sym, flatten, keep, Symbol};
use crate::transform::ignore::ignore;
use crate::value::Value;

fn as_number(value: &Value) -> f64 {
    value.as_number().unwrap_or(0.0)
}

pub fn build() -> Grammar {
    let builder = GrammarBuilder::new();
    let expr = builder.rule("expr");

    let number = Symbol::regexp(r"\d+(?:\.\d+)?").unwrap().set_transform(|v| match v {
        Value::String(s) => Value::Number(s.parse().unwrap_or(0.0)),
        other => other,
    });
    let number = builder.define("number", number);

    let atom = Symbol::one_of(vec![
        number,
        flatten(&Symbol::sequence(vec![
            drop_sym(&Symbol::terminal("(")),
            expr.clone(),
            drop_sym(&Symbol::terminal(")")),
        ])),
    ]);
    let atom = builder.define("atom", atom);

    let sign = Symbol::one_of(vec![keep(&Symbol::terminal("+")), keep(&Symbol::terminal("-"))]);
    let signed = Symbol::sequence(vec![Symbol::repeat(sign, None, 0, false), atom])
        .set_transform(|v| match v {
            Value::List(parts) if parts.len() == 2 => {
                let negate = match &parts[0] {
                    Value::List(ops) => ops
                        .iter()
                        .filter(|op| matches!(op, Value::String(s) if s == "-"))
                        .count()
                        % 2
                        == 1,
                    _ => false,
                };
                let magnitude = as_number(&parts[1]);
                Value::Number(if negate { -magnitude } else { magnitude })
            }
            other => other,
        });
    let signed = builder.define("signed", signed);

    let product_expr = Symbol::repeat(signed, Some(drop_sym(&Symbol::terminal("*"))), 1, false).set_transform(|v| {
        match v {
            Value::List(items) => Value::Number(items.iter().map(as_number).product()),
            other => other,
        }
    });
    let product_expr = builder.define("product_expr", product_expr);

    let expr_body = Symbol::repeat(product_expr, Some(drop_sym(&Symbol::terminal("+"))), 1, false).set_transform(|v| {
        match v {
            Value::List(items) => Value::Number(items.iter().map(as_number).sum()),
            other => other,
        }
    });
    let expr = builder.define("expr", expr_body);

    let whitespace = Symbol::regexp(r"[ \t]+").unwrap();
    let whitespace = builder.define("whitespace", whitespace);

    builder
        .build(expr, vec![ignore(vec![whitespace])], true, ParseOptions::default())
        .expect("calculator showcase grammar is internally consistent")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> f64 {
        build().parse(source).unwrap().transform().as_number().unwrap()
    }

    #[test]
    fn evaluates_signed_numbers() {
        assert_eq!(eval("42"), 42.0);
        assert_eq!(eval("+42"), 42.0);
        assert_eq!(eval("--42"), 42.0);
        assert_eq!(eval("-+-42"), 42.0);
    }

    #[test]
    fn respects_operator_precedence() {
        assert_eq!(eval("40 + 2"), 42.0);
        assert_eq!(eval("6 * 7"), 42.0);
        assert_eq!(eval("6 * 6 + 6"), 42.0);
        assert_eq!(eval("6 + 6 * 6"), 42.0);
    }

    #[test]
    fn parenthesized_groups_override_precedence() {
        assert_eq!(eval("(3 + 4) * 6"), 42.0);
        assert_eq!(eval("6 + -6 * -6"), 42.0);
    }
}
