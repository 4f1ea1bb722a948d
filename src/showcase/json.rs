//! A JSON grammar, transformed down to [`crate::Value`].
//!
//! Grounded in `rdp/tests/test_parser.py`'s `TransformJsonParserTest`: the
//! same rule shape (`number_literal`, `string_literal`, `array`, `object_`,
//! `boolean`, `null`), with every separator explicitly `drop`ped here rather
//! than relying on a grammar-wide `drop_terminals` default to keep punctuation
//! out of the value tree.

use crate::engine::ParseOptions;
use crate::grammar::{Grammar, GrammarBuilder};
use crate::symbol::{drop_sym, flatten, Symbol};
use crate::transform::ignore::ignore;
use crate::value::Value;

pub fn build() -> Grammar {
    let builder = GrammarBuilder::new();
    let expr = builder.rule("expr");

    let number_literal = Symbol::regexp(r"-?(?:[1-9]\d*|0)(?:\.\d*)?(?:[eE][+-]?\d+)?")
        .unwrap()
        .set_transform(|v| match v {
            Value::String(s) => Value::Number(s.parse().unwrap_or(0.0)),
            other => other,
        });
    let number_literal = builder.define("number_literal", number_literal);

    let string_literal = Symbol::regexp(r#""(?:[^"\\]|\\(?:["\\/nbfrt]|u[0-9a-fA-F]{4}))*""#)
        .unwrap()
        .set_transform(|v| match v {
            Value::String(s) => Value::String(s[1..s.len() - 1].to_string()),
            other => other,
        });
    let string_literal = builder.define("string_literal", string_literal);

    let array = Symbol::sequence(vec![
        drop_sym(&Symbol::terminal("[")),
        flatten(&Symbol::repeat(expr.clone(), Some(drop_sym(&Symbol::terminal(","))), 0, false)),
        drop_sym(&Symbol::terminal("]")),
    ]);
    let array = builder.define("array", array);

    let pair = flatten(&Symbol::sequence(vec![
        string_literal.clone(),
        drop_sym(&Symbol::terminal(":")),
        expr.clone(),
    ]));
    let object = Symbol::sequence(vec![
        drop_sym(&Symbol::terminal("{")),
        flatten(&Symbol::repeat(pair, Some(drop_sym(&Symbol::terminal(","))), 0, false)),
        drop_sym(&Symbol::terminal("}")),
    ])
    .set_transform(|v| match v {
        Value::List(items) => {
            let mut pairs = Vec::new();
            let mut iter = items.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                if let Value::String(k) = key {
                    pairs.push((k, value));
                }
            }
            Value::Map(pairs)
        }
        other => other,
    });
    let object = builder.define("object_", object);

    let boolean = Symbol::one_of(vec![Symbol::terminal("true"), Symbol::terminal("false")]).set_transform(|v| {
        match v {
            Value::String(s) => Value::Bool(s == "true"),
            other => other,
        }
    });
    let boolean = builder.define("boolean", boolean);

    let null = Symbol::terminal("null").set_transform(|_| Value::Null);
    let null = builder.define("null", null);

    let expr_body = flatten(&Symbol::one_of(vec![
        number_literal,
        string_literal,
        array,
        object,
        boolean,
        null,
    ]));
    let expr = builder.define("expr", expr_body);

    let whitespace = Symbol::regexp(r"\s+").unwrap();
    let whitespace = builder.define("whitespace", whitespace);

    builder
        .build(expr, vec![ignore(vec![whitespace])], false, ParseOptions::default())
        .expect("json showcase grammar is internally consistent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_object() {
        let grammar = build();
        let value = grammar.parse(r#"{"foo": "bar"}"#).unwrap().transform();
        assert_eq!(
            value,
            Value::Map(vec![("foo".to_string(), Value::String("bar".to_string()))])
        );
    }

    #[test]
    fn parses_an_array_of_numbers() {
        let grammar = build();
        let value = grammar.parse("[0, 1, 42, 3.14, -1]").unwrap().transform();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Number(0.0),
                Value::Number(1.0),
                Value::Number(42.0),
                Value::Number(3.14),
                Value::Number(-1.0),
            ])
        );
    }

    #[test]
    fn booleans_and_null_transform_correctly() {
        let grammar = build();
        assert_eq!(grammar.parse("true").unwrap().transform(), Value::Bool(true));
        assert_eq!(grammar.parse("null").unwrap().transform(), Value::Null);
    }

    #[test]
    fn nested_structures_round_trip() {
        let grammar = build();
        let value = grammar.parse(r#"{"items": [1, 2], "ok": true}"#).unwrap().transform();
        assert_eq!(
            value,
            Value::Map(vec![
                ("items".to_string(), Value::List(vec![Value::Number(1.0), Value::Number(2.0)])),
                ("ok".to_string(), Value::Bool(true)),
            ])
        );
    }
}
