//! Worked-example grammars exercising the public API end to end: a small
//! arithmetic calculator and a JSON parser, both transformed down to
//! [`crate::Value`]. Mirrors how the original Python corpus's test suite
//! doubles as grammar documentation (`rdp/tests/test_parser.py`'s
//! `CalculatorTest`/`JsonParserTest`).

pub mod calculator;
pub mod json;
