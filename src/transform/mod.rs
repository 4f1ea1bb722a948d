//! Stackable token-stream rewriters a grammar runs before handing tokens to
//! the engine (§4.2). Each transform is a pure function from a token
//! sequence to a token sequence; the grammar owns an ordered pipeline and
//! applies it in declaration order.

pub mod ignore;
pub mod indent;

use crate::error::ParseError;
use crate::token::Token;

pub type TokenTransform = Box<dyn Fn(Vec<Token>) -> Result<Vec<Token>, ParseError>>;

pub fn apply_pipeline(pipeline: &[TokenTransform], tokens: Vec<Token>) -> Result<Vec<Token>, ParseError> {
    pipeline.iter().try_fold(tokens, |tokens, transform| transform(tokens))
}
