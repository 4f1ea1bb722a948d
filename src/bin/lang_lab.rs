//! A small runnable example: parses a calculator expression, prints the
//! parse tree, the folded numeric result, and the grammar's own rule
//! listing. Not part of the library's public surface - a tutorial, in the
//! spirit of the teacher crate's `doc/` modules.

use rdparse::showcase::calculator;
use rdparse::GrammarFormatter;

fn main() {
    let source = std::env::args().nth(1).unwrap_or_else(|| "6 + -6 * -6".to_string());
    let grammar = calculator::build();

    println!("grammar:\n{}\n", GrammarFormatter::new().format(&grammar));

    match grammar.parse(&source) {
        Ok(tree) => {
            println!("source: {:?}", source);
            let _ = tree.print();
            println!("result: {:?}", tree.transform());
        }
        Err(err) => eprintln!("parse error: {}", err),
    }
}
