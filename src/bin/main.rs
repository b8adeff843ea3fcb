use std::{env, error::Error, fs};

use siftc::{lexer, token::Map};

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        return Err("usage: siftc <file.sift>".into());
    };

    let input = fs::read(&path)?;
    let mut map = Map::new();
    let tokens = lexer::tokenize(&input, &mut map)?;

    for token in &tokens {
        println!("{:>5}  {:?}  {}", token.line, token.id, map.by_id(token.id));
    }
    println!("{} tokens", tokens.len());
    Ok(())
}
