use std::error::Error;
use std::fs;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;
use treemark::{ParseOptions, parser};

/// Read markdown from stdin and print its AST as JSON.
/// An optional first argument names a JSON file of parse options.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let options = match std::env::args().nth(1) {
        Some(path) => ParseOptions::from_json(&fs::read_to_string(path)?)?,
        None => ParseOptions::default(),
    };

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let ast = parser(&input, &options);
    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(())
}
