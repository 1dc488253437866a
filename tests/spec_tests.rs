use pretty_assertions::assert_eq;
use serde::Deserialize;
use std::fs;
use treemark::{Node, ParseOptions, parser};

#[derive(Debug, Deserialize)]
struct AstTest {
    markdown: String,
    ast: Vec<Node>,
    example: u32,
    section: String,
}

fn load(path: &str) -> Vec<AstTest> {
    let test_data = fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"));
    serde_json::from_str(&test_data).unwrap_or_else(|e| panic!("failed to parse {path}: {e}"))
}

fn run_fixture(path: &str) {
    let tests = load(path);
    let mut failures = Vec::new();

    for test in &tests {
        let result = parser(&test.markdown, &ParseOptions::default());
        if result != test.ast {
            // Print first few failures for debugging
            if failures.len() < 5 {
                eprintln!("\nExample {} failed ({})", test.example, test.section);
                eprintln!("  Input: {:?}", test.markdown);
                eprintln!("  Expected: {}", serde_json::to_string(&test.ast).unwrap_or_default());
                eprintln!("  Got: {}", serde_json::to_string(&result).unwrap_or_default());
            }
            failures.push(test.example);
        }
    }

    eprintln!("{path}: {} passed, {} failed", tests.len() - failures.len(), failures.len());
    assert_eq!(failures, Vec::<u32>::new());
}

#[test]
fn block_fixtures() {
    run_fixture("tests/data/blocks.json");
}

#[test]
fn inline_fixtures() {
    run_fixture("tests/data/inlines.json");
}

#[test]
fn extension_fixtures() {
    run_fixture("tests/data/extensions.json");
}
