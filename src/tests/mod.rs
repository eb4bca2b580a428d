mod interpreter;
mod language;

use crate::language::parser::{parse_source, ParsedProgram};

fn parse(source: &str) -> ParsedProgram {
    match parse_source(source) {
        Ok(program) => program,
        Err(errors) => panic!("unexpected parse failure: {:?}", errors.errors),
    }
}

fn offset_of(source: &str, needle: &str) -> usize {
    source
        .find(needle)
        .unwrap_or_else(|| panic!("snippet `{needle}` not found in source"))
}
