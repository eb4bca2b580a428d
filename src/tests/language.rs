use super::parse;
use crate::language::ast::NodeKind;
use crate::language::lexer::lex;
use crate::language::parser::parse_source;
use crate::language::token::TokenKind;

#[test]
fn lexer_produces_spanned_tokens() {
    let source = "x = 12;";
    let tokens = lex(source).expect("lexes");
    let kinds: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
    assert!(matches!(kinds[0], TokenKind::Identifier(name) if name == "x"));
    assert!(matches!(kinds[1], TokenKind::Eq));
    assert!(matches!(kinds[2], TokenKind::Integer(12)));
    assert!(matches!(kinds[3], TokenKind::Semi));
    assert!(matches!(kinds[4], TokenKind::Eof));

    assert_eq!(tokens[2].span.start, 4);
    assert_eq!(tokens[2].span.end, 6);
}

#[test]
fn lexer_skips_comments() {
    let source = "\
// line comment
a /* inline */ b
";
    let tokens = lex(source).expect("lexes");
    let idents: Vec<String> = tokens
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::Identifier(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(idents, ["a", "b"]);
}

#[test]
fn lexer_reports_unterminated_strings() {
    let errors = lex("\"abc").expect_err("must fail");
    assert!(errors[0].message.contains("Unterminated string"));
}

#[test]
fn lexer_reports_oversized_integers() {
    let errors = lex("99999999999999999999").expect_err("must fail");
    assert!(errors[0].message.contains("out of range"));
}

#[test]
fn keywords_are_not_identifiers() {
    let tokens = lex("while whale").expect("lexes");
    assert!(matches!(tokens[0].kind, TokenKind::While));
    assert!(matches!(&tokens[1].kind, TokenKind::Identifier(name) if name == "whale"));
}

#[test]
fn missing_semicolon_is_a_syntax_error() {
    let errors = parse_source("function main() { x = 1 }").expect_err("must fail");
    assert!(errors.errors[0].message.contains("Expected `;`"));
}

#[test]
fn break_outside_a_loop_is_rejected_at_parse_time() {
    let errors = parse_source("function main() { break; }").expect_err("must fail");
    assert!(errors.errors[0]
        .message
        .contains("`break` used outside of a loop"));
}

#[test]
fn continue_inside_nested_block_of_a_loop_is_accepted() {
    let source = "\
function main() {
    while (1 == 1) {
        {
            continue;
        }
    }
}
";
    parse(source);
}

#[test]
fn unresolved_names_parse_as_global_references() {
    let source = "function main() { return missing(); }";
    let program = parse(source);
    let function = &program.functions[0];

    let mut found = false;
    let mut stack = vec![function.body];
    while let Some(node) = stack.pop() {
        if let NodeKind::FunctionRef { name } = program.ast.kind(node) {
            assert_eq!(name, "missing");
            found = true;
        }
        stack.extend(program.ast.children(node));
    }
    assert!(found, "the unresolved callee becomes a function reference");
}

#[test]
fn local_reads_are_bound_to_slots() {
    let source = "function main() { x = 1; return x; }";
    let program = parse(source);
    let function = &program.functions[0];
    let slot = function.slots.get("x").expect("x has a slot");

    let mut reads = 0;
    let mut stack = vec![function.body];
    while let Some(node) = stack.pop() {
        if let NodeKind::ReadLocal { slot: read } = program.ast.kind(node) {
            assert_eq!(read.index(), slot.index());
            reads += 1;
        }
        stack.extend(program.ast.children(node));
    }
    assert_eq!(reads, 1);
}

#[test]
fn one_slot_per_identifier_across_blocks() {
    let source = "\
function main() {
    x = 1;
    {
        x = 2;
        {
            x = 3;
        }
    }
    y = 4;
}
";
    let program = parse(source);
    let function = &program.functions[0];
    assert_eq!(function.slots.len(), 2);

    let expected = function.slots.get("x").expect("x has a slot").index();
    let mut writes = 0;
    let mut stack = vec![function.body];
    while let Some(node) = stack.pop() {
        if let NodeKind::WriteLocal { slot, .. } = program.ast.kind(node) {
            if slot.name() == "x" {
                assert_eq!(slot.index(), expected);
                writes += 1;
            }
        }
        stack.extend(program.ast.children(node));
    }
    assert_eq!(writes, 3);
}

#[test]
fn block_locals_do_not_leak_into_following_statements() {
    // `inner` is out of scope after the block, so the read resolves as a
    // global function reference, not a slot read.
    let source = "\
function main() {
    {
        inner = 1;
    }
    return inner;
}
";
    let program = parse(source);
    let function = &program.functions[0];

    let mut kinds = Vec::new();
    let mut stack = vec![function.body];
    while let Some(node) = stack.pop() {
        match program.ast.kind(node) {
            NodeKind::FunctionRef { name } if name == "inner" => kinds.push("global"),
            NodeKind::ReadLocal { slot } if slot.name() == "inner" => kinds.push("local"),
            _ => {}
        }
        stack.extend(program.ast.children(node));
    }
    assert_eq!(kinds, ["global"]);
}

#[test]
fn parameters_resolve_as_locals_in_the_body() {
    let source = "function f(a) { return a; }";
    let program = parse(source);
    let function = &program.functions[0];
    assert_eq!(function.parameter_count, 1);

    let mut local_reads = 0;
    let mut stack = vec![function.body];
    while let Some(node) = stack.pop() {
        if let NodeKind::ReadLocal { slot } = program.ast.kind(node) {
            assert_eq!(slot.name(), "a");
            assert_eq!(slot.argument(), Some(0));
            local_reads += 1;
        }
        stack.extend(program.ast.children(node));
    }
    assert_eq!(local_reads, 1);
}

#[test]
fn a_broken_function_does_not_hide_errors_or_panic() {
    let errors = parse_source(
        "\
function broken( {
    return 1;
}

function fine() {
    return 2;
}
",
    )
    .expect_err("must fail");
    assert!(!errors.errors.is_empty());
}

#[test]
fn node_spans_cover_their_source() {
    let source = "function main() { value = 1 + 2; }";
    let program = parse(source);
    let offset = source.find("1 + 2").expect("snippet exists");
    let node = program.ast.node_at(offset).expect("node found");
    match program.ast.kind(node) {
        NodeKind::Long(1) => {}
        other => panic!("expected the literal at the offset, found {other:?}"),
    }
}
