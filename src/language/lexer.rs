use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, digit1},
    combinator::recognize,
    multi::many0,
    sequence::pair,
    IResult,
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut rest = source;

    loop {
        rest = match skip_trivia(rest, source) {
            Ok(rest) => rest,
            Err(err) => {
                errors.push(err);
                ""
            }
        };
        if rest.is_empty() {
            break;
        }

        let start = source.len() - rest.len();
        if rest.starts_with('"') {
            match lex_string(rest, start) {
                Ok((next, token)) => {
                    tokens.push(token);
                    rest = next;
                }
                Err(err) => {
                    errors.push(err);
                    rest = skip_to_line_end(rest);
                }
            }
            continue;
        }
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            match lex_integer(rest, start) {
                Ok((next, token)) => {
                    tokens.push(token);
                    rest = next;
                }
                Err(err) => {
                    errors.push(err);
                    rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
                }
            }
            continue;
        }

        match token_kind(rest) {
            Ok((next, kind)) => {
                let span = Span::new(start, source.len() - next.len());
                tokens.push(Token { kind, span });
                rest = next;
            }
            Err(_) => {
                let ch = rest.chars().next().unwrap_or('\0');
                errors.push(LexError {
                    message: format!("Unexpected character `{}`", ch),
                    span: Span::new(start, start + ch.len_utf8()),
                });
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    let end = source.len();
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(end, end),
    });

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

fn skip_trivia<'a>(mut rest: &'a str, source: &str) -> Result<&'a str, LexError> {
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("//") {
            rest = match after.find('\n') {
                Some(pos) => &after[pos + 1..],
                None => "",
            };
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            match after.find("*/") {
                Some(pos) => rest = &after[pos + 2..],
                None => {
                    let start = source.len() - trimmed.len();
                    return Err(LexError {
                        message: "Unterminated block comment".to_string(),
                        span: Span::new(start, source.len()),
                    });
                }
            }
        } else {
            return Ok(trimmed);
        }
    }
}

fn skip_to_line_end(rest: &str) -> &str {
    match rest.find('\n') {
        Some(pos) => &rest[pos..],
        None => "",
    }
}

fn lex_string(rest: &str, start: usize) -> Result<(&str, Token), LexError> {
    // Strings are plain runs of characters; there is no escape syntax.
    let body = &rest[1..];
    let terminator = body
        .find(|c| c == '"' || c == '\n')
        .filter(|pos| body.as_bytes()[*pos] == b'"');
    match terminator {
        Some(pos) => {
            let span = Span::new(start, start + pos + 2);
            let token = Token {
                kind: TokenKind::String(body[..pos].to_string()),
                span,
            };
            Ok((&body[pos + 1..], token))
        }
        None => Err(LexError {
            message: "Unterminated string literal".to_string(),
            span: Span::new(start, start + 1),
        }),
    }
}

fn lex_integer(rest: &str, start: usize) -> Result<(&str, Token), LexError> {
    let digits: IResult<&str, &str> = recognize(digit1)(rest);
    let (next, raw) = digits.map_err(|_| LexError {
        message: "Malformed integer literal".to_string(),
        span: Span::new(start, start + 1),
    })?;
    let span = Span::new(start, start + raw.len());
    match raw.parse::<i64>() {
        Ok(value) => Ok((
            next,
            Token {
                kind: TokenKind::Integer(value),
                span,
            },
        )),
        Err(_) => Err(LexError {
            message: format!("Integer literal `{}` is out of range", raw),
            span,
        }),
    }
}

fn token_kind(input: &str) -> IResult<&str, TokenKind> {
    alt((lex_operator, lex_word))(input)
}

fn lex_operator(input: &str) -> IResult<&str, TokenKind> {
    // Multi-character operators must be tried before their prefixes.
    alt((
        alt((
            tag("&&"),
            tag("||"),
            tag("=="),
            tag("!="),
            tag("<="),
            tag(">="),
        )),
        alt((
            tag("="),
            tag("<"),
            tag(">"),
            tag("+"),
            tag("-"),
            tag("*"),
            tag("/"),
            tag("."),
            tag(","),
            tag(";"),
            tag("("),
            tag(")"),
            tag("{"),
            tag("}"),
            tag("["),
            tag("]"),
        )),
    ))(input)
    .map(|(next, op)| {
        let kind = match op {
            "&&" => TokenKind::AmpersandAmpersand,
            "||" => TokenKind::PipePipe,
            "==" => TokenKind::EqEq,
            "!=" => TokenKind::BangEq,
            "<=" => TokenKind::LtEq,
            ">=" => TokenKind::GtEq,
            "=" => TokenKind::Eq,
            "<" => TokenKind::Lt,
            ">" => TokenKind::Gt,
            "+" => TokenKind::Plus,
            "-" => TokenKind::Minus,
            "*" => TokenKind::Star,
            "/" => TokenKind::Slash,
            "." => TokenKind::Dot,
            "," => TokenKind::Comma,
            ";" => TokenKind::Semi,
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            "{" => TokenKind::LBrace,
            "}" => TokenKind::RBrace,
            "[" => TokenKind::LBracket,
            "]" => TokenKind::RBracket,
            _ => unreachable!("operator table covers every tag"),
        };
        (next, kind)
    })
}

fn lex_word(input: &str) -> IResult<&str, TokenKind> {
    let (next, word) = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((
            take_while1(|c: char| c.is_ascii_alphanumeric()),
            tag("_"),
        ))),
    ))(input)?;
    let kind = match word {
        "function" => TokenKind::Function,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "return" => TokenKind::Return,
        "debugger" => TokenKind::Debugger,
        _ => TokenKind::Identifier(word.to_string()),
    };
    Ok((next, kind))
}
