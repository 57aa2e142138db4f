//! Lightweight lexical scanning of generated C++ fragments
//!
//! Nothing here parses C++. The composer only needs three best-effort facts
//! about fragment text:
//! - `declared_names`: which variable names a declaration statement introduces
//! - `scan_references`: which identifiers a statement list reads or writes that
//!   it did not introduce itself
//! - `bound_columns`: which `Branch("column", ...)` bindings a setup block makes
//!
//! The scanner strips comments and literals first, then works on a flat token
//! stream. When in doubt it prefers treating a name as resolved, so a fragment
//! list that compiles is never rejected because of the heuristics.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Matches `recv->Branch("col"` and `tree("name")->Branch("col"` bindings
static BRANCH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<recv>[A-Za-z_][A-Za-z0-9_]*(?:\s*\(\s*"[^"]*"\s*\))?)\s*(?:->|\.)\s*Branch\s*\(\s*"(?P<col>[^"]*)""#,
    )
    .expect("Valid regex pattern")
});

/// Identifiers that are never variable references.
const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "asm", "auto", "bool", "break", "case", "catch", "char",
    "char16_t", "char32_t", "class", "const", "const_cast", "constexpr", "continue", "decltype",
    "default", "delete", "do", "double", "dynamic_cast", "else", "enum", "explicit", "export",
    "extern", "false", "float", "for", "friend", "goto", "if", "inline", "int", "long",
    "mutable", "namespace", "new", "noexcept", "not", "nullptr", "operator", "or", "private",
    "protected", "public", "register", "reinterpret_cast", "return", "short", "signed",
    "sizeof", "static", "static_assert", "static_cast", "struct", "switch", "template", "this",
    "throw", "true", "try", "typedef", "typeid", "typename", "union", "unsigned", "using",
    "virtual", "void", "volatile", "wchar_t", "while",
];

/// Keywords that may stand in the type position of a declaration.
const TYPE_KEYWORDS: &[&str] = &[
    "auto", "bool", "char", "char16_t", "char32_t", "const", "constexpr", "double", "float",
    "int", "long", "mutable", "register", "short", "signed", "static", "unsigned", "void",
    "volatile", "wchar_t",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Ident(&'a str),
    Number,
    Punct(&'a str),
}

impl Token<'_> {
    fn is_punct(&self, p: &str) -> bool {
        matches!(self, Token::Punct(q) if *q == p)
    }

    /// Could this token end the type part of a declaration?
    fn is_type_like(&self) -> bool {
        match self {
            Token::Ident(name) => !is_keyword(name) || TYPE_KEYWORDS.contains(name),
            Token::Punct(p) => *p == ">",
            Token::Number => false,
        }
    }
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// ALL_CAPS names are treated as macros or enumerators, not generated state.
fn looks_like_macro(name: &str) -> bool {
    name.len() > 1
        && name.starts_with(|c: char| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Replace comments (and, unless `keep_strings`, string and char literals)
/// with spaces. Line structure is preserved.
pub(crate) fn strip_noise(text: &str, keep_strings: bool) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                '"' | '\'' => {
                    state = State::Str(c);
                    out.push(if keep_strings { c } else { ' ' });
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    let escaped = chars.next();
                    if keep_strings {
                        out.push(c);
                        if let Some(e) = escaped {
                            out.push(e);
                        }
                    } else {
                        out.push_str("  ");
                    }
                } else if c == quote {
                    state = State::Code;
                    out.push(if keep_strings { c } else { ' ' });
                } else if keep_strings {
                    out.push(c);
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
        }
    }

    out
}

/// Split already-stripped code into identifiers, numbers, and punctuation.
pub(crate) fn tokenize(code: &str) -> Vec<Token<'_>> {
    let bytes = code.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token::Ident(&code[start..i]));
        } else if b.is_ascii_digit() {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'\'')
            {
                i += 1;
            }
            tokens.push(Token::Number);
        } else {
            let two = code.get(i..i + 2);
            match two {
                Some("::") | Some("->") | Some("&&") => {
                    tokens.push(Token::Punct(&code[i..i + 2]));
                    i += 2;
                }
                _ => {
                    let width = code[i..].chars().next().map_or(1, char::len_utf8);
                    tokens.push(Token::Punct(&code[i..i + width]));
                    i += width;
                }
            }
        }
    }

    tokens
}

/// Split a token list at commas that are not nested inside brackets.
fn split_top_level<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<&'t [Token<'a>]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Punct("<") | Token::Punct("(") | Token::Punct("[") | Token::Punct("{") => {
                depth += 1
            }
            Token::Punct(">") | Token::Punct(")") | Token::Punct("]") | Token::Punct("}") => {
                depth -= 1
            }
            Token::Punct(",") if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Drop the initializer or array suffix of one declarator.
fn declarator_head<'t, 'a>(tokens: &'t [Token<'a>]) -> &'t [Token<'a>] {
    let mut depth = 0i32;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Punct("<") => depth += 1,
            Token::Punct(">") => depth -= 1,
            Token::Punct("=") | Token::Punct("(") | Token::Punct("[") | Token::Punct("{")
                if depth <= 0 =>
            {
                return &tokens[..i];
            }
            _ => {}
        }
    }
    tokens
}

fn last_ident<'a>(tokens: &[Token<'a>]) -> Option<(usize, &'a str)> {
    tokens.iter().enumerate().rev().find_map(|(i, t)| match t {
        Token::Ident(name) if !is_keyword(name) => Some((i, *name)),
        _ => None,
    })
}

/// Names declared by one declaration statement.
///
/// `double x;` declares `x`, `int nRun, nEvt;` declares both, `TTree *t = 0;`
/// declares `t`. Blank lines, comments, and preprocessor lines declare nothing.
pub fn declared_names(statement: &str) -> Vec<String> {
    let trimmed = statement.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Vec::new();
    }

    let code = strip_noise(trimmed, false);
    let code = code.trim().trim_end_matches(';');
    let tokens = tokenize(code);
    let mut names = Vec::new();

    for (n, declarator) in split_top_level(&tokens).into_iter().enumerate() {
        let head = declarator_head(declarator);
        let Some((pos, name)) = last_ident(head) else {
            continue;
        };
        // The first declarator carries the type, so it needs something in
        // front of the name.
        if n == 0 && pos == 0 {
            continue;
        }
        names.push(name.to_string());
    }

    names
}

/// References and locally introduced names found in one slot's fragments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlotScan {
    /// Candidate variable references, in order of first appearance.
    pub references: Vec<String>,
    /// Names the fragments introduce themselves.
    pub locals: HashSet<String>,
}

impl SlotScan {
    /// References that are neither local nor accepted by `is_known`.
    pub fn unresolved<'s>(
        &'s self,
        is_known: impl Fn(&str) -> bool + 's,
    ) -> impl Iterator<Item = &'s str> + 's {
        self.references
            .iter()
            .map(String::as_str)
            .filter(move |name| !self.locals.contains(*name) && !is_known(*name))
    }
}

/// Is this the point a new statement (or a `for`/`if` header) begins?
fn starts_statement(before: &[Token<'_>]) -> bool {
    match before {
        [] => true,
        [.., last] if last.is_punct(";") || last.is_punct("{") || last.is_punct("}") => true,
        [.., keyword, open] if open.is_punct("(") => matches!(
            keyword,
            Token::Ident("for") | Token::Ident("if") | Token::Ident("while") | Token::Ident("switch")
        ),
        _ => false,
    }
}

/// Do the tokens in front of a `*` or `&` end in a type that opens a
/// statement, as in `TTree *t` or `for (const auto &m : muons)`?
fn declares_pointer_or_ref(before: &[Token<'_>]) -> bool {
    let mut depth = 0i32;
    let mut start = before.len();
    while start > 0 {
        let tok = &before[start - 1];
        let part_of_type = match tok {
            Token::Punct(">") => {
                depth += 1;
                true
            }
            Token::Punct("<") if depth > 0 => {
                depth -= 1;
                true
            }
            _ if depth > 0 => true,
            Token::Punct("::") => true,
            Token::Ident(_) => tok.is_type_like(),
            _ => false,
        };
        if !part_of_type {
            break;
        }
        start -= 1;
    }

    depth == 0 && start < before.len() && starts_statement(&before[..start])
}

/// Scan a list of statements for variable references.
pub fn scan_references(lines: &[String]) -> SlotScan {
    let mut scan = SlotScan::default();
    let mut seen = HashSet::new();

    for line in lines {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let code = strip_noise(line, false);
        let tokens = tokenize(&code);

        for (i, tok) in tokens.iter().enumerate() {
            let Token::Ident(name) = *tok else {
                continue;
            };
            if is_keyword(name) || looks_like_macro(name) {
                continue;
            }

            let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
            let next = tokens.get(i + 1);

            let is_member_or_qualified = prev.is_some_and(|t| {
                t.is_punct(".")
                    || t.is_punct("->")
                    || t.is_punct("::")
                    || matches!(t, Token::Ident("namespace") | Token::Ident("goto"))
            });
            let is_callee_or_scope = next.is_some_and(|t| t.is_punct("::") || t.is_punct("("));
            let is_template_arg = match (prev, next) {
                (Some(p), Some(n)) => {
                    (p.is_punct("<") && (n.is_punct(">") || n.is_punct(",")))
                        || (p.is_punct(",") && n.is_punct(">"))
                }
                _ => false,
            };
            if is_member_or_qualified || is_callee_or_scope || is_template_arg {
                continue;
            }

            // `T *name` only declares at the start of a statement; elsewhere
            // it is a product or a bitwise and.
            let introduces = match prev {
                Some(p) if p.is_type_like() => true,
                Some(p) if p.is_punct("*") || p.is_punct("&") || p.is_punct("&&") => {
                    i >= 2 && declares_pointer_or_ref(&tokens[..i - 1])
                }
                _ => false,
            };

            if introduces {
                scan.locals.insert(name.to_string());
            } else if seen.insert(name.to_string()) {
                scan.references.push(name.to_string());
            }
        }
    }

    scan
}

/// Variables declared by plain declaration lines of a block of code.
///
/// Only lines of the form `type name;` or `type name = value;` count. Lines
/// holding calls, member access or `using`/`return` statements are skipped,
/// so function signatures and statements never yield a name.
pub fn declared_in_block(text: &str) -> HashSet<String> {
    strip_noise(text, false)
        .lines()
        .map(str::trim)
        .filter(|line| line.ends_with(';'))
        .filter(|line| !line.contains(['(', '.']) && !line.contains("->"))
        .filter(|line| !line.starts_with("using ") && !line.starts_with("return"))
        .flat_map(declared_names)
        .collect()
}

/// Identifiers anywhere in a block of code, ignoring comments and literals.
pub fn identifiers(text: &str) -> HashSet<String> {
    let code = strip_noise(text, false);
    tokenize(&code)
        .into_iter()
        .filter_map(|t| match t {
            Token::Ident(name) => Some(name.to_string()),
            _ => None,
        })
        .collect()
}

/// A column binding made in a setup block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    /// The table expression the column is bound on (`myTree`, `tree("t")`).
    pub table: String,
    pub column: String,
}

/// Column bindings in statement order.
pub fn bound_columns(lines: &[String]) -> Vec<ColumnBinding> {
    lines
        .iter()
        .flat_map(|line| {
            let code = strip_noise(line, true);
            BRANCH_REGEX
                .captures_iter(&code)
                .map(|cap| ColumnBinding {
                    table: cap["recv"].split_whitespace().collect::<String>(),
                    column: cap["col"].to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
