//! GLSL ES 3.00 preprocessor used by the headless device.
//!
//! Supports object-like macros, the conditional directives with integer
//! expressions and `defined`, `#undef` and `#error`. `#pragma`,
//! `#extension` and `#line` are accepted and ignored. Lines removed by
//! conditionals or consumed by directives are replaced by empty lines so
//! that diagnostics keep their original line numbers.

use std::collections::{HashMap, HashSet};
use std::fmt;

const MAX_EXPANSION_DEPTH: usize = 64;

/// A compile diagnostic in the `ERROR: 0:<line>: <message>` shape drivers use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR: 0:{}: {}", self.line, self.message)
    }
}

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Text after `#version` (for example `300 es`).
    pub version: String,
    /// Source with directives resolved, one output line per input line.
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
struct Conditional {
    /// Whether the enclosing block emits code.
    parent_active: bool,
    /// Whether a branch of this block was already taken.
    taken: bool,
    active: bool,
    seen_else: bool,
    line: usize,
}

/// Run the preprocessor over a full shader source.
pub fn preprocess(source: &str) -> Result<Preprocessed, Diagnostic> {
    let stripped = strip_comments(source)?;

    let mut macros: HashMap<String, String> = HashMap::new();
    macros.insert("GL_ES".to_string(), "1".to_string());
    macros.insert("__VERSION__".to_string(), "300".to_string());

    let mut version: Option<String> = None;
    let mut seen_code = false;
    let mut stack: Vec<Conditional> = Vec::new();
    let mut output = String::with_capacity(stripped.len());

    for (index, raw_line) in stripped.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw_line.trim();
        let active = stack.last().map_or(true, |c| c.active);

        if let Some(directive) = trimmed.strip_prefix('#') {
            let directive = directive.trim_start();
            let (name, rest) = split_directive(directive);
            match name {
                "if" | "ifdef" | "ifndef" => {
                    let condition = if !active {
                        false
                    } else {
                        match name {
                            "if" => evaluate_condition(rest, &macros, line_no)? != 0,
                            "ifdef" => macros.contains_key(expect_identifier(rest, line_no)?),
                            _ => !macros.contains_key(expect_identifier(rest, line_no)?),
                        }
                    };
                    stack.push(Conditional {
                        parent_active: active,
                        taken: condition,
                        active: active && condition,
                        seen_else: false,
                        line: line_no,
                    });
                }
                "elif" => {
                    let top = stack
                        .last_mut()
                        .ok_or_else(|| Diagnostic::new(line_no, "#elif without #if"))?;
                    if top.seen_else {
                        return Err(Diagnostic::new(line_no, "#elif after #else"));
                    }
                    if top.parent_active && !top.taken {
                        let condition = evaluate_condition(rest, &macros, line_no)? != 0;
                        top.taken = condition;
                        top.active = condition;
                    } else {
                        top.active = false;
                    }
                }
                "else" => {
                    let top = stack
                        .last_mut()
                        .ok_or_else(|| Diagnostic::new(line_no, "#else without #if"))?;
                    if top.seen_else {
                        return Err(Diagnostic::new(line_no, "#else after #else"));
                    }
                    top.seen_else = true;
                    top.active = top.parent_active && !top.taken;
                    top.taken = true;
                }
                "endif" => {
                    stack
                        .pop()
                        .ok_or_else(|| Diagnostic::new(line_no, "#endif without #if"))?;
                }
                _ if !active => {}
                "version" => {
                    if version.is_some() || seen_code {
                        return Err(Diagnostic::new(
                            line_no,
                            "#version directive must occur before anything else",
                        ));
                    }
                    let value = rest.split_whitespace().collect::<Vec<_>>().join(" ");
                    if value != "300 es" {
                        return Err(Diagnostic::new(
                            line_no,
                            format!("version '{value}' is not supported"),
                        ));
                    }
                    version = Some(value);
                }
                "define" => define_macro(rest, &mut macros, line_no)?,
                "undef" => {
                    let name = expect_identifier(rest, line_no)?;
                    if name.starts_with("GL_") || name.starts_with("__") {
                        return Err(Diagnostic::new(
                            line_no,
                            format!("'{name}' : can't undefine predefined macro"),
                        ));
                    }
                    macros.remove(name);
                }
                "error" => {
                    return Err(Diagnostic::new(line_no, format!("'#error' : {}", rest.trim())));
                }
                "pragma" | "extension" | "line" | "" => {}
                other => {
                    return Err(Diagnostic::new(
                        line_no,
                        format!("'#{other}' : invalid directive name"),
                    ));
                }
            }
            if version.is_none() && name != "version" && active {
                seen_code = true;
            }
            output.push('\n');
            continue;
        }

        if active && !trimmed.is_empty() {
            if version.is_none() {
                seen_code = true;
            }
            output.push_str(&expand_line(raw_line, &macros, line_no)?);
        }
        output.push('\n');
    }

    if let Some(open) = stack.last() {
        return Err(Diagnostic::new(
            open.line,
            "unexpected end of file inside conditional block",
        ));
    }

    let version = version.ok_or_else(|| Diagnostic::new(1, "missing '#version 300 es' directive"))?;

    Ok(Preprocessed {
        version,
        text: output,
    })
}

/// Replace comments by spaces, keeping newlines.
fn strip_comments(source: &str) -> Result<String, Diagnostic> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line = 1;
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        line += 1;
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let start = line;
                let mut closed = false;
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        line += 1;
                    }
                    if previous == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    previous = next;
                }
                if !closed {
                    return Err(Diagnostic::new(start, "unterminated comment"));
                }
                out.push(' ');
            }
            _ => {
                if c == '\n' {
                    line += 1;
                }
                out.push(c);
            }
        }
    }
    Ok(out)
}

fn split_directive(directive: &str) -> (&str, &str) {
    let end = directive
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(directive.len());
    (&directive[..end], &directive[end..])
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn expect_identifier(rest: &str, line: usize) -> Result<&str, Diagnostic> {
    let name = rest.trim();
    let valid = name.chars().next().is_some_and(is_identifier_start)
        && name.chars().all(is_identifier_char);
    if valid {
        Ok(name)
    } else {
        Err(Diagnostic::new(line, format!("'{name}' : expected a macro name")))
    }
}

fn define_macro(
    rest: &str,
    macros: &mut HashMap<String, String>,
    line: usize,
) -> Result<(), Diagnostic> {
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !is_identifier_char(c))
        .unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() || !name.chars().next().is_some_and(is_identifier_start) {
        return Err(Diagnostic::new(line, "#define : expected a macro name"));
    }
    if name.starts_with("GL_") || name.starts_with("__") {
        return Err(Diagnostic::new(
            line,
            format!("'{name}' : macro names beginning with 'GL_' or '__' are reserved"),
        ));
    }
    let body = &rest[end..];
    if body.starts_with('(') {
        return Err(Diagnostic::new(
            line,
            format!("'{name}' : function-like macros are not supported"),
        ));
    }
    let body = body.trim().to_string();
    if let Some(existing) = macros.get(name) {
        if *existing != body {
            return Err(Diagnostic::new(line, format!("'{name}' : macro redefined")));
        }
    }
    macros.insert(name.to_string(), body);
    Ok(())
}

/// Expand macros in a line of code.
fn expand_line(
    line: &str,
    macros: &HashMap<String, String>,
    line_no: usize,
) -> Result<String, Diagnostic> {
    let mut hidden = HashSet::new();
    expand_text(line, macros, &mut hidden, 0, line_no)
}

fn expand_text(
    text: &str,
    macros: &HashMap<String, String>,
    hidden: &mut HashSet<String>,
    depth: usize,
    line_no: usize,
) -> Result<String, Diagnostic> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(Diagnostic::new(line_no, "macro expansion too deep"));
    }
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if is_identifier_start(c) {
            let start = i;
            while i < chars.len() && is_identifier_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match macros.get(&word) {
                Some(body) if !hidden.contains(&word) => {
                    hidden.insert(word.clone());
                    let expanded = expand_text(body, macros, hidden, depth + 1, line_no)?;
                    hidden.remove(&word);
                    out.push_str(&expanded);
                }
                _ => out.push_str(&word),
            }
        } else if c.is_ascii_digit() {
            // Numeric literals, including suffixes such as `1.0e5` or `2u`.
            while i < chars.len() && (is_identifier_char(chars[i]) || chars[i] == '.') {
                out.push(chars[i]);
                i += 1;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Number(i64),
    Ident(String),
    Op(&'static str),
}

const OPERATORS: [&str; 23] = [
    "&&", "||", "==", "!=", "<=", ">=", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "!", "~",
    "&", "|", "^", "(", ")", ",",
];

fn tokenize_expression(text: &str, line: usize) -> Result<Vec<ExprToken>, Diagnostic> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    'outer: while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if is_identifier_start(c) {
            let start = i;
            while i < bytes.len() && is_identifier_char(bytes[i] as char) {
                i += 1;
            }
            tokens.push(ExprToken::Ident(text[start..i].to_string()));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && is_identifier_char(bytes[i] as char) {
                i += 1;
            }
            tokens.push(ExprToken::Number(parse_integer(&text[start..i], line)?));
            continue;
        }
        for op in OPERATORS {
            if text[i..].starts_with(op) {
                tokens.push(ExprToken::Op(op));
                i += op.len();
                continue 'outer;
            }
        }
        return Err(Diagnostic::new(
            line,
            format!("'{c}' : unexpected token in preprocessor expression"),
        ));
    }
    Ok(tokens)
}

fn parse_integer(literal: &str, line: usize) -> Result<i64, Diagnostic> {
    let digits = literal.trim_end_matches(['u', 'U']);
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<i64>()
    };
    parsed.map_err(|_| Diagnostic::new(line, format!("'{literal}' : invalid integer constant")))
}

/// Evaluate the expression of an `#if` or `#elif`.
fn evaluate_condition(
    text: &str,
    macros: &HashMap<String, String>,
    line: usize,
) -> Result<i64, Diagnostic> {
    let raw = tokenize_expression(text, line)?;

    // `defined` is resolved before macro expansion.
    let mut resolved = Vec::with_capacity(raw.len());
    let mut iter = raw.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token != ExprToken::Ident("defined".to_string()) {
            resolved.push(token);
            continue;
        }
        let parenthesized = iter.peek() == Some(&ExprToken::Op("("));
        if parenthesized {
            iter.next();
        }
        let name = match iter.next() {
            Some(ExprToken::Ident(name)) => name,
            _ => return Err(Diagnostic::new(line, "'defined' : expected a macro name")),
        };
        if parenthesized && iter.next() != Some(ExprToken::Op(")")) {
            return Err(Diagnostic::new(line, "'defined' : missing ')'"));
        }
        resolved.push(ExprToken::Number(macros.contains_key(&name) as i64));
    }

    let mut hidden = HashSet::new();
    let expanded = expand_expression(resolved, macros, &mut hidden, 0, line)?;
    if expanded.is_empty() {
        return Err(Diagnostic::new(line, "#if : missing expression"));
    }

    let mut parser = ExprParser {
        tokens: &expanded,
        pos: 0,
        line,
    };
    let value = parser.parse(0)?;
    if parser.pos != expanded.len() {
        return Err(Diagnostic::new(line, "#if : unexpected tokens after expression"));
    }
    Ok(value)
}

fn expand_expression(
    tokens: Vec<ExprToken>,
    macros: &HashMap<String, String>,
    hidden: &mut HashSet<String>,
    depth: usize,
    line: usize,
) -> Result<Vec<ExprToken>, Diagnostic> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(Diagnostic::new(line, "macro expansion too deep"));
    }
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            ExprToken::Ident(name) => match macros.get(&name) {
                Some(body) if !hidden.contains(&name) => {
                    let body_tokens = tokenize_expression(body, line)?;
                    hidden.insert(name.clone());
                    let expanded = expand_expression(body_tokens, macros, hidden, depth + 1, line)?;
                    hidden.remove(&name);
                    out.extend(expanded);
                }
                _ => {
                    return Err(Diagnostic::new(
                        line,
                        format!("'{name}' : undefined identifier in preprocessor expression"),
                    ))
                }
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

struct ExprParser<'a> {
    tokens: &'a [ExprToken],
    pos: usize,
    line: usize,
}

impl ExprParser<'_> {
    fn binary_precedence(op: &str) -> Option<u8> {
        Some(match op {
            "||" => 1,
            "&&" => 2,
            "|" => 3,
            "^" => 4,
            "&" => 5,
            "==" | "!=" => 6,
            "<" | ">" | "<=" | ">=" => 7,
            "<<" | ">>" => 8,
            "+" | "-" => 9,
            "*" | "/" | "%" => 10,
            _ => return None,
        })
    }

    fn parse(&mut self, min_precedence: u8) -> Result<i64, Diagnostic> {
        let tokens = self.tokens;
        let mut lhs = self.parse_unary()?;
        while let Some(ExprToken::Op(op)) = tokens.get(self.pos) {
            let Some(precedence) = Self::binary_precedence(op) else {
                break;
            };
            if precedence <= min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.parse(precedence)?;
            lhs = self.apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn apply(&self, op: &str, lhs: i64, rhs: i64) -> Result<i64, Diagnostic> {
        Ok(match op {
            "||" => (lhs != 0 || rhs != 0) as i64,
            "&&" => (lhs != 0 && rhs != 0) as i64,
            "|" => lhs | rhs,
            "^" => lhs ^ rhs,
            "&" => lhs & rhs,
            "==" => (lhs == rhs) as i64,
            "!=" => (lhs != rhs) as i64,
            "<" => (lhs < rhs) as i64,
            ">" => (lhs > rhs) as i64,
            "<=" => (lhs <= rhs) as i64,
            ">=" => (lhs >= rhs) as i64,
            "<<" => lhs.wrapping_shl(rhs as u32),
            ">>" => lhs.wrapping_shr(rhs as u32),
            "+" => lhs.wrapping_add(rhs),
            "-" => lhs.wrapping_sub(rhs),
            "*" => lhs.wrapping_mul(rhs),
            "/" | "%" => {
                if rhs == 0 {
                    return Err(Diagnostic::new(
                        self.line,
                        "division by zero in preprocessor expression",
                    ));
                }
                if op == "/" {
                    lhs.wrapping_div(rhs)
                } else {
                    lhs.wrapping_rem(rhs)
                }
            }
            _ => {
                return Err(Diagnostic::new(
                    self.line,
                    format!("'{op}' : unsupported operator in preprocessor expression"),
                ))
            }
        })
    }

    fn parse_unary(&mut self) -> Result<i64, Diagnostic> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| {
                Diagnostic::new(self.line, "unexpected end of preprocessor expression")
            })?;
        self.pos += 1;
        match token {
            ExprToken::Number(value) => Ok(value),
            ExprToken::Op("!") => Ok((self.parse_unary()? == 0) as i64),
            ExprToken::Op("-") => Ok(self.parse_unary()?.wrapping_neg()),
            ExprToken::Op("+") => self.parse_unary(),
            ExprToken::Op("~") => Ok(!self.parse_unary()?),
            ExprToken::Op("(") => {
                let value = self.parse(0)?;
                if self.tokens.get(self.pos) != Some(&ExprToken::Op(")")) {
                    return Err(Diagnostic::new(
                        self.line,
                        "missing ')' in preprocessor expression",
                    ));
                }
                self.pos += 1;
                Ok(value)
            }
            other => Err(Diagnostic::new(
                self.line,
                format!("{other:?} : unexpected token in preprocessor expression"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<String, Diagnostic> {
        preprocess(source).map(|p| p.text)
    }

    #[test]
    fn test_requires_version() {
        let err = run("void main() {}\n").unwrap_err();
        assert!(err.message.contains("#version"));
    }

    #[test]
    fn test_version_after_code_is_rejected() {
        let err = run("float x;\n#version 300 es\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_object_macro_expansion() {
        let text = run("#version 300 es\n#define COUNT 4\nfloat a[COUNT];\n").unwrap();
        assert!(text.contains("float a[4];"));
    }

    #[test]
    fn test_nested_macro_expansion() {
        let text = run("#version 300 es\n#define A B\n#define B 7\nint x = A;\n").unwrap();
        assert!(text.contains("int x = 7;"));
    }

    #[test]
    fn test_conditionals() {
        let source = "#version 300 es\n#define USE_UV\n#ifdef USE_UV\nyes_uv\n#else\nno_uv\n#endif\n#ifndef USE_UV\nhidden\n#endif\n";
        let text = run(source).unwrap();
        assert!(text.contains("yes_uv"));
        assert!(!text.contains("no_uv"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn test_if_expression_with_defined() {
        let source = "#version 300 es\n#define N 4\n#if defined(N) && N > 0\nsome\n#elif N == 0\nnone\n#endif\n#if defined MISSING || (N * 2 - 8)\nnever\n#endif\n";
        let text = run(source).unwrap();
        assert!(text.contains("some"));
        assert!(!text.contains("none"));
        assert!(!text.contains("never"));
    }

    #[test]
    fn test_elif_chain_takes_first_match() {
        let source = "#version 300 es\n#define N 2\n#if N == 1\none\n#elif N == 2\ntwo\n#elif N >= 2\nlater\n#else\nother\n#endif\n";
        let text = run(source).unwrap();
        assert!(text.contains("two"));
        assert!(!text.contains("later"));
        assert!(!text.contains("other"));
    }

    #[test]
    fn test_undefined_identifier_in_if_is_error() {
        let err = run("#version 300 es\n#if MISSING > 0\n#endif\n").unwrap_err();
        assert!(err.message.contains("MISSING"));
    }

    #[test]
    fn test_error_directive() {
        let err = run("#version 300 es\n#ifndef N\n#error N is required\n#endif\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("N is required"));
    }

    #[test]
    fn test_unterminated_conditional() {
        let err = run("#version 300 es\n#ifdef A\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_comments_are_stripped_and_lines_kept() {
        let text = run("#version 300 es\n/* a\nb */ float x; // trailing\n").unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("float x;"));
        assert!(!text.contains("trailing"));
    }

    #[test]
    fn test_undef() {
        let source = "#version 300 es\n#define A 1\n#undef A\n#ifdef A\nstill\n#endif\n";
        assert!(!run(source).unwrap().contains("still"));
    }

    #[test]
    fn test_function_like_macro_rejected() {
        let err = run("#version 300 es\n#define SQR(x) x*x\n").unwrap_err();
        assert!(err.message.contains("function-like"));
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::new(12, "'vec5' : undeclared type");
        assert_eq!(diagnostic.to_string(), "ERROR: 0:12: 'vec5' : undeclared type");
    }
}
