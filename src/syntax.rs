//! TypeScript-flavoured type expressions and guard rules.
//!
//! ```text
//! type    := union
//! union   := '|'? inter ('|' inter)*
//! inter   := postfix ('&' postfix)*
//! postfix := atom ('[' ']')*
//! atom    := primitive | '{' fields? '}' | '(' type ')'
//! fields  := field ((';' | ',') field)* (';' | ',')?
//! field   := (ident | string) ':' type
//!
//! rule    := 'typeof' primitive '=>' branch
//!          | (ident | string) 'in' '=>' branch
//! ```
//!
//! Errors are `InvalidDescriptor` and carry the byte offset of the problem.
//! Nesting (groups, shapes and `[]` suffixes) is capped at [`MAX_DEPTH`]
//! levels, the same limit serde_json puts on the JSON descriptor form.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::descriptor::{Primitive, TypeDescriptor};
use crate::error::{Result, TypeError};
use crate::narrow::{Guard, GuardRule};

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:(?P<ident>[A-Za-z_$][A-Za-z0-9_$]*)|(?P<str>"(?:[^"\\]|\\.)*")|(?P<punct>=>|[|&\[\]{}():;,]))"#)
        .expect("token regex is valid")
});

static TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").expect("whitespace regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Punct(&'static str),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

/// Deepest descriptor the parser will build.
pub const MAX_DEPTH: usize = 128;

const PUNCTS: &[&str] = &["=>", "|", "&", "[", "]", "{", "}", "(", ")", ":", ";", ","];

fn syntax_error(offset: usize, msg: impl std::fmt::Display) -> TypeError {
    TypeError::invalid(format!("{msg} at offset {offset}"))
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while !TRAILING_WS.is_match(&src[pos..]) {
        let caps = TOKEN
            .captures(&src[pos..])
            .ok_or_else(|| {
                let at = pos + (src[pos..].len() - src[pos..].trim_start().len());
                syntax_error(at, format!("unexpected character {:?}", src[at..].chars().next().unwrap_or(' ')))
            })?;
        let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let (tok, start) = if let Some(m) = caps.name("ident") {
            (Tok::Ident(m.as_str().to_string()), m.start())
        } else if let Some(m) = caps.name("str") {
            let s: String = serde_json::from_str(m.as_str())
                .map_err(|e| syntax_error(pos + m.start(), format!("bad string literal ({e})")))?;
            (Tok::Str(s), m.start())
        } else if let Some(m) = caps.name("punct") {
            let p = PUNCTS.iter().copied().find(|p| *p == m.as_str()).unwrap_or("?");
            (Tok::Punct(p), m.start())
        } else {
            return Err(syntax_error(pos, "unrecognised token"));
        };
        out.push(Token { tok, offset: pos + start });
        pos += whole;
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    /// Open groups and shapes around the current token.
    depth: usize,
    /// Deepest level reached by the postfix expression being parsed,
    /// `[]` suffixes included.
    peak: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self> {
        Ok(Parser { tokens: tokenize(src)?, pos: 0, end: src.len(), depth: 0, peak: 0 })
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.offset).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).map(|t| t.tok.clone());
        self.pos += 1;
        t
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.peek() == Some(&Tok::Punct(punct(p))) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: &str) -> Result<()> {
        if self.eat(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{p}`")))
        }
    }

    fn unexpected(&self, wanted: &str) -> TypeError {
        match self.peek() {
            None => syntax_error(self.end, format!("expected {wanted}, found end of input")),
            Some(t) => syntax_error(self.offset(), format!("expected {wanted}, found {}", describe(t))),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of input")),
        }
    }

    fn within_limit(&self, level: usize) -> Result<()> {
        if level > MAX_DEPTH {
            return Err(syntax_error(self.offset(), "type nested too deeply"));
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        self.peak = self.peak.max(self.depth);
        self.within_limit(self.depth)
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // —— types ——

    fn parse_type(&mut self) -> Result<TypeDescriptor> {
        self.eat("|");
        let start = self.offset();
        let mut members = vec![self.parse_intersection()?];
        while self.eat("|") {
            members.push(self.parse_intersection()?);
        }
        if members.len() == 1 {
            return Ok(members.remove(0));
        }
        TypeDescriptor::union(members).map_err(|e| at(start, e))
    }

    fn parse_intersection(&mut self) -> Result<TypeDescriptor> {
        let start = self.offset();
        let mut members = vec![self.parse_postfix()?];
        while self.eat("&") {
            members.push(self.parse_postfix()?);
        }
        if members.len() == 1 {
            return Ok(members.remove(0));
        }
        TypeDescriptor::intersection(members).map_err(|e| at(start, e))
    }

    fn parse_postfix(&mut self) -> Result<TypeDescriptor> {
        let outer_peak = self.peak;
        self.peak = self.depth;
        let mut ty = self.parse_atom()?;
        let mut level = self.peak;
        while self.eat("[") {
            level += 1;
            self.within_limit(level)?;
            self.expect("]")?;
            ty = TypeDescriptor::array(ty);
        }
        self.peak = outer_peak.max(level);
        Ok(ty)
    }

    fn parse_atom(&mut self) -> Result<TypeDescriptor> {
        let offset = self.offset();
        match self.peek().cloned() {
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                let p: Primitive = name.parse().map_err(|e| at(offset, e))?;
                Ok(TypeDescriptor::Primitive(p))
            }
            Some(Tok::Punct("(")) => {
                self.enter()?;
                self.pos += 1;
                let ty = self.parse_type()?;
                self.expect(")")?;
                self.leave();
                Ok(ty)
            }
            Some(Tok::Punct("{")) => {
                self.enter()?;
                self.pos += 1;
                let ty = self.parse_shape_body(offset)?;
                self.leave();
                Ok(ty)
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    fn parse_shape_body(&mut self, offset: usize) -> Result<TypeDescriptor> {
        let mut fields: Vec<(String, TypeDescriptor)> = Vec::new();
        while !self.eat("}") {
            let name = match self.advance() {
                Some(Tok::Ident(s)) | Some(Tok::Str(s)) => s,
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected("a field name or `}`"));
                }
            };
            self.expect(":")?;
            fields.push((name, self.parse_type()?));
            if !(self.eat(";") || self.eat(",")) {
                self.expect("}")?;
                break;
            }
        }
        TypeDescriptor::shape(fields).map_err(|e| at(offset, e))
    }

    // —— guards ——

    fn parse_rule(&mut self) -> Result<GuardRule> {
        let guard = match self.advance() {
            Some(Tok::Ident(kw)) if kw == "typeof" => {
                let offset = self.offset();
                match self.advance() {
                    Some(Tok::Ident(name)) => Guard::IsTypeofPrimitive(name.parse().map_err(|e| at(offset, e))?),
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("a primitive name"));
                    }
                }
            }
            Some(Tok::Ident(field)) | Some(Tok::Str(field)) => {
                match self.advance() {
                    Some(Tok::Ident(kw)) if kw == "in" => Guard::HasField(field),
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("`in`"));
                    }
                }
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.unexpected("`typeof` or a field name"));
            }
        };
        self.expect("=>")?;
        let branch = match self.advance() {
            Some(Tok::Ident(s)) | Some(Tok::Str(s)) if !s.is_empty() => s,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("a branch name"));
            }
        };
        Ok(GuardRule::new(guard, branch))
    }
}

fn punct(p: &str) -> &'static str {
    PUNCTS.iter().copied().find(|q| *q == p).unwrap_or("?")
}

fn describe(t: &Tok) -> String {
    match t {
        Tok::Ident(s) => format!("`{s}`"),
        Tok::Str(s) => format!("{:?}", s),
        Tok::Punct(p) => format!("`{p}`"),
    }
}

/// Attach a source offset to a constructor error.
fn at(offset: usize, e: TypeError) -> TypeError {
    match e {
        TypeError::InvalidDescriptor { reason } => syntax_error(offset, reason),
        other => other,
    }
}

/// Parse a type expression such as `string | { name: string } & { id: number }`.
pub fn parse_type(src: &str) -> Result<TypeDescriptor> {
    let mut p = Parser::new(src)?;
    let ty = p.parse_type()?;
    p.finish()?;
    Ok(ty)
}

/// Parse a guard rule: `typeof number => B` or `"maullar" in => Cat`.
pub fn parse_guard(src: &str) -> Result<GuardRule> {
    let mut p = Parser::new(src)?;
    let rule = p.parse_rule()?;
    p.finish()?;
    Ok(rule)
}

impl std::str::FromStr for TypeDescriptor {
    type Err = TypeError;
    fn from_str(s: &str) -> Result<Self> { parse_type(s) }
}

impl std::str::FromStr for GuardRule {
    type Err = TypeError;
    fn from_str(s: &str) -> Result<Self> { parse_guard(s) }
}
