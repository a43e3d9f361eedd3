//! Symbolic rate-law expressions.
//!
//! Rate laws travel through the metamodel as small symbolic expressions
//! (`k * S * I`, `b*S*(1 + I)`, ...). We keep a deliberately minimal AST:
//!
//! - symbols (parameter and concept names)
//! - floating point literals
//! - `+ - * / ^`, unary minus, parentheses
//!
//! Expressions serialize as **parseable strings** so that model JSON stays
//! readable and round-trips through other tooling. Simplification and
//! algebraic rewriting are out of scope; the comparison engine never looks
//! inside rate laws.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::multispace0,
    combinator::{all_consuming, map, opt, recognize},
    number::complete::double,
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A symbolic rate-law expression.
#[derive(Debug, Clone, PartialEq)]
pub enum RateExpr {
    /// A non-negative literal. The parser renders `-2` as
    /// `Neg(Number(2.0))`, and [`RateExpr::number`] normalizes the same
    /// way, so printed expressions reparse to an identical tree.
    Number(f64),
    Symbol(String),
    Neg(Box<RateExpr>),
    Add(Box<RateExpr>, Box<RateExpr>),
    Sub(Box<RateExpr>, Box<RateExpr>),
    Mul(Box<RateExpr>, Box<RateExpr>),
    Div(Box<RateExpr>, Box<RateExpr>),
    Pow(Box<RateExpr>, Box<RateExpr>),
}

#[derive(Debug, Error)]
pub enum ExprParseError {
    #[error("invalid rate-law expression {input:?}: {message}")]
    Invalid { input: String, message: String },
}

impl RateExpr {
    pub fn symbol(name: impl Into<String>) -> Self {
        RateExpr::Symbol(name.into())
    }

    /// Numeric literal, with negative values normalized to unary minus so
    /// the result matches what parsing the printed form produces.
    pub fn number(value: f64) -> Self {
        if value < 0.0 {
            RateExpr::Neg(Box::new(RateExpr::Number(-value)))
        } else {
            RateExpr::Number(value)
        }
    }

    /// Product of the given factors. An empty iterator yields `1`.
    pub fn product<I: IntoIterator<Item = RateExpr>>(factors: I) -> Self {
        let mut iter = factors.into_iter();
        let first = match iter.next() {
            Some(e) => e,
            None => return RateExpr::Number(1.0),
        };
        iter.fold(first, |acc, e| RateExpr::Mul(Box::new(acc), Box::new(e)))
    }

    /// Sum of the given terms. An empty iterator yields `0`.
    pub fn sum<I: IntoIterator<Item = RateExpr>>(terms: I) -> Self {
        let mut iter = terms.into_iter();
        let first = match iter.next() {
            Some(e) => e,
            None => return RateExpr::Number(0.0),
        };
        iter.fold(first, |acc, e| RateExpr::Add(Box::new(acc), Box::new(e)))
    }

    /// Collect the free symbols of this expression.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            RateExpr::Number(_) => {}
            RateExpr::Symbol(name) => {
                out.insert(name.clone());
            }
            RateExpr::Neg(inner) => inner.collect_symbols(out),
            RateExpr::Add(a, b)
            | RateExpr::Sub(a, b)
            | RateExpr::Mul(a, b)
            | RateExpr::Div(a, b)
            | RateExpr::Pow(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Replace every occurrence of the symbol `name` with `replacement`.
    pub fn substitute_symbol(&self, name: &str, replacement: &RateExpr) -> RateExpr {
        match self {
            RateExpr::Number(v) => RateExpr::Number(*v),
            RateExpr::Symbol(s) => {
                if s == name {
                    replacement.clone()
                } else {
                    RateExpr::Symbol(s.clone())
                }
            }
            RateExpr::Neg(inner) => {
                RateExpr::Neg(Box::new(inner.substitute_symbol(name, replacement)))
            }
            RateExpr::Add(a, b) => RateExpr::Add(
                Box::new(a.substitute_symbol(name, replacement)),
                Box::new(b.substitute_symbol(name, replacement)),
            ),
            RateExpr::Sub(a, b) => RateExpr::Sub(
                Box::new(a.substitute_symbol(name, replacement)),
                Box::new(b.substitute_symbol(name, replacement)),
            ),
            RateExpr::Mul(a, b) => RateExpr::Mul(
                Box::new(a.substitute_symbol(name, replacement)),
                Box::new(b.substitute_symbol(name, replacement)),
            ),
            RateExpr::Div(a, b) => RateExpr::Div(
                Box::new(a.substitute_symbol(name, replacement)),
                Box::new(b.substitute_symbol(name, replacement)),
            ),
            RateExpr::Pow(a, b) => RateExpr::Pow(
                Box::new(a.substitute_symbol(name, replacement)),
                Box::new(b.substitute_symbol(name, replacement)),
            ),
        }
    }
}

// ============================================================================
// Printing (parseable, precedence-aware)
// ============================================================================

// Binding strengths used for parenthesization on output.
const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_NEG: u8 = 3;
const PREC_POW: u8 = 4;
const PREC_ATOM: u8 = 5;

impl RateExpr {
    fn prec(&self) -> u8 {
        match self {
            RateExpr::Number(v) if *v < 0.0 => PREC_NEG,
            RateExpr::Number(_) | RateExpr::Symbol(_) => PREC_ATOM,
            RateExpr::Neg(_) => PREC_NEG,
            RateExpr::Add(_, _) | RateExpr::Sub(_, _) => PREC_ADD,
            RateExpr::Mul(_, _) | RateExpr::Div(_, _) => PREC_MUL,
            RateExpr::Pow(_, _) => PREC_POW,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        let needs_parens = self.prec() < min_prec;
        if needs_parens {
            write!(f, "(")?;
        }
        match self {
            RateExpr::Number(v) => write!(f, "{v}")?,
            RateExpr::Symbol(name) => write!(f, "{name}")?,
            RateExpr::Neg(inner) => {
                write!(f, "-")?;
                inner.fmt_prec(f, PREC_NEG)?;
            }
            RateExpr::Add(a, b) => {
                a.fmt_prec(f, PREC_ADD)?;
                write!(f, " + ")?;
                b.fmt_prec(f, PREC_ADD)?;
            }
            RateExpr::Sub(a, b) => {
                a.fmt_prec(f, PREC_ADD)?;
                write!(f, " - ")?;
                // Right side binds one step tighter so `a - (b + c)` keeps
                // its parentheses.
                b.fmt_prec(f, PREC_ADD + 1)?;
            }
            RateExpr::Mul(a, b) => {
                a.fmt_prec(f, PREC_MUL)?;
                write!(f, "*")?;
                b.fmt_prec(f, PREC_MUL)?;
            }
            RateExpr::Div(a, b) => {
                a.fmt_prec(f, PREC_MUL)?;
                write!(f, "/")?;
                b.fmt_prec(f, PREC_MUL + 1)?;
            }
            RateExpr::Pow(a, b) => {
                // `^` is right-associative.
                a.fmt_prec(f, PREC_ATOM)?;
                write!(f, "^")?;
                b.fmt_prec(f, PREC_POW)?;
            }
        }
        if needs_parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for RateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

// ============================================================================
// Parsing (nom)
// ============================================================================

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(multispace0, inner)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn parse_atom(input: &str) -> IResult<&str, RateExpr> {
    ws(alt((
        map(identifier, |name: &str| RateExpr::Symbol(name.to_string())),
        map(double, RateExpr::Number),
        delimited(tag("("), parse_add, ws(tag(")"))),
    )))(input)
}

// `^` binds tighter than unary minus and is right-associative: the exponent
// recurses through `parse_unary` so `x^-2` and `x^y^z` parse as expected.
fn parse_pow(input: &str) -> IResult<&str, RateExpr> {
    let (input, base) = parse_atom(input)?;
    let (input, exponent) = opt(preceded(ws(tag("^")), parse_unary))(input)?;
    Ok(match exponent {
        Some(e) => (input, RateExpr::Pow(Box::new(base), Box::new(e))),
        None => (input, base),
    })
}

fn parse_unary(input: &str) -> IResult<&str, RateExpr> {
    alt((
        map(preceded(ws(tag("-")), parse_unary), |e| {
            RateExpr::Neg(Box::new(e))
        }),
        parse_pow,
    ))(input)
}

fn parse_mul(input: &str) -> IResult<&str, RateExpr> {
    let (mut input, mut acc) = parse_unary(input)?;
    loop {
        let (rest, op) = match opt(ws(alt((tag("*"), tag("/")))))(input)? {
            (rest, Some(op)) => (rest, op),
            (rest, None) => return Ok((rest, acc)),
        };
        let (rest, rhs) = parse_unary(rest)?;
        acc = match op {
            "*" => RateExpr::Mul(Box::new(acc), Box::new(rhs)),
            _ => RateExpr::Div(Box::new(acc), Box::new(rhs)),
        };
        input = rest;
    }
}

fn parse_add(input: &str) -> IResult<&str, RateExpr> {
    let (mut input, mut acc) = parse_mul(input)?;
    loop {
        let (rest, op) = match opt(ws(alt((tag("+"), tag("-")))))(input)? {
            (rest, Some(op)) => (rest, op),
            (rest, None) => return Ok((rest, acc)),
        };
        let (rest, rhs) = parse_mul(rest)?;
        acc = match op {
            "+" => RateExpr::Add(Box::new(acc), Box::new(rhs)),
            _ => RateExpr::Sub(Box::new(acc), Box::new(rhs)),
        };
        input = rest;
    }
}

/// Parse a rate-law expression from its string form.
pub fn parse_rate_expr(input: &str) -> Result<RateExpr, ExprParseError> {
    match all_consuming(delimited(multispace0, parse_add, multispace0))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(err) => Err(ExprParseError::Invalid {
            input: input.to_string(),
            message: err.to_string(),
        }),
    }
}

impl FromStr for RateExpr {
    type Err = ExprParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rate_expr(s)
    }
}

// Expressions live on the wire as strings (`"k*S*I"`).
impl Serialize for RateExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RateExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
