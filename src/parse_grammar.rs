//! Line-based parsing of PCFG grammar files
//!
//! ```text
//! # comment
//! S ; 1.0
//! S -> NP VP ; 1.0
//! NP -> flights ; 0.3
//! ```
//!
//! A line without `->` declares the start symbol, every other non-blank,
//! non-comment line is a rule.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::grammar::Grammar;
use crate::rules::Rule;
use crate::Err;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

enum Line {
  Start(String),
  Rule(Rule),
}

fn parse_prob(s: &str, lineno: usize) -> Result<f64, Err> {
  let s = s.trim();
  let prob = s
    .parse::<f64>()
    .map_err(|e| format!("line {}: bad probability {:?}: {}", lineno, s, e))?;
  if prob > 0.0 && prob <= 1.0 {
    Ok(prob)
  } else {
    Err(format!("line {}: probability {} is outside (0, 1]", lineno, prob).into())
  }
}

/// Splits on the first `->` and the last `;`
fn parse_rule(s: &str, lineno: usize) -> Result<Rule, Err> {
  regex_static!(RULE, r"^(?P<lhs>.*?)->(?P<rhs>.*);(?P<prob>[^;]*)$");

  let caps = RULE
    .captures(s)
    .ok_or_else(|| format!("line {}: expected `LHS -> RHS ; prob`, got {:?}", lineno, s))?;

  let lhs = caps["lhs"].trim();
  if lhs.is_empty() || lhs.contains(char::is_whitespace) {
    return Err(format!("line {}: bad left-hand side {:?}", lineno, lhs).into());
  }

  let rhs = caps["rhs"]
    .split_whitespace()
    .map(|s| s.to_string())
    .collect::<Vec<_>>();
  if rhs.is_empty() {
    return Err(format!("line {}: empty right-hand side", lineno).into());
  }

  let prob = parse_prob(&caps["prob"], lineno)?;
  Ok(Rule::new(lhs, rhs, prob))
}

/// Splits on the last `;`
fn parse_start(s: &str, lineno: usize) -> Result<String, Err> {
  regex_static!(START, r"^(?P<start>.*);(?P<prob>[^;]*)$");

  let caps = START
    .captures(s)
    .ok_or_else(|| format!("line {}: expected `START ; prob`, got {:?}", lineno, s))?;

  let start = caps["start"].trim();
  if start.is_empty() || start.contains(char::is_whitespace) {
    return Err(format!("line {}: bad start symbol {:?}", lineno, start).into());
  }
  parse_prob(&caps["prob"], lineno)?;

  Ok(start.to_string())
}

fn parse_line(line: &str, lineno: usize) -> Result<Option<Line>, Err> {
  let line = line.trim();
  if line.is_empty() || line.starts_with('#') {
    Ok(None)
  } else if line.contains("->") {
    parse_rule(line, lineno).map(|r| Some(Line::Rule(r)))
  } else {
    parse_start(line, lineno).map(|s| Some(Line::Start(s)))
  }
}

impl FromStr for Grammar {
  type Err = Err;

  /// Parses a grammar from a string. The start symbol may be declared
  /// anywhere; if it is declared more than once, the last one wins.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut start = None;
    let mut rules = Vec::new();

    for (idx, line) in s.lines().enumerate() {
      match parse_line(line, idx + 1)? {
        Some(Line::Start(s)) => start = Some(s),
        Some(Line::Rule(r)) => rules.push(r),
        None => {}
      }
    }

    let start = start.ok_or("missing start symbol declaration")?;
    if rules.is_empty() {
      return Err("empty ruleset".into());
    }

    let mut g = Grammar::new(start);
    for rule in rules {
      g.push_rule(rule);
    }

    debug!(start = g.start(), rules = g.len(), "loaded grammar");
    Ok(g)
  }
}

impl Grammar {
  pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Err> {
    let src = fs::read_to_string(path)?;
    src.parse()
  }
}
