use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::rules::Rule;
use crate::utils::is_close;

/// The first well-formedness violation found by `Grammar::verify`
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarError {
  /// Right-hand side is neither one terminal nor two nonterminals
  NotCnf { rule: String },
  /// A binary right-hand side contains a symbol that is never a lhs
  TerminalInBinaryRhs { rule: String, symbol: String },
  /// A unary right-hand side contains a symbol that is some rule's lhs
  NonterminalInUnaryRhs { rule: String, symbol: String },
  /// Probabilities of one lhs don't sum to 1
  ProbabilitySum { lhs: String, total: f64 },
}

impl fmt::Display for GrammarError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NotCnf { rule } => write!(f, "{} in non-CNF form", rule),
      Self::TerminalInBinaryRhs { rule, symbol } => {
        write!(f, "{} has terminal in RHS: {}", rule, symbol)
      }
      Self::NonterminalInUnaryRhs { rule, symbol } => {
        write!(f, "{} has nonterminal in RHS: {}", rule, symbol)
      }
      Self::ProbabilitySum { lhs, total } => {
        write!(f, "total probability of all LHS = {} is {}", lhs, total)
      }
    }
  }
}

impl Error for GrammarError {}

/// A probabilistic context-free grammar, indexed by both sides of its rules.
///
/// Rules are shared between the two indices. Nothing is checked on
/// insertion; call `verify` before handing the grammar to a parser.
#[derive(Debug, Clone)]
pub struct Grammar {
  start: String,
  rules: Vec<Arc<Rule>>,
  // rhs indices, split by length so the parser can look up by borrowed strs
  unary: HashMap<String, Vec<Arc<Rule>>>,
  binary: HashMap<String, HashMap<String, Vec<Arc<Rule>>>>,
  // any other length, so lookups stay exact for rules verify will reject
  other: HashMap<Vec<String>, Vec<Arc<Rule>>>,
  lhs_to_rules: HashMap<String, Vec<Arc<Rule>>>,
  // lhs symbols in order of first appearance, so verify reports deterministically
  lhs_order: Vec<String>,
}

impl Grammar {
  pub fn new(start: impl Into<String>) -> Self {
    Self {
      start: start.into(),
      rules: Vec::new(),
      unary: HashMap::new(),
      binary: HashMap::new(),
      other: HashMap::new(),
      lhs_to_rules: HashMap::new(),
      lhs_order: Vec::new(),
    }
  }

  pub fn start(&self) -> &str {
    &self.start
  }

  pub fn set_start(&mut self, start: impl Into<String>) {
    self.start = start.into();
  }

  /// All rules, in insertion order
  pub fn rules(&self) -> &[Arc<Rule>] {
    &self.rules
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  /// Adds a rule to both indices. Duplicates are kept.
  pub fn add_rule(&mut self, lhs: impl Into<String>, rhs: Vec<String>, prob: f64) {
    self.push_rule(Rule::new(lhs, rhs, prob));
  }

  pub fn push_rule(&mut self, rule: Rule) {
    let rule = Arc::new(rule);
    if !self.lhs_to_rules.contains_key(&rule.lhs) {
      self.lhs_order.push(rule.lhs.clone());
    }
    self
      .lhs_to_rules
      .entry(rule.lhs.clone())
      .or_default()
      .push(rule.clone());
    let bucket = match rule.rhs.as_slice() {
      [terminal] => self.unary.entry(terminal.clone()).or_default(),
      [left, right] => self
        .binary
        .entry(left.clone())
        .or_default()
        .entry(right.clone())
        .or_default(),
      _ => self.other.entry(rule.rhs.clone()).or_default(),
    };
    bucket.push(rule.clone());
    self.rules.push(rule);
  }

  /// Rules whose right-hand side is exactly `rhs`, in insertion order.
  /// Empty if there are none.
  pub fn rules_for_rhs<S: AsRef<str>>(&self, rhs: &[S]) -> &[Arc<Rule>] {
    let rules = match rhs {
      [terminal] => self.unary.get(terminal.as_ref()),
      [left, right] => self
        .binary
        .get(left.as_ref())
        .and_then(|rights| rights.get(right.as_ref())),
      _ => {
        let key = rhs.iter().map(|s| s.as_ref().to_string()).collect::<Vec<_>>();
        self.other.get(&key)
      }
    };
    rules.map(|rules| rules.as_slice()).unwrap_or(&[])
  }

  /// Rules whose left-hand side is `lhs`, in insertion order
  pub fn rules_for_lhs(&self, lhs: &str) -> &[Arc<Rule>] {
    self
      .lhs_to_rules
      .get(lhs)
      .map(|rules| rules.as_slice())
      .unwrap_or(&[])
  }

  /// Every distinct right-hand side that some rule produces
  pub fn rhs_keys(&self) -> impl Iterator<Item = Vec<String>> + '_ {
    let unary = self.unary.keys().map(|t| vec![t.clone()]);
    let binary = self.binary.iter().flat_map(|(left, rights)| {
      rights.keys().map(move |right| vec![left.clone(), right.clone()])
    });
    unary.chain(binary).chain(self.other.keys().cloned())
  }

  pub fn is_nonterminal(&self, symbol: &str) -> bool {
    self.lhs_to_rules.contains_key(symbol)
  }

  /// Symbols that appear as some rule's lhs, in order of first appearance
  pub fn nonterminals(&self) -> &[String] {
    &self.lhs_order
  }

  /// Symbols that appear in some unary rhs but are never a lhs
  pub fn terminals(&self) -> HashSet<&str> {
    self
      .rules
      .iter()
      .filter(|r| r.is_unary())
      .map(|r| r.rhs[0].as_str())
      .filter(|s| !self.is_nonterminal(s))
      .collect()
  }

  fn verify_rule(&self, rule: &Rule) -> Result<(), GrammarError> {
    match rule.rhs.as_slice() {
      [left, right] => {
        for symbol in [left, right] {
          if !self.is_nonterminal(symbol) {
            return Err(GrammarError::TerminalInBinaryRhs {
              rule: rule.production_str(),
              symbol: symbol.clone(),
            });
          }
        }
        Ok(())
      }
      [terminal] => {
        if self.is_nonterminal(terminal) {
          Err(GrammarError::NonterminalInUnaryRhs {
            rule: rule.production_str(),
            symbol: terminal.clone(),
          })
        } else {
          Ok(())
        }
      }
      _ => Err(GrammarError::NotCnf {
        rule: rule.production_str(),
      }),
    }
  }

  /// Checks that the grammar is a PCFG in Chomsky Normal Form, stopping at
  /// the first violation. Each lhs is checked in order of first appearance:
  /// its rules' shapes first, then its probability sum.
  pub fn verify(&self) -> Result<(), GrammarError> {
    for lhs in self.lhs_order.iter() {
      let rules = self.rules_for_lhs(lhs);
      let mut total = 0.0;
      for rule in rules {
        self.verify_rule(rule)?;
        total += rule.prob;
      }
      if !is_close(total, 1.0) {
        return Err(GrammarError::ProbabilitySum {
          lhs: lhs.clone(),
          total,
        });
      }
    }

    debug!(
      rules = self.len(),
      nonterminals = self.lhs_order.len(),
      "grammar verified"
    );
    Ok(())
  }

  /// `verify`, but as an optional diagnostic message
  pub fn verify_message(&self) -> Option<String> {
    self.verify().err().map(|e| e.to_string())
  }
}

impl fmt::Display for Grammar {
  /// Writes the grammar in the same text format `FromStr` reads
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{} ; 1.0", self.start)?;
    for rule in self.rules.iter() {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}
