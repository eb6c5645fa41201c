use std::fmt;

/// A weighted production `lhs -> rhs ; prob`.
///
/// In a CNF grammar `rhs` is either one terminal or two nonterminals, but
/// that is only checked by `Grammar::verify`, so a `Rule` can hold any
/// right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
  pub lhs: String,
  pub rhs: Vec<String>,
  pub prob: f64,
}

impl Rule {
  pub fn new(lhs: impl Into<String>, rhs: Vec<String>, prob: f64) -> Self {
    Self {
      lhs: lhs.into(),
      rhs,
      prob,
    }
  }

  pub fn len(&self) -> usize {
    self.rhs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_unary(&self) -> bool {
    self.len() == 1
  }

  pub fn is_binary(&self) -> bool {
    self.len() == 2
  }

  pub fn log_prob(&self) -> f64 {
    self.prob.ln()
  }

  /// The rule without its probability, `A -> B C`, as used in diagnostics
  pub fn production_str(&self) -> String {
    format!("{} -> {}", self.lhs, self.rhs.join(" "))
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.lhs)?;
    for p in self.rhs.iter() {
      write!(f, " {}", p)?;
    }
    write!(f, " ; {}", self.prob)
  }
}

#[test]
fn test_rule_display() {
  let rule = Rule::new("S", vec!["NP".to_string(), "VP".to_string()], 0.25);
  assert_eq!(rule.to_string(), "S -> NP VP ; 0.25");
  assert_eq!(rule.production_str(), "S -> NP VP");
  assert!(rule.is_binary());
  assert!(!rule.is_unary());
}
