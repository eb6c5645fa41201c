//! Viterbi CKY parsing for probabilistic context-free grammars in Chomsky
//! Normal Form.
//!
//! ```
//! use pcky::Grammar;
//!
//! let g: Grammar = r#"
//!   S ; 1.0
//!   S -> NP VP ; 1.0
//!   NP -> flights ; 1.0
//!   VP -> leave ; 1.0
//! "#
//! .parse()
//! .unwrap();
//!
//! g.verify().unwrap();
//! assert!(g.is_in_language(&["flights", "leave"]));
//! let (tree, log_prob) = g.best_parse(&["flights", "leave"]).unwrap();
//! assert_eq!(tree.leaves(), vec!["flights", "leave"]);
//! assert_eq!(log_prob, 0.0);
//! ```

#[macro_use]
extern crate lazy_static;

pub mod chart;
pub mod grammar;
pub mod parse_grammar;
pub mod rules;
pub mod syntree;
pub mod utils;

pub use crate::chart::{BackPointer, Chart, ChartParser, Entry, ProbTable, Span};
pub use crate::grammar::{Grammar, GrammarError};
pub use crate::rules::Rule;
pub use crate::syntree::{reconstruct, Constituent, SynTree, Word};
pub use crate::utils::Err;

impl Grammar {
  pub fn parser(&self) -> ChartParser<'_> {
    ChartParser::new(self)
  }

  pub fn parse_chart(&self, input: &[&str]) -> (Chart, ProbTable) {
    self.parser().parse(input)
  }

  pub fn is_in_language(&self, input: &[&str]) -> bool {
    self.parser().is_in_language(input)
  }

  pub fn best_parse(&self, input: &[&str]) -> Option<(SynTree<String, String>, f64)> {
    self.parser().best_parse(input)
  }
}

#[test]
fn test_single_token_needs_unary_start() {
  let g: Grammar = r#"
    S ; 1.0
    S -> NP VP ; 1.0
    NP -> flights ; 1.0
    VP -> flights ; 1.0
  "#
  .parse()
  .unwrap();

  assert!(g.verify().is_ok());
  assert!(!g.is_in_language(&["flights"]));
  assert!(g.is_in_language(&["flights", "flights"]));

  let g: Grammar = r#"
    S ; 1.0
    S -> flights ; 1.0
  "#
  .parse()
  .unwrap();
  assert!(g.is_in_language(&["flights"]));
}
