use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, debug_span, trace};

use crate::grammar::Grammar;
use crate::syntree::{reconstruct, SynTree};

/// Half-open token range `start..end`
pub type Span = (usize, usize);

/// Per-span map from nonterminal to a value, in the order symbols were first
/// written. Overwriting a symbol keeps its position.
pub type Cell<T> = IndexMap<String, T>;

/// Points at the best derivation of `symbol` over `start..end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackPointer {
  pub symbol: String,
  pub start: usize,
  pub end: usize,
}

impl BackPointer {
  pub fn new(symbol: impl Into<String>, span: Span) -> Self {
    Self {
      symbol: symbol.into(),
      start: span.0,
      end: span.1,
    }
  }

  pub fn span(&self) -> Span {
    (self.start, self.end)
  }
}

impl fmt::Display for BackPointer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({} {}..{})", self.symbol, self.start, self.end)
  }
}

/// How a nonterminal was derived over a span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
  /// Width-1 span, derived straight from this token
  Leaf(String),
  /// Left and right halves of a binary rule
  Split(BackPointer, BackPointer),
}

impl fmt::Display for Entry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(w) => write!(f, "{}", w),
      Self::Split(l, r) => write!(f, "{} {}", l, r),
    }
  }
}

/// Backpointers for every span, keyed by nonterminal.
///
/// Cells keep their symbols in first-write order, and that order decides
/// which pairs of symbols are combined first and so which derivation wins a
/// tie.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chart(BTreeMap<Span, Cell<Entry>>);

impl Chart {
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Whether the span has been filled, even if nothing derives it
  pub fn has_span(&self, span: Span) -> bool {
    self.0.contains_key(&span)
  }

  pub fn cell(&self, span: Span) -> Option<&Cell<Entry>> {
    self.0.get(&span)
  }

  pub fn get(&self, span: Span, symbol: &str) -> Option<&Entry> {
    self.0.get(&span).and_then(|cell| cell.get(symbol))
  }

  pub fn contains(&self, span: Span, symbol: &str) -> bool {
    self.get(span, symbol).is_some()
  }

  pub fn spans(&self) -> impl Iterator<Item = &Span> {
    self.0.keys()
  }

  fn insert_cell(&mut self, span: Span, cell: Cell<Entry>) {
    self.0.insert(span, cell);
  }
}

impl fmt::Display for Chart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (span, cell) in self.0.iter() {
      writeln!(f, "{}..{}:", span.0, span.1)?;
      for (symbol, entry) in cell.iter() {
        writeln!(f, "  {} -> {}", symbol, entry)?;
      }
    }
    Ok(())
  }
}

/// Log-probabilities of the derivations in a `Chart`, same shape and keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbTable(BTreeMap<Span, Cell<f64>>);

impl ProbTable {
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn cell(&self, span: Span) -> Option<&Cell<f64>> {
    self.0.get(&span)
  }

  pub fn get(&self, span: Span, symbol: &str) -> Option<f64> {
    self.0.get(&span).and_then(|cell| cell.get(symbol)).copied()
  }

  fn insert_cell(&mut self, span: Span, cell: Cell<f64>) {
    self.0.insert(span, cell);
  }
}

impl fmt::Display for ProbTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (span, cell) in self.0.iter() {
      writeln!(f, "{}..{}:", span.0, span.1)?;
      for (symbol, prob) in cell.iter() {
        writeln!(f, "  {}: {}", symbol, prob)?;
      }
    }
    Ok(())
  }
}

/// Keeps the better of two derivations of the same symbol over the same span.
/// On an exact tie the one already in the cell stays.
fn improves(cell_probs: &Cell<f64>, symbol: &str, candidate: f64) -> bool {
  match cell_probs.get(symbol) {
    None => true,
    Some(&best) => candidate > best,
  }
}

/// Viterbi CKY parser over a borrowed grammar. The parser itself holds no
/// per-parse state, so one parser (or one grammar) can serve any number of
/// parses.
#[derive(Debug, Clone, Copy)]
pub struct ChartParser<'g> {
  grammar: &'g Grammar,
}

impl<'g> ChartParser<'g> {
  pub fn new(grammar: &'g Grammar) -> Self {
    Self { grammar }
  }

  pub fn grammar(&self) -> &'g Grammar {
    self.grammar
  }

  /// Fills the chart for every span of `tokens`, narrowest spans first, and
  /// returns it with its probability table. Both are freshly built and owned
  /// by the caller.
  pub fn parse(&self, tokens: &[&str]) -> (Chart, ProbTable) {
    let n = tokens.len();
    let _span = debug_span!("parse", tokens = n).entered();

    let mut chart = Chart::default();
    let mut probs = ProbTable::default();

    for (i, token) in tokens.iter().enumerate() {
      self.fill_terminal(&mut chart, &mut probs, (i, i + 1), token);
    }

    for width in 2..=n {
      for start in 0..=(n - width) {
        self.fill_span(&mut chart, &mut probs, (start, start + width));
      }
    }

    if n > 0 {
      debug!(
        derivable = chart.contains((0, n), self.grammar.start()),
        top_cell = chart.cell((0, n)).map_or(0, |c| c.len()),
        "parse finished"
      );
    }

    (chart, probs)
  }

  fn fill_terminal(&self, chart: &mut Chart, probs: &mut ProbTable, span: Span, token: &str) {
    if chart.has_span(span) {
      return;
    }

    let mut cell = Cell::new();
    let mut cell_probs = Cell::new();
    // every matching rule is recorded in turn, so of two identical rules the
    // later one's probability is kept
    for rule in self.grammar.rules_for_rhs(&[token]) {
      cell.insert(rule.lhs.clone(), Entry::Leaf(token.to_string()));
      cell_probs.insert(rule.lhs.clone(), rule.log_prob());
    }

    if cell.is_empty() {
      trace!(token, position = span.0, "no rule derives token");
    }

    chart.insert_cell(span, cell);
    probs.insert_cell(span, cell_probs);
  }

  fn fill_span(&self, chart: &mut Chart, probs: &mut ProbTable, span: Span) {
    if chart.has_span(span) {
      return;
    }

    let (start, end) = span;
    let mut cell = Cell::new();
    let mut cell_probs = Cell::new();

    for split in (start + 1)..end {
      let left = (start, split);
      let right = (split, end);

      let left_probs = probs.cell(left).expect("left half filled before its span");
      let right_probs = probs.cell(right).expect("right half filled before its span");

      for (b, b_prob) in left_probs.iter() {
        for (c, c_prob) in right_probs.iter() {
          for rule in self.grammar.rules_for_rhs(&[b, c]) {
            let candidate = rule.log_prob() + b_prob + c_prob;
            if improves(&cell_probs, &rule.lhs, candidate) {
              trace!(
                symbol = rule.lhs.as_str(),
                start,
                split,
                end,
                log_prob = candidate,
                "chart write"
              );
              cell.insert(
                rule.lhs.clone(),
                Entry::Split(BackPointer::new(b, left), BackPointer::new(c, right)),
              );
              cell_probs.insert(rule.lhs.clone(), candidate);
            }
          }
        }
      }
    }

    chart.insert_cell(span, cell);
    probs.insert_cell(span, cell_probs);
  }

  /// Just the backpointer chart
  pub fn chart(&self, tokens: &[&str]) -> Chart {
    self.parse(tokens).0
  }

  /// Whether the grammar's start symbol derives the whole of `tokens`
  pub fn is_in_language(&self, tokens: &[&str]) -> bool {
    if tokens.is_empty() {
      return false;
    }
    let (chart, _) = self.parse(tokens);
    chart.contains((0, tokens.len()), self.grammar.start())
  }

  /// The most probable tree for `tokens` rooted in the start symbol, with
  /// its log-probability, or None if the sentence isn't derivable
  pub fn best_parse(&self, tokens: &[&str]) -> Option<(SynTree<String, String>, f64)> {
    if tokens.is_empty() {
      return None;
    }

    let (chart, probs) = self.parse(tokens);
    self.best_tree(&chart, &probs, tokens.len())
  }

  /// The start symbol's tree over `0..len` from an already filled chart,
  /// with its log-probability
  pub fn best_tree(
    &self,
    chart: &Chart,
    probs: &ProbTable,
    len: usize,
  ) -> Option<(SynTree<String, String>, f64)> {
    let start = self.grammar.start();
    let prob = probs.get((0, len), start)?;
    Some((reconstruct(chart, 0, len, start), prob))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ATIS_LIKE: &str = r#"
    S ; 1.0
    S -> NP VP ; 0.8
    S -> VP NP ; 0.2
    NP -> DT NN ; 0.6
    NP -> flights ; 0.4
    VP -> VB NP ; 1.0
    DT -> the ; 1.0
    NN -> flights ; 0.5
    NN -> cheap ; 0.5
    VB -> book ; 0.7
    VB -> show ; 0.3
  "#;

  fn grammar() -> Grammar {
    ATIS_LIKE.parse().unwrap()
  }

  #[test]
  fn test_terminal_cells() {
    let g = grammar();
    let (chart, probs) = ChartParser::new(&g).parse(&["flights"]);

    assert_eq!(chart.len(), 1);
    assert_eq!(
      chart.get((0, 1), "NP"),
      Some(&Entry::Leaf("flights".to_string()))
    );
    assert_eq!(
      chart.get((0, 1), "NN"),
      Some(&Entry::Leaf("flights".to_string()))
    );
    assert_eq!(probs.get((0, 1), "NP"), Some(0.4f64.ln()));
    assert_eq!(probs.get((0, 1), "NN"), Some(0.5f64.ln()));
    assert!(!chart.contains((0, 1), "S"));
  }

  #[test]
  fn test_unknown_token_leaves_empty_cell() {
    let g = grammar();
    let (chart, probs) = ChartParser::new(&g).parse(&["book", "zeppelins"]);

    assert!(chart.has_span((1, 2)));
    assert!(chart.cell((1, 2)).unwrap().is_empty());
    assert!(probs.cell((1, 2)).unwrap().is_empty());
    assert!(chart.cell((0, 2)).unwrap().is_empty());
  }

  #[test]
  fn test_every_span_is_filled() {
    let g = grammar();
    let tokens = ["book", "the", "cheap", "flights"];
    let (chart, probs) = ChartParser::new(&g).parse(&tokens);

    let n = tokens.len();
    assert_eq!(chart.len(), n * (n + 1) / 2);
    assert_eq!(probs.len(), chart.len());
    for &span in chart.spans() {
      let symbols = chart.cell(span).unwrap().keys().collect::<Vec<_>>();
      let prob_symbols = probs.cell(span).unwrap().keys().collect::<Vec<_>>();
      assert_eq!(symbols, prob_symbols);
    }
  }

  #[test]
  fn test_binary_backpointers() {
    let g = grammar();
    let (chart, probs) = ChartParser::new(&g).parse(&["book", "the", "flights"]);

    assert_eq!(
      chart.get((1, 3), "NP"),
      Some(&Entry::Split(
        BackPointer::new("DT", (1, 2)),
        BackPointer::new("NN", (2, 3)),
      ))
    );
    assert_eq!(
      chart.get((0, 3), "VP"),
      Some(&Entry::Split(
        BackPointer::new("VB", (0, 1)),
        BackPointer::new("NP", (1, 3)),
      ))
    );

    let expected = 1.0f64.ln() + 0.7f64.ln() + (0.6f64.ln() + 1.0f64.ln() + 0.5f64.ln());
    let got = probs.get((0, 3), "VP").unwrap();
    assert!((got - expected).abs() < 1e-12);
    assert!(got <= 0.0);
  }

  #[test]
  fn test_membership() {
    let g = grammar();
    let parser = ChartParser::new(&g);

    assert!(parser.is_in_language(&["flights", "book", "flights"]));
    assert!(parser.is_in_language(&["book", "the", "flights", "flights"]));
    assert!(!parser.is_in_language(&["book", "the", "flights"]));
    assert!(!parser.is_in_language(&["flights"]));
    assert!(!parser.is_in_language(&[]));
    assert!(!parser.is_in_language(&["flights", "book", "zeppelins"]));
  }

  #[test]
  fn test_higher_probability_wins() {
    // two derivations of X over a b c: (P a b) c and a (Q b c)
    // the better one is only found at the second split
    let g: Grammar = r#"
      X ; 1.0
      X -> P C ; 0.9
      X -> A Q ; 0.1
      P -> A B ; 1.0
      Q -> B C ; 1.0
      A -> a ; 1.0
      B -> b ; 1.0
      C -> c ; 1.0
    "#
    .parse()
    .unwrap();

    let (chart, probs) = ChartParser::new(&g).parse(&["a", "b", "c"]);
    assert_eq!(
      chart.get((0, 3), "X"),
      Some(&Entry::Split(
        BackPointer::new("P", (0, 2)),
        BackPointer::new("C", (2, 3)),
      ))
    );
    assert!((probs.get((0, 3), "X").unwrap() - 0.9f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn test_ties_keep_first_split() {
    // not a valid PCFG, but every log-probability is exactly 0 so all
    // derivations tie
    let g: Grammar = r#"
      X ; 1.0
      X -> X X ; 1.0
      X -> x ; 1.0
    "#
    .parse()
    .unwrap();

    let (chart, probs) = ChartParser::new(&g).parse(&["x", "x", "x"]);
    // both bracketings of x x x score the same, the split at 1 is found first
    assert_eq!(
      chart.get((0, 3), "X"),
      Some(&Entry::Split(
        BackPointer::new("X", (0, 1)),
        BackPointer::new("X", (1, 3)),
      ))
    );
    assert_eq!(probs.get((0, 3), "X"), Some(0.0));
  }

  #[test]
  fn test_ties_keep_first_rule() {
    let g: Grammar = r#"
      S ; 1.0
      S -> A B ; 0.5
      S -> A C ; 0.5
      A -> a ; 1.0
      B -> b ; 0.5
      B -> c ; 0.5
      C -> b ; 0.5
      C -> c ; 0.5
    "#
    .parse()
    .unwrap();

    let (chart, _) = ChartParser::new(&g).parse(&["a", "b"]);
    // B -> b is listed before C -> b, so B comes first in the right cell
    assert_eq!(
      chart.get((0, 2), "S"),
      Some(&Entry::Split(
        BackPointer::new("A", (0, 1)),
        BackPointer::new("B", (1, 2)),
      ))
    );
  }

  #[test]
  fn test_ties_follow_grammar_order_not_names() {
    let g: Grammar = r#"
      S ; 1.0
      S -> A B ; 0.5
      S -> A C ; 0.5
      A -> a ; 1.0
      C -> b ; 0.5
      C -> c ; 0.5
      B -> b ; 0.5
      B -> c ; 0.5
    "#
    .parse()
    .unwrap();
    assert!(g.verify().is_ok());

    let (chart, probs) = ChartParser::new(&g).parse(&["a", "b"]);
    let order = chart.cell((1, 2)).unwrap().keys().collect::<Vec<_>>();
    assert_eq!(order, vec!["C", "B"]);
    let order = probs.cell((1, 2)).unwrap().keys().collect::<Vec<_>>();
    assert_eq!(order, vec!["C", "B"]);

    assert_eq!(
      chart.get((0, 2), "S"),
      Some(&Entry::Split(
        BackPointer::new("A", (0, 1)),
        BackPointer::new("C", (1, 2)),
      ))
    );
  }

  #[test]
  fn test_ties_follow_rule_order_for_shared_rhs() {
    // Y and X both rewrite to A B; Y is listed first so it is written first
    // over a b, and S -> Y C is tried before S -> X C over a b c
    let g: Grammar = r#"
      S ; 1.0
      S -> X C ; 0.5
      S -> Y C ; 0.5
      Y -> A B ; 1.0
      X -> A B ; 1.0
      A -> a ; 1.0
      B -> b ; 1.0
      C -> c ; 1.0
    "#
    .parse()
    .unwrap();
    assert!(g.verify().is_ok());

    let (chart, probs) = ChartParser::new(&g).parse(&["a", "b", "c"]);
    let order = chart.cell((0, 2)).unwrap().keys().collect::<Vec<_>>();
    assert_eq!(order, vec!["Y", "X"]);
    assert_eq!(
      chart.get((0, 3), "S"),
      Some(&Entry::Split(
        BackPointer::new("Y", (0, 2)),
        BackPointer::new("C", (2, 3)),
      ))
    );
    assert_eq!(probs.get((0, 3), "S"), Some(0.5f64.ln()));
  }

  #[test]
  fn test_overwrite_keeps_cell_position() {
    // Q is written at split 1; at split 2 P is written and then Q is
    // improved, and Q keeps its place ahead of P
    let g: Grammar = r#"
      Q ; 1.0
      Q -> A R ; 0.1
      P -> R C ; 1.0
      Q -> R C ; 0.6
      Q -> a ; 0.3
      R -> A B ; 0.5
      R -> B C ; 0.5
      A -> a ; 1.0
      B -> b ; 1.0
      C -> c ; 1.0
    "#
    .parse()
    .unwrap();

    let (chart, _) = ChartParser::new(&g).parse(&["a", "b", "c"]);
    let order = chart.cell((0, 3)).unwrap().keys().collect::<Vec<_>>();
    assert_eq!(order, vec!["Q", "P"]);
    assert_eq!(
      chart.get((0, 3), "Q"),
      Some(&Entry::Split(
        BackPointer::new("R", (0, 2)),
        BackPointer::new("C", (2, 3)),
      ))
    );
  }

  #[test]
  fn test_duplicate_terminal_rules_keep_last() {
    let g: Grammar = r#"
      S ; 1.0
      S -> a ; 0.7
      S -> a ; 0.3
    "#
    .parse()
    .unwrap();
    assert!(g.verify().is_ok());

    let (chart, probs) = ChartParser::new(&g).parse(&["a"]);
    assert_eq!(chart.get((0, 1), "S"), Some(&Entry::Leaf("a".to_string())));
    assert_eq!(probs.get((0, 1), "S"), Some(0.3f64.ln()));
  }

  #[test]
  fn test_best_tree_from_filled_chart() {
    let g = grammar();
    let parser = ChartParser::new(&g);
    let tokens = ["flights", "show", "flights"];

    let (chart, probs) = parser.parse(&tokens);
    assert_eq!(
      parser.best_tree(&chart, &probs, tokens.len()),
      parser.best_parse(&tokens)
    );

    let (chart, probs) = parser.parse(&["the", "the"]);
    assert!(parser.best_tree(&chart, &probs, 2).is_none());
  }

  #[test]
  fn test_best_parse() {
    let g = grammar();
    let parser = ChartParser::new(&g);

    let (tree, prob) = parser.best_parse(&["flights", "show", "flights"]).unwrap();
    let (cons, children) = tree.get_branch().unwrap();
    assert_eq!(cons.value, "S");
    assert_eq!(cons.span, (0, 3));
    assert_eq!(children.len(), 2);
    assert_eq!(tree.leaves(), vec!["flights", "show", "flights"]);
    assert!(prob < 0.0);

    assert!(parser.best_parse(&["the", "the"]).is_none());
    assert!(parser.best_parse(&[]).is_none());
  }

  #[test]
  fn test_display() {
    let g = grammar();
    let (chart, probs) = ChartParser::new(&g).parse(&["the", "flights"]);
    let shown = chart.to_string();
    assert!(shown.contains("0..2:\n  NP -> (DT 0..1) (NN 1..2)\n"));
    assert!(shown.contains("  DT -> the\n"));
    assert!(probs.to_string().contains("  DT: 0\n"));
  }
}
