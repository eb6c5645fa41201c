use std::env;
use std::io;
use std::io::Write;
use std::process;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use pcky::{ChartParser, Err, Grammar};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} GRAMMAR [options]

Reads sentences from stdin, one per line, and prints the most probable parse.

Options:
  -h, --help          Print this message
  -v, --verify-only   Check that GRAMMAR is a PCFG in CNF and exit
  -c, --chart         Print the backpointer chart (defaults to not printing)
  -p, --probs         Print the probability table (defaults to not printing)",
    prog_name
  )
}

fn parse(parser: &ChartParser<'_>, sentence: &str, print_chart: bool, print_probs: bool) {
  let tokens = sentence.split_whitespace().collect::<Vec<_>>();
  if tokens.is_empty() {
    return;
  }

  let (chart, probs) = parser.parse(&tokens);
  if print_chart {
    println!("chart:\n{}", chart);
  }
  if print_probs {
    println!("probabilities:\n{}", probs);
  }

  match parser.best_tree(&chart, &probs, tokens.len()) {
    Some((tree, log_prob)) => {
      println!("{}", tree);
      println!("log-probability: {}\n", log_prob);
    }
    None => println!("no parse\n"),
  }
}

struct Args {
  filename: String,
  verify_only: bool,
  print_chart: bool,
  print_probs: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "pcky"));
    }

    let args_len = v.len();
    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap_or_else(|| "pcky".to_string());

    if args_len < 2 {
      return Err(Self::make_error_message("not enough arguments", prog_name));
    }

    let mut filename: Option<String> = None;
    let mut verify_only = false;
    let mut print_chart = false;
    let mut print_probs = false;

    for o in iter {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-v" || o == "--verify-only" {
        verify_only = true;
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-p" || o == "--probs" {
        print_probs = true;
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        verify_only,
        print_chart,
        print_probs,
      })
    } else {
      Err(Self::make_error_message("missing filename", prog_name))
    }
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let g = Grammar::read_from_file(&opts.filename)?;

  if let Err(e) = g.verify() {
    if opts.verify_only {
      println!("{} is an invalid grammar: {}", opts.filename, e);
    } else {
      eprintln!("{} is an invalid grammar: {}", opts.filename, e);
    }
    process::exit(1);
  }

  if opts.verify_only {
    println!("{} is a valid PCFG in CNF", opts.filename);
    return Ok(());
  }

  debug!(grammar = opts.filename.as_str(), "reading sentences from stdin");
  let parser = ChartParser::new(&g);

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        parse(&parser, input.trim(), opts.print_chart, opts.print_probs);
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
