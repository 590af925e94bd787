//! `hit braceexpr`: reads a brace expression from stdin with only the
//! `env` and `raw` evaluators registered (no document, so `replace` has
//! nothing to look up against), expands it, and writes the result to
//! stdout.

use std::io::{self, Read, Write};

use hit::{BraceExpander, Evaluators, Tree};

pub fn run() -> anyhow::Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let mut evaluators = Evaluators::new();
    evaluators.register("env", |args, _tree| {
        let var = args.first().cloned().unwrap_or_default();
        Ok(std::env::var(var).unwrap_or_default())
    });
    evaluators.register("raw", |args, _tree| Ok(args.concat()));
    let expander = BraceExpander::new(evaluators);

    let tree = Tree::new();
    let out = expander
        .expand_str(input.trim_end_matches('\n'), &tree, "<stdin>", 1, 1)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(out.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}
