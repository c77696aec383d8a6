use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use codesnake::{Block, CodeWidth, Label, LineIndex};
use loxc::{debug::disassemble_chunk, lexer::Span, CompileError, Scanner, TokenKind, World};
use tracing_subscriber::EnvFilter;
use yansi::{Color, Paint};

/// Compile Lox source to bytecode.
#[derive(Parser)]
struct Args {
    /// Script to compile. Starts an interactive session when omitted.
    path: Option<PathBuf>,

    /// Print the compiled chunk (always on in interactive mode)
    #[arg(short, long)]
    disassemble: bool,

    /// Print the tokens of every input
    #[arg(short, long)]
    tokens: bool,
}

fn make_block<'a>(
    idx: &'a LineIndex,
    labels: impl IntoIterator<Item = (Span, String, Color)>,
) -> Option<Block<&'a str, String>> {
    Block::new(
        idx,
        labels.into_iter().map(|(range, text, color)| {
            Label::new(range)
                .with_text(text.paint(color).to_string())
                .with_style(move |s| s.paint(color).to_string())
        }),
    )
}

fn print_block(block: Block<&str, String>, name: &str) {
    let block = block.map_code(|c| CodeWidth::new(c, c.len()));
    eprintln!("{}[{name}]", block.prologue());
    eprint!("{block}");
    eprintln!("{}", block.epilogue());
}

/// Errors at the end of input have an empty span, so point them at the last visible character.
fn visible_span(span: Span, source: &str) -> Option<Span> {
    if !span.is_empty() {
        return Some(span);
    }
    let before = source.get(..span.start)?.trim_end();
    let (start, c) = before.char_indices().next_back()?;
    Some(start..start + c.len_utf8())
}

fn report_errors(source: &str, errors: &[CompileError], name: &str) {
    for error in errors {
        eprintln!("{}", error.red());
    }

    let mut labels = errors
        .iter()
        .filter_map(|error| {
            let span = visible_span(error.span.clone(), source)?;
            Some((span, error.kind.to_string(), Color::Red))
        })
        .collect::<Vec<_>>();
    labels.sort_by_key(|(span, ..)| span.start);
    // labels must not overlap
    labels.dedup_by(|next, kept| next.0.start < kept.0.end);

    let idx = LineIndex::new(source);
    if let Some(block) = make_block(&idx, labels) {
        print_block(block, name);
    }
}

fn show_tokens(source: &str, name: &str) {
    let idx = LineIndex::new(source);

    let mut lines: Vec<(u32, Vec<_>)> = vec![];
    for token in Scanner::new(source) {
        let color = match token.kind {
            TokenKind::Identifier => Color::Blue,
            TokenKind::String => Color::Cyan,
            TokenKind::Number => Color::Yellow,
            TokenKind::Error => Color::Red,
            _ => Color::Green,
        };
        let text = match token.error {
            Some(err) => err.to_string(),
            None => token.kind.name().to_string(),
        };
        match lines.last_mut() {
            Some((line, labels)) if *line == token.line => labels.push((token.span, text, color)),
            _ => lines.push((token.line, vec![(token.span, text, color)])),
        }
    }

    for block in lines
        .into_iter()
        .filter_map(|(_, labels)| make_block(&idx, labels))
    {
        print_block(block, name);
    }
}

/// Returns whether `source` compiled without errors.
fn compile_and_show(
    world: &mut World,
    source: &str,
    name: &str,
    args: &Args,
    disassemble: bool,
) -> bool {
    if args.tokens {
        show_tokens(source, name);
    }

    let compiled = world.compile(source);
    if !compiled.is_success() {
        report_errors(source, &compiled.errors, name);
        return false;
    }
    if disassemble {
        print!("{}", disassemble_chunk(&compiled.chunk, name, world));
    }
    true
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // shared by every input, so names interned by one line keep their symbols in the next
    let mut world = World::new();

    if let Some(path) = &args.path {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let name = path.display().to_string();
        if !compile_and_show(&mut world, &source, &name, &args, args.disassemble) {
            // EX_DATAERR
            std::process::exit(65);
        }
        return Ok(());
    }

    let mut readline = rustyline::DefaultEditor::new()?;
    while let Ok(input) = readline.readline(">> ") {
        readline.add_history_entry(input.as_str())?;
        compile_and_show(&mut world, &input, "repl", &args, true);
    }

    Ok(())
}
