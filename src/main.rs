use std::fs;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "fabula")]
#[command(about = "Compile Fabula story markup into a playable document")]
struct Cli {
    /// Input story file
    input: PathBuf,

    /// Output document (defaults to input name with .html extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Host HTML template with a %%content%% placeholder
    #[arg(short, long, default_value = "template.html")]
    template: PathBuf,

    /// Skip whitespace minification of the merged document
    #[arg(long)]
    no_minify: bool,
}

fn main() {
    let cli = Cli::parse();

    // Read the story source
    let source = match fs::read_to_string(&cli.input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", cli.input.display(), e);
            std::process::exit(1);
        }
    };

    // A failed compile must never produce a document.
    let compiled = match fabula::compile(&source) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let template = match fs::read_to_string(&cli.template) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", cli.template.display(), e);
            std::process::exit(1);
        }
    };

    let merged = match fabula::merge_into_template(&template, &compiled) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let document = if cli.no_minify {
        merged
    } else {
        fabula::minify(&merged)
    };

    // Determine output path
    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("html"));

    if let Err(e) = fs::write(&output, document) {
        eprintln!("Error writing {}: {}", output.display(), e);
        std::process::exit(1);
    }

    println!("Created {}", output.display());
}
