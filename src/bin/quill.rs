//! Command-line interface for quill
//! Compiles a template and prints the output, or dumps its AST.
//!
//! Usage:
//!   quill `<template>` [--vars `<file>`] [--dir `<dir>`] [--config `<file>`] [--ast]
//!
//! `<template>` is a file path. Views it extends or includes are looked up by file stem in
//! `--dir` (default: the template's own directory). Set `RUST_LOG` to see what the compiler does.

use clap::{Arg, ArgAction, Command};
use quill::quill::config::Loader;
use quill::quill::formats::to_treeviz_str;
use quill::quill::{Compiler, Lexer, MemoryViewFactory, Parser, QuillConfig, Vars, View};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let matches = Command::new("quill")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile view templates")
        .arg(
            Arg::new("template")
                .help("Path to the template to compile")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("vars")
                .long("vars")
                .help("JSON file with the variables to compile with"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .help("Directory holding the views the template extends or includes"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML file layered over the built-in configuration"),
        )
        .arg(
            Arg::new("ast")
                .long("ast")
                .help("Print the parsed AST instead of compiling")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let template = PathBuf::from(matches.get_one::<String>("template").unwrap());
    let config = load_config(matches.get_one::<String>("config"));
    let view = load_view(&template, matches.get_one::<String>("vars"), &config);

    if matches.get_flag("ast") {
        handle_ast_command(&view);
    } else {
        let dir = matches
            .get_one::<String>("dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| template_dir(&template));
        handle_compile_command(&view, &dir, &config);
    }
}

fn load_config(path: Option<&String>) -> QuillConfig {
    let loader = match path {
        Some(path) => Loader::new().with_file(path),
        None => Loader::new(),
    };
    loader.build().unwrap_or_else(|e| fail("Error loading configuration", e))
}

fn load_view(template: &Path, vars: Option<&String>, config: &QuillConfig) -> View {
    let contents =
        std::fs::read_to_string(template).unwrap_or_else(|e| fail("Error reading template", e));
    let name = template
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let mut view =
        View::new(name, contents).with_delimiters(config.delimiters.to_delimiters());

    if let Some(path) = vars {
        let source =
            std::fs::read_to_string(path).unwrap_or_else(|e| fail("Error reading variables", e));
        let vars: Vars =
            serde_json::from_str(&source).unwrap_or_else(|e| fail("Error parsing variables", e));
        view.set_vars(vars);
    }
    view
}

fn template_dir(template: &Path) -> PathBuf {
    match template.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Print the AST of the template
fn handle_ast_command(view: &View) {
    let tokens = Lexer::for_view(view)
        .and_then(|lexer| lexer.lex(view.contents()))
        .unwrap_or_else(|e| fail("Lex error", e));
    let ast = Parser::new()
        .parse(&tokens)
        .unwrap_or_else(|e| fail("Parse error", e));
    print!("{}", to_treeviz_str(&ast));
}

/// Compile the template and print the output
fn handle_compile_command(view: &View, dir: &Path, config: &QuillConfig) {
    let factory = MemoryViewFactory::new().with_delimiters(config.delimiters.to_delimiters());
    factory
        .load_dir(dir)
        .unwrap_or_else(|e| fail("Error loading views", e));

    let compiler = Compiler::from_config(config, Arc::new(factory));
    let output = compiler
        .compile(view)
        .unwrap_or_else(|e| fail("Compile error", e));
    println!("{}", output);
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, error);
    std::process::exit(1);
}
