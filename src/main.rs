#![allow(missing_docs)]

use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser)]
#[command(name = "blendlink", about = "Read .blend files into the program's own struct layouts")]
struct Cli {
	/// Print debug diagnostics on stderr.
	#[arg(long, short, global = true)]
	verbose: bool,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Header and chunk census.
	Info(cmd::info::Args),
	/// Schema tables and flattened struct layouts.
	Dna(cmd::dna::Args),
	/// Link a file against a reference schema and report drift.
	Link(cmd::link::Args),
	/// Link a file and write it back in the reference layout.
	Reflect(cmd::reflect::Args),
}

fn main() {
	let cli = Cli::parse();
	let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
	tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(level).init();

	if let Err(err) = run(cli.command) {
		eprintln!("error ({}): {err}", err.status().as_str());
		std::process::exit(1);
	}
}

fn run(command: Commands) -> blendlink::blend::Result<()> {
	match command {
		Commands::Info(args) => cmd::info::run(args),
		Commands::Dna(args) => cmd::dna::run(args),
		Commands::Link(args) => cmd::link::run(args),
		Commands::Reflect(args) => cmd::reflect::run(args),
	}
}
