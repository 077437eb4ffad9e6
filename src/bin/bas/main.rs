//! Assembler and disassembler for blang VM bytecode.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blang::asm::{self, disassemble};
use blang::bytecode::file;
use blang::diagnostics::Diagnostics;
use blang::{print_error, print_info};
use clap::Parser as ClapParser;
use clap_cargo::style::CLAP_STYLING;

#[derive(Debug, ClapParser)]
#[command(about = "Assemble .bas sources into .bvm bytecode, or disassemble it", version, styles = CLAP_STYLING)]
struct Cli {
    /// Assembly source, or a .bvm file with `--disassemble`
    input: PathBuf,
    /// Where to write the bytecode (defaults to the input with a .bvm extension)
    #[arg(short, long, conflicts_with = "disassemble")]
    output: Option<PathBuf>,
    /// Print a listing of a .bvm file instead of assembling
    #[arg(short, long)]
    disassemble: bool,
    /// With `--disassemble`, print source that assembles back to the same bytes
    #[arg(long, requires = "disassemble")]
    source: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.disassemble {
        run_disassemble(&cli.input, cli.source)
    } else {
        let output = cli.output.unwrap_or_else(|| cli.input.with_extension("bvm"));
        run_assemble(&cli.input, &output)
    }
}

fn run_assemble(input: &Path, output: &Path) -> ExitCode {
    let src = match fs::read_to_string(input) {
        Ok(src) => src,
        Err(err) => {
            print_error!("cannot read {}: {err}", input.display());
            return ExitCode::FAILURE;
        }
    };
    let code = match asm::assemble(&src) {
        Ok(code) => code,
        Err(err) => {
            Diagnostics::from(err.to_diagnostic()).report(&src, &input.display().to_string());
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = file::write_file(output, &code) {
        print_error!("cannot write {}: {err}", output.display());
        return ExitCode::FAILURE;
    }
    print_info!("assembled {} -> {} ({} bytes)", input.display(), output.display(), code.len());
    ExitCode::SUCCESS
}

fn run_disassemble(input: &Path, source: bool) -> ExitCode {
    let code = match file::read_file(input) {
        Ok(code) => code,
        Err(err) => {
            print_error!("{}: {err}", input.display());
            return ExitCode::FAILURE;
        }
    };
    match disassemble(&code) {
        Ok(listing) if source => print!("{}", listing.to_source()),
        Ok(listing) => print!("{listing}"),
        Err(err) => {
            print_error!("{}: {err}", input.display());
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
