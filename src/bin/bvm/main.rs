//! Runs assembled blang bytecode.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use blang::bytecode::Bytecode;
use blang::bytecode::file;
use blang::bytecode::opcode::Opcode;
use blang::vm::{DEFAULT_CYCLE_BUDGET, Register, Vm, VmOptions};
use blang::{print_error, print_info};
use clap::Parser as ClapParser;
use clap_cargo::style::CLAP_STYLING;

#[derive(Debug, ClapParser)]
#[command(about = "Run .bvm bytecode on the blang register VM", version, styles = CLAP_STYLING)]
struct Cli {
    /// Bytecode file produced by `bas`
    #[arg(required_unless_present = "demo")]
    program: Option<PathBuf>,
    /// Run the built-in demo instead: r0 = 3 + 2
    #[arg(long, conflicts_with = "program")]
    demo: bool,
    /// Stop after N cycles; 0 means no limit
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CYCLE_BUDGET)]
    cycles: u64,
    /// Log every instruction as it runs
    #[arg(long)]
    trace: bool,
    /// Print the registers once the program halts
    #[arg(long)]
    dump: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let code = match &cli.program {
        _ if cli.demo => demo_program(),
        Some(path) => match file::read_file(path) {
            Ok(code) => code,
            Err(err) => {
                print_error!("{}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => return ExitCode::FAILURE,
    };

    let options = VmOptions {
        cycle_budget: (cli.cycles != 0).then_some(cli.cycles),
        trace: cli.trace,
        ..VmOptions::default()
    };
    let mut vm = Vm::new(options);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = vm.run(&code, &mut out);
    let _ = out.flush();

    match result {
        Ok(halt) => {
            if cli.demo {
                print_info!("r0 = {}", vm.registers()[Register::R0]);
            }
            if cli.dump {
                print!("{}", vm.registers());
            }
            print_info!("halted after {} cycles", halt.cycles);
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_error!("{err}");
            if cli.dump {
                eprint!("{}", vm.registers());
            }
            ExitCode::FAILURE
        }
    }
}

/// `mov_ir r0, 3; mov_ir r1, 2; add_rr r0, r1; hlt`
fn demo_program() -> Bytecode {
    let mut code = Bytecode::new();
    for (reg, value) in [(Register::R0, 3), (Register::R1, 2)] {
        code.push_byte(Opcode::MovIr as u8);
        code.push_byte(reg as u8);
        code.push_qword(value);
    }
    code.push_byte(Opcode::AddRr as u8);
    code.push_byte(Register::R0 as u8);
    code.push_byte(Register::R1 as u8);
    code.push_byte(Opcode::Hlt as u8);
    code
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn demo_adds() {
    let mut vm = Vm::default();
    vm.run(&demo_program(), &mut io::sink()).unwrap();
    assert_eq!(vm.registers()[Register::R0], 5);
}
