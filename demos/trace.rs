//! Straight-line abstract trace of a bytecode snippet.
//!
//! Decodes the hex bytecode linearly, steps every instruction from the entry
//! state and prints the resulting stack. Control flow is not followed: a
//! `JUMPI` is stepped without filtering on its condition, and the trace
//! stops at the first unreachable state (including a jump whose destination
//! is not a `JUMPDEST` of the snippet).
//!
//! Run with:
//! ```bash
//! cargo run --example trace -- 6005600701600052
//! ```

use clap::Parser;
use color_eyre::eyre::eyre;
use evm_absint::config::Config;
use evm_absint::env::Environment;
use evm_absint::lattice::Lattice;
use evm_absint::opcode::{Instruction, Opcode};
use evm_absint::repr::ToRepresentation;
use evm_absint::state::MachineState;
use evm_absint::word::Word256;
use log::info;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

#[derive(Debug, Parser)]
#[command(author, version, about = "Abstract trace of EVM bytecode")]
struct Cli {
    /// Bytecode as hex, with or without a 0x prefix
    code: String,

    /// Number of tracked stack slots
    #[arg(long, default_value = "16")]
    window: usize,

    /// Address of the analyzed contract
    #[arg(long)]
    address: Option<u64>,

    /// Print the full state after every instruction
    #[arg(long)]
    full: bool,

    /// Log transfer-function decisions
    #[arg(short, long)]
    verbose: bool,
}

fn parse_hex(code: &str) -> color_eyre::Result<Vec<u8>> {
    let code = code.trim().trim_start_matches("0x");
    if code.len() % 2 != 0 {
        return Err(eyre!("odd number of hex digits"));
    }
    code.as_bytes()
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| eyre!("bad hex at {}", 2 * i))
        })
        .collect()
}

/// Linear sweep; a truncated trailing push is padded with zeros.
fn decode(bytes: &[u8]) -> color_eyre::Result<Vec<Instruction>> {
    let mut code = Vec::new();
    let mut pc = 0;
    while pc < bytes.len() {
        let opcode = Opcode::try_from(bytes[pc]).unwrap_or(Opcode::Invalid);
        let ins = match opcode.immediate_size() {
            0 => Instruction::new(pc, opcode),
            n => {
                let end = (pc + 1 + n).min(bytes.len());
                let mut imm = bytes[pc + 1..end].to_vec();
                imm.resize(n, 0);
                Instruction::push(pc, &imm)?
            }
        };
        pc += ins.size();
        code.push(ins);
    }
    Ok(code)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    TermLogger::init(
        if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info },
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let config = Config::with_window_size(cli.window)?;
    let mut env = Environment::new(config.clone())?;
    if let Some(address) = cli.address {
        env = env.with_address(Word256::from(address));
    }

    let code = decode(&parse_hex(&cli.code)?)?;
    info!("decoded {} instructions", code.len());
    let env = env.with_jumpdests(
        code.iter()
            .filter(|ins| ins.opcode == Opcode::JumpDest)
            .map(|ins| Word256::from(ins.pc)),
    );

    let mut state = MachineState::initial(&config);
    for ins in &code {
        state = state.step(ins, &env);
        if state.is_bottom() {
            println!("{:<24} unreachable", ins.to_string());
            break;
        }
        if cli.full {
            println!("{:<24} {}", ins.to_string(), state.representation());
        } else if let Some(stack) = state.stack() {
            println!("{:<24} {}", ins.to_string(), stack);
        }
    }
    Ok(())
}
