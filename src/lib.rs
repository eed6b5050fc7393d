//! # evm-absint: an abstract domain for EVM bytecode
//!
//! **`evm-absint`** provides the abstract values, the operand-stack window and the
//! per-instruction transfer function a fixpoint engine needs to analyze 256-bit
//! stack-machine bytecode. It is the domain layer only: disassembly, the
//! control-flow graph and the worklist live with the caller.
//!
//! ## Layers
//!
//! - **[`word`]**: [`Word256`][crate::word::Word256], a 256-bit unsigned integer with wrapping arithmetic.
//! - **[`value`]**: [`ArithmeticWord`][crate::value::ArithmeticWord], a flat lattice over words that also
//!   remembers whether an unknown value can still be a jump destination.
//! - **[`set`]**: [`BoundedWordSet`][crate::set::BoundedWordSet], sets of at most [`K`][crate::set::K] words.
//! - **[`memory`]**: [`AddressSpace`][crate::memory::AddressSpace], persistent maps used for memory and storage.
//! - **[`stack`]**: [`OperandStack`][crate::stack::OperandStack], a fixed-length window over the top of the stack.
//! - **[`state`]**: [`MachineState`][crate::state::MachineState] with `step`, `assume` and the lattice operations.
//!
//! Every domain type implements [`Lattice`][crate::lattice::Lattice], and every operation returns a
//! new value: states can be shared freely between analysis threads.
//!
//! ## Basic Usage
//!
//! ```rust
//! use evm_absint::config::Config;
//! use evm_absint::env::Environment;
//! use evm_absint::lattice::Lattice;
//! use evm_absint::opcode::{Instruction, Opcode};
//! use evm_absint::state::MachineState;
//! use evm_absint::word::Word256;
//!
//! let env = Environment::default();
//! let entry = MachineState::initial(&Config::default());
//!
//! // PUSH1 0 PUSH1 0x40 JUMPI: the condition is known to be zero.
//! let before = entry
//!     .step(&Instruction::push_word(0, Word256::from(0u64)), &env)
//!     .step(&Instruction::push_word(2, Word256::from(0x40u64)), &env);
//! let jumpi = Instruction::new(4, Opcode::JumpI);
//!
//! assert!(before.assume(&jumpi, true, &env).is_bottom());
//! assert_eq!(before.assume(&jumpi, false, &env), entry);
//! ```

pub mod bits;
pub mod cache;
pub mod config;
pub mod env;
pub mod error;
pub mod lattice;
pub mod memory;
pub mod opcode;
pub mod repr;
pub mod set;
pub mod stack;
pub mod state;
pub mod transfer;
pub mod utils;
pub mod value;
pub mod word;
