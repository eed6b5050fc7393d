//! The abstract machine state and its transfer function.
//!
//! A [`MachineState`] is either `Bottom` (no concrete execution reaches this
//! point) or a live frame combining:
//!
//! - the [`OperandStack`] window,
//! - volatile memory, an [`AddressSpace`] keyed by byte offset of 32-byte words,
//! - persistent storage, an [`AddressSpace`] keyed by slot,
//! - the active memory size in 32-byte words (`msize`).
//!
//! States are values: [`step`](MachineState::step) and
//! [`assume`](MachineState::assume) return a fresh state and leave the
//! receiver untouched, so the fixpoint engine may keep old states around and
//! compare them by `==`.
//!
//! # Example
//!
//! ```
//! use evm_absint::config::Config;
//! use evm_absint::env::Environment;
//! use evm_absint::opcode::{Instruction, Opcode};
//! use evm_absint::set::BoundedWordSet;
//! use evm_absint::state::MachineState;
//! use evm_absint::word::Word256;
//!
//! let env = Environment::default();
//! let state = MachineState::initial(&Config::default())
//!     .step(&Instruction::push_word(0, Word256::from(5u64)), &env)
//!     .step(&Instruction::push_word(33, Word256::from(7u64)), &env)
//!     .step(&Instruction::new(66, Opcode::Add), &env);
//! assert_eq!(state.peek(1), BoundedWordSet::singleton(Word256::from(12u64)));
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::bits::WORD_BYTES;
use crate::config::Config;
use crate::env::Environment;
use crate::lattice::Lattice;
use crate::memory::AddressSpace;
use crate::opcode::{Instruction, Opcode};
use crate::set::BoundedWordSet;
use crate::stack::OperandStack;
use crate::transfer::{effect, Effect, Region};
use crate::value::ArithmeticWord;
use crate::word::Word256;

/// The components of a reachable state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub stack: OperandStack,
    pub memory: AddressSpace,
    pub storage: AddressSpace,
    /// Active memory size, in 32-byte words.
    pub msize: ArithmeticWord,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MachineState {
    Bottom,
    Live(Frame),
}

impl MachineState {
    /// The entry state: empty stack, zeroed memory, untouched storage.
    pub fn initial(config: &Config) -> Self {
        MachineState::Live(Frame {
            stack: OperandStack::new(config.window_size),
            memory: AddressSpace::default(),
            storage: AddressSpace::default(),
            msize: ArithmeticWord::zero(),
        })
    }

    /// Nothing known about any component.
    pub fn top(window_size: usize) -> Self {
        MachineState::Live(Frame {
            stack: OperandStack::top(window_size),
            memory: AddressSpace::top(),
            storage: AddressSpace::top(),
            msize: ArithmeticWord::Top,
        })
    }

    pub fn bottom() -> Self {
        MachineState::Bottom
    }

    /// Builds a state from its parts, collapsing to `Bottom` when any part
    /// shows the state is unreachable.
    pub fn from_frame(frame: Frame) -> Self {
        if frame.memory.is_bottom() || frame.storage.is_bottom() || frame.msize.is_bottom() || has_gap(&frame.stack) {
            return MachineState::Bottom;
        }
        MachineState::Live(frame)
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            MachineState::Bottom => None,
            MachineState::Live(frame) => Some(frame),
        }
    }

    pub fn stack(&self) -> Option<&OperandStack> {
        self.frame().map(|f| &f.stack)
    }

    pub fn memory(&self) -> Option<&AddressSpace> {
        self.frame().map(|f| &f.memory)
    }

    pub fn storage(&self) -> Option<&AddressSpace> {
        self.frame().map(|f| &f.storage)
    }

    pub fn msize(&self) -> ArithmeticWord {
        match self {
            MachineState::Bottom => ArithmeticWord::Bottom,
            MachineState::Live(frame) => frame.msize.clone(),
        }
    }

    /// The `n`-th stack element from the top (1-indexed); `Bottom` for an
    /// unreachable state.
    pub fn peek(&self, n: usize) -> BoundedWordSet {
        match self {
            MachineState::Bottom => BoundedWordSet::Bottom,
            MachineState::Live(frame) => frame.stack.peek(n),
        }
    }

    /// Candidate destinations of a `JUMP`/`JUMPI` executed in this state.
    pub fn jump_targets(&self) -> BoundedWordSet {
        self.peek(1)
    }

    /// Abstractly executes one instruction.
    ///
    /// An instruction whose operands are not all on the stack halts the
    /// concrete machine, so its successor is `Bottom`.
    pub fn step(&self, instruction: &Instruction, env: &Environment) -> Self {
        let MachineState::Live(frame) = self else {
            return MachineState::Bottom;
        };
        let effect = effect(instruction.opcode);
        if frame.stack.has_bottom_until(effect.inputs()) {
            log::debug!("{}: stack underflow, no successor", instruction);
            return MachineState::Bottom;
        }
        let next = frame.clone().apply(effect, instruction, env);
        log::debug!(
            "{}: {}",
            instruction,
            if next.is_bottom() { "unreachable" } else { "ok" }
        );
        next
    }

    /// Filters the state on one outcome of a conditional jump.
    ///
    /// Applied to the state before `JUMPI`: pops destination and condition,
    /// then returns `Bottom` if the condition rules out the requested branch,
    /// or if the branch is taken and no destination is a `JUMPDEST`. Any
    /// other instruction is simply stepped.
    pub fn assume(&self, instruction: &Instruction, taken: bool, env: &Environment) -> Self {
        if instruction.opcode != Opcode::JumpI {
            return self.step(instruction, env);
        }
        let MachineState::Live(frame) = self else {
            return MachineState::Bottom;
        };
        if frame.stack.has_bottom_until(2) {
            log::debug!("{}: stack underflow, no successor", instruction);
            return MachineState::Bottom;
        }
        let mut frame = frame.clone();
        let destination = frame.stack.pop();
        let condition = frame.stack.pop();
        let infeasible = if taken {
            condition.is_definitely_false() || !env.may_jump_to(&destination)
        } else {
            condition.is_definitely_true()
        };
        if infeasible {
            log::debug!(
                "{}: {} branch infeasible (condition {}, destination {})",
                instruction,
                branch_name(taken),
                condition,
                destination
            );
            return MachineState::Bottom;
        }
        MachineState::Live(frame)
    }
}

fn branch_name(taken: bool) -> &'static str {
    if taken {
        "taken"
    } else {
        "fall-through"
    }
}

/// A `Bottom` slot above a live one: no concrete stack has that shape.
fn has_gap(stack: &OperandStack) -> bool {
    stack.slots().skip_while(|s| s.is_bottom()).any(|s| s.is_bottom())
}

/// Whether two stacks cannot describe the same concrete stack: some slot is
/// known to be absent on one side and present on the other, or holds
/// disjoint values on both.
fn stacks_conflict(a: &OperandStack, b: &OperandStack) -> bool {
    a.slots().zip(b.slots()).any(|(x, y)| match (x, y) {
        (BoundedWordSet::Bottom, BoundedWordSet::Values(_)) | (BoundedWordSet::Values(_), BoundedWordSet::Bottom) => {
            true
        }
        (BoundedWordSet::Values(_), BoundedWordSet::Values(_)) => x.meet(y).is_bottom(),
        _ => false,
    })
}

/// Words of memory activated by an access of `len` bytes at `offset`.
fn words_needed(offset: &Word256, len: &Word256) -> Option<u64> {
    let len = len.to_u64()?;
    if len == 0 {
        return Some(0);
    }
    let end = offset.to_u64()?.checked_add(len)?.checked_add(WORD_BYTES as u64 - 1)?;
    Some(end / WORD_BYTES as u64)
}

fn max_words_needed(offsets: &BTreeSet<Word256>, lens: &BTreeSet<Word256>) -> Option<u64> {
    let mut max = 0;
    for offset in offsets {
        for len in lens {
            max = max.max(words_needed(offset, len)?);
        }
    }
    Some(max)
}

fn join_all<I: IntoIterator<Item = BoundedWordSet>>(values: I) -> BoundedWordSet {
    values.into_iter().fold(BoundedWordSet::Bottom, |acc, v| acc.join(&v))
}

fn constant(value: usize) -> BoundedWordSet {
    BoundedWordSet::singleton(Word256::from(value))
}

impl Frame {
    fn apply(mut self, effect: Effect, instruction: &Instruction, env: &Environment) -> MachineState {
        match effect {
            Effect::Nop => {}
            Effect::Unreachable => return MachineState::Bottom,
            Effect::Unary(f) => {
                let a = self.stack.pop();
                self.stack.push(f(&a));
            }
            Effect::Binary(f) => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(f(&a, &b));
            }
            Effect::Ternary(f) => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                let c = self.stack.pop();
                self.stack.push(f(&a, &b, &c));
            }
            Effect::PushImmediate => {
                let value = match (&instruction.immediate, instruction.opcode) {
                    (Some(w), _) => BoundedWordSet::singleton(w.clone()),
                    (None, Opcode::Push(0)) => BoundedWordSet::singleton(Word256::zero()),
                    (None, _) => {
                        log::debug!("{}: missing immediate", instruction);
                        BoundedWordSet::Top
                    }
                };
                self.stack.push(value);
            }
            Effect::PushPc => self.stack.push(constant(instruction.pc)),
            Effect::PushAddress => {
                let value = match env.address() {
                    Some(address) => BoundedWordSet::singleton(address.clone()),
                    None => BoundedWordSet::Top,
                };
                self.stack.push(value);
            }
            Effect::PushMsize => {
                let value = match &self.msize {
                    ArithmeticWord::Concrete(words) => {
                        BoundedWordSet::singleton(words.wrapping_mul(&Word256::from(WORD_BYTES)))
                    }
                    _ => BoundedWordSet::Top,
                };
                self.stack.push(value);
            }
            Effect::Dup(n) => self.stack.dup(n),
            Effect::Swap(n) => self.stack.swap(n),
            Effect::MLoad => self.mload(env),
            Effect::MStore => self.mstore(env, WORD_BYTES),
            Effect::MStore8 => self.mstore(env, 1),
            Effect::SLoad => self.sload(env),
            Effect::SStore => self.sstore(env),
            Effect::Jump => {
                let destination = self.stack.pop();
                if !env.may_jump_to(&destination) {
                    log::debug!("{}: no JUMPDEST among {}", instruction, destination);
                    return MachineState::Bottom;
                }
            }
            Effect::JumpI => {
                let destination = self.stack.pop();
                let condition = self.stack.pop();
                if condition.is_definitely_true() && !env.may_jump_to(&destination) {
                    log::debug!("{}: forced jump to non-JUMPDEST {}", instruction, destination);
                    return MachineState::Bottom;
                }
            }
            Effect::Opaque {
                pops,
                pushes,
                reads,
                writes,
            } => {
                let operands = self.stack.pop_n(pops);
                if let Some(Region { offset, len }) = reads {
                    self.touch(&operands[offset], &operands[len]);
                }
                if let Some(Region { offset, len }) = writes {
                    if env.config().track_memory {
                        self.forget(&operands[offset], &operands[len]);
                    }
                    self.touch(&operands[offset], &operands[len]);
                }
                for _ in 0..pushes {
                    self.stack.push(BoundedWordSet::Top);
                }
            }
        }
        MachineState::from_frame(self)
    }

    /// Grows `msize` to cover an access of `len` bytes at `offset`.
    fn touch(&mut self, offset: &BoundedWordSet, len: &BoundedWordSet) {
        if len.as_singleton().is_some_and(Word256::is_zero) {
            return;
        }
        let needed = match (offset.values(), len.values()) {
            (Some(offsets), Some(lens)) => max_words_needed(offsets, lens),
            _ => None,
        };
        self.msize = match (&self.msize, needed) {
            (ArithmeticWord::Bottom, _) => ArithmeticWord::Bottom,
            (ArithmeticWord::Concrete(current), Some(words)) => {
                ArithmeticWord::Concrete(current.clone().max(Word256::from(words)))
            }
            _ => ArithmeticWord::Top,
        };
    }

    /// Forgets every word overlapping a write of `len` bytes at `offset`.
    fn forget(&mut self, offset: &BoundedWordSet, len: &BoundedWordSet) {
        if len.as_singleton().is_some_and(Word256::is_zero) || self.memory.is_top() {
            return;
        }
        let len = len.as_singleton().and_then(Word256::to_usize);
        match (offset.values(), len) {
            (Some(offsets), Some(len)) => {
                for offset in offsets {
                    self.memory = self.memory.invalidate(offset, len);
                }
            }
            _ => {
                log::debug!("write of unknown extent, forgetting {} memory word(s)", self.memory.len());
                self.memory = AddressSpace::new(self.memory.default_value());
            }
        }
    }

    /// The word at a concrete offset. Memory past the active size is zero.
    fn memory_word(&self, offset: &Word256) -> BoundedWordSet {
        if let ArithmeticWord::Concrete(words) = &self.msize {
            if *offset >= words.wrapping_mul(&Word256::from(WORD_BYTES)) {
                return BoundedWordSet::singleton(Word256::zero());
            }
        }
        BoundedWordSet::from(self.memory.load(offset))
    }

    fn mload(&mut self, env: &Environment) {
        let offset = self.stack.pop();
        let value = if !env.config().track_memory {
            BoundedWordSet::Top
        } else if self.msize == ArithmeticWord::zero() {
            BoundedWordSet::singleton(Word256::zero())
        } else {
            match offset.values() {
                Some(offsets) => join_all(offsets.iter().map(|o| self.memory_word(o))),
                None => BoundedWordSet::Top,
            }
        };
        self.touch(&offset, &constant(WORD_BYTES));
        self.stack.push(value);
    }

    /// `MSTORE` for `width == 32`, `MSTORE8` for `width == 1`.
    ///
    /// A store at an unknown offset leaves memory as it is; only `msize` is
    /// advanced. A finite set of offsets forgets every candidate word.
    fn mstore(&mut self, env: &Environment, width: usize) {
        let offset = self.stack.pop();
        let value = self.stack.pop();
        if env.config().track_memory {
            match offset.values() {
                Some(offsets) if offsets.len() == 1 => {
                    for at in offsets {
                        let memory = self.memory.invalidate(at, width);
                        self.memory = if width == WORD_BYTES {
                            memory.store(at.clone(), ArithmeticWord::from(&value))
                        } else {
                            memory
                        };
                    }
                }
                Some(offsets) => {
                    for at in offsets {
                        self.memory = self.memory.invalidate(at, width);
                    }
                }
                None => log::debug!("store at unknown offset, memory left unchanged"),
            }
        }
        self.touch(&offset, &constant(width));
    }

    /// A slot read: recorded writes first, then the environment's storage
    /// source for slots never written on any path.
    fn storage_word(&self, key: &Word256, env: &Environment) -> BoundedWordSet {
        if self.storage.is_top() {
            return BoundedWordSet::Top;
        }
        if let Some(value) = self.storage.recorded(key) {
            return BoundedWordSet::from(value.clone());
        }
        match env.storage_value(key) {
            Some(value) => BoundedWordSet::singleton(value),
            None => BoundedWordSet::from(self.storage.default_value()),
        }
    }

    /// With storage tracking off, writes are not recorded, so a read cannot
    /// trust the source either.
    fn sload(&mut self, env: &Environment) {
        let key = self.stack.pop();
        let value = match key.values() {
            _ if !env.config().track_storage => BoundedWordSet::Top,
            Some(keys) => join_all(keys.iter().map(|k| self.storage_word(k, env))),
            None => BoundedWordSet::Top,
        };
        self.stack.push(value);
    }

    fn sstore(&mut self, env: &Environment) {
        let key = self.stack.pop();
        let value = ArithmeticWord::from(&self.stack.pop());
        if !env.config().track_storage {
            return;
        }
        self.storage = match key.values() {
            Some(keys) if keys.len() == 1 => keys
                .iter()
                .fold(self.storage.clone(), |storage, k| storage.store(k.clone(), value.clone())),
            // Weak update: each candidate slot may or may not be written.
            Some(keys) => keys.iter().fold(self.storage.clone(), |storage, k| {
                let merged = storage.load(k).join(&value);
                storage.store(k.clone(), merged)
            }),
            None => {
                log::debug!("SSTORE at unknown slot, storage lost");
                AddressSpace::top()
            }
        };
    }

    fn combine(
        &self,
        other: &Self,
        stack: impl Fn(&OperandStack, &OperandStack) -> OperandStack,
        space: impl Fn(&AddressSpace, &AddressSpace) -> AddressSpace,
        word: impl Fn(&ArithmeticWord, &ArithmeticWord) -> ArithmeticWord,
    ) -> MachineState {
        MachineState::from_frame(Frame {
            stack: stack(&self.stack, &other.stack),
            memory: space(&self.memory, &other.memory),
            storage: space(&self.storage, &other.storage),
            msize: word(&self.msize, &other.msize),
        })
    }
}

impl Lattice for MachineState {
    fn is_bottom(&self) -> bool {
        matches!(self, MachineState::Bottom)
    }

    fn is_top(&self) -> bool {
        match self {
            MachineState::Bottom => false,
            MachineState::Live(f) => f.stack.is_top() && f.memory.is_top() && f.storage.is_top() && f.msize.is_top(),
        }
    }

    fn le(&self, other: &Self) -> bool {
        match (self, other) {
            (MachineState::Bottom, _) => true,
            (_, MachineState::Bottom) => false,
            (MachineState::Live(a), MachineState::Live(b)) => {
                a.stack.le(&b.stack) && a.memory.le(&b.memory) && a.storage.le(&b.storage) && a.msize.le(&b.msize)
            }
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (MachineState::Bottom, x) | (x, MachineState::Bottom) => x.clone(),
            (MachineState::Live(a), MachineState::Live(b)) => {
                a.combine(b, OperandStack::join, AddressSpace::join, ArithmeticWord::join)
            }
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (MachineState::Bottom, _) | (_, MachineState::Bottom) => MachineState::Bottom,
            (MachineState::Live(a), MachineState::Live(b)) if stacks_conflict(&a.stack, &b.stack) => {
                MachineState::Bottom
            }
            (MachineState::Live(a), MachineState::Live(b)) => {
                a.combine(b, OperandStack::meet, AddressSpace::meet, ArithmeticWord::meet)
            }
        }
    }

    fn widen(&self, other: &Self) -> Self {
        match (self, other) {
            (MachineState::Bottom, x) | (x, MachineState::Bottom) => x.clone(),
            (MachineState::Live(a), MachineState::Live(b)) => {
                a.combine(b, OperandStack::widen, AddressSpace::widen, ArithmeticWord::widen)
            }
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineState::Bottom => write!(f, "⊥"),
            MachineState::Live(frame) => write!(
                f,
                "stack: {}, msize: {}, memory: {}, storage: {}",
                frame.stack, frame.msize, frame.memory, frame.storage
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StripedCache;
    use crate::error::Result;
    use crate::env::StorageSource;
    use crate::lattice::tests::check_lattice_axioms;
    use std::sync::Arc;
    use test_log::test;

    const W: usize = 8;

    fn s(v: u64) -> BoundedWordSet {
        BoundedWordSet::singleton(Word256::from(v))
    }

    fn push(v: u64) -> Instruction {
        Instruction::push_word(0, Word256::from(v))
    }

    fn op(opcode: Opcode) -> Instruction {
        Instruction::new(0, opcode)
    }

    fn start() -> MachineState {
        MachineState::initial(&Config::with_window_size(W).unwrap())
    }

    fn run(state: MachineState, code: &[Instruction], env: &Environment) -> MachineState {
        code.iter().fold(state, |state, ins| state.step(ins, env))
    }

    fn exec(code: &[Instruction]) -> MachineState {
        run(start(), code, &Environment::default())
    }

    #[test]
    fn test_push_add() {
        let state = exec(&[push(5), push(7), op(Opcode::Add)]);
        assert_eq!(state.peek(1), s(12));
        assert_eq!(state.stack().map(|s| s.size()), Some(1));
    }

    #[test]
    fn test_shift_exactness() {
        let state = exec(&[push(1), push(1), op(Opcode::Shl)]);
        assert_eq!(state.peek(1), s(2));
        let state = run(state, &[push(1), op(Opcode::Shr)], &Environment::default());
        assert_eq!(state.peek(1), s(1));
    }

    #[test]
    fn test_operand_order_through_step() {
        let state = exec(&[push(3), push(10), op(Opcode::Sub)]);
        assert_eq!(state.peek(1), s(7));
    }

    #[test]
    fn test_unreachable_branch() {
        let env = Environment::default();
        let before = exec(&[push(0), push(42)]);
        let jumpi = op(Opcode::JumpI);
        assert_eq!(before.assume(&jumpi, true, &env), MachineState::Bottom);
        assert_eq!(before.assume(&jumpi, false, &env), start());
    }

    #[test]
    fn test_known_true_condition() {
        let env = Environment::default();
        let before = exec(&[push(1), push(42)]);
        let jumpi = op(Opcode::JumpI);
        assert_eq!(before.assume(&jumpi, false, &env), MachineState::Bottom);
        assert_eq!(before.assume(&jumpi, true, &env), start());
    }

    #[test]
    fn test_unknown_condition_keeps_both() {
        let env = Environment::default();
        let before = exec(&[op(Opcode::CallValue), push(42)]);
        let jumpi = op(Opcode::JumpI);
        assert!(!before.assume(&jumpi, true, &env).is_bottom());
        assert!(!before.assume(&jumpi, false, &env).is_bottom());
        assert_eq!(before.assume(&jumpi, true, &env), before.step(&jumpi, &env));
    }

    #[test]
    fn test_jump_targets() {
        let state = exec(&[push(0x40)]);
        assert_eq!(state.jump_targets(), s(0x40));
        assert!(MachineState::Bottom.jump_targets().is_bottom());
    }

    #[test]
    fn test_bottom_absorbs() {
        let env = Environment::default();
        assert!(MachineState::Bottom.step(&push(1), &env).is_bottom());
        assert!(MachineState::Bottom.assume(&op(Opcode::JumpI), true, &env).is_bottom());
    }

    #[test]
    fn test_underflow_is_bottom() {
        assert!(exec(&[op(Opcode::Add)]).is_bottom());
        assert!(exec(&[push(1), op(Opcode::Swap(1))]).is_bottom());
        assert!(exec(&[op(Opcode::Dup(1))]).is_bottom());
    }

    #[test]
    fn test_invalid_is_bottom() {
        assert!(exec(&[op(Opcode::Invalid)]).is_bottom());
    }

    #[test]
    fn test_halting_returns_post_pop_state() {
        let state = exec(&[push(0), push(0), op(Opcode::Return)]);
        assert_eq!(state.stack().map(|s| s.size()), Some(0));
        assert!(!state.is_bottom());
    }

    #[test]
    fn test_top_state_shape() {
        let env = Environment::default();
        let top = MachineState::top(W);
        assert!(top.is_top());
        let after = top.step(&push(3), &env);
        assert_eq!(after.peek(1), s(3));
        let after = top.step(&op(Opcode::Dup(2)), &env);
        assert!(after.is_top());
    }

    #[test]
    fn test_push_variants() {
        let env = Environment::default().with_address(Word256::from(0xAAu64));
        let state = run(
            start(),
            &[op(Opcode::Push(0)), Instruction::new(7, Opcode::Pc), op(Opcode::Address)],
            &env,
        );
        assert_eq!(state.peek(3), s(0));
        assert_eq!(state.peek(2), s(7));
        assert_eq!(state.peek(1), s(0xAA));
        assert_eq!(exec(&[op(Opcode::Address)]).peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_memory_round_trip() {
        let state = exec(&[
            push(42),
            push(64),
            op(Opcode::MStore),
            push(64),
            op(Opcode::MLoad),
            op(Opcode::MSize),
        ]);
        assert_eq!(state.peek(2), s(42));
        assert_eq!(state.peek(1), s(96));
        assert_eq!(state.msize(), ArithmeticWord::from(3u64));
    }

    #[test]
    fn test_fresh_memory_reads_zero() {
        let state = exec(&[push(1000), op(Opcode::MLoad)]);
        assert_eq!(state.peek(1), s(0));
        let state = exec(&[op(Opcode::CallValue), op(Opcode::MLoad)]);
        assert_eq!(state.peek(1), s(0));
        assert_eq!(state.msize(), ArithmeticWord::Top);
    }

    #[test]
    fn test_memory_past_active_size_reads_zero() {
        let state = exec(&[
            op(Opcode::CallValue),
            push(0),
            op(Opcode::MStore),
            push(32),
            op(Opcode::MLoad),
            push(0),
            op(Opcode::MLoad),
        ]);
        assert_eq!(state.peek(2), s(0));
        assert_eq!(state.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_mstore8_invalidates() {
        let state = exec(&[
            push(42),
            push(0),
            op(Opcode::MStore),
            push(0xFF),
            push(5),
            op(Opcode::MStore8),
            push(0),
            op(Opcode::MLoad),
        ]);
        assert_eq!(state.peek(1), BoundedWordSet::Top);
        assert_eq!(state.msize(), ArithmeticWord::from(1u64));
    }

    #[test]
    fn test_unknown_offset_store() {
        let state = exec(&[
            push(1),
            push(0),
            op(Opcode::MStore),
            push(7),
            op(Opcode::Caller),
            op(Opcode::MStore),
            push(0),
            op(Opcode::MLoad),
            op(Opcode::MSize),
        ]);
        // Memory is left unchanged, msize is no longer known.
        assert_eq!(state.peek(2), s(1));
        assert_eq!(state.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_memory_tracking_off() {
        let config = Config {
            track_memory: false,
            ..Config::default()
        };
        let env = Environment::new(config.clone()).unwrap();
        let state = run(
            MachineState::initial(&config),
            &[push(1), push(0), op(Opcode::MStore), push(0), op(Opcode::MLoad)],
            &env,
        );
        assert_eq!(state.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_copy_forgets_region() {
        let state = exec(&[
            push(1),
            push(0),
            op(Opcode::MStore),
            push(2),
            push(64),
            op(Opcode::MStore),
            // CALLDATACOPY(dest = 40, offset = 0, len = 4)
            push(4),
            push(0),
            push(40),
            op(Opcode::CallDataCopy),
            push(0),
            op(Opcode::MLoad),
            push(64),
            op(Opcode::MLoad),
        ]);
        assert_eq!(state.peek(2), s(1));
        assert_eq!(state.peek(1), s(2));

        let state = exec(&[
            push(1),
            push(0),
            op(Opcode::MStore),
            op(Opcode::CallDataSize),
            push(0),
            push(0),
            op(Opcode::CallDataCopy),
            push(0),
            op(Opcode::MLoad),
        ]);
        assert_eq!(state.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_zero_length_read_does_not_grow() {
        let state = exec(&[push(0), push(1000), op(Opcode::Return)]);
        assert_eq!(state.msize(), ArithmeticWord::zero());
        let state = exec(&[push(1), push(1000), op(Opcode::Revert)]);
        assert_eq!(state.msize(), ArithmeticWord::from(32u64));
    }

    /// Slot `k` holds `k * 10`.
    struct Slots;

    impl StorageSource for Slots {
        fn load(&self, _address: &Word256, key: &Word256) -> Result<Word256> {
            Ok(key.wrapping_mul(&Word256::from(10u64)))
        }
    }

    fn storage_env() -> Environment {
        Environment::default()
            .with_address(Word256::from(1u64))
            .with_storage(Arc::new(Slots), Arc::new(StripedCache::new(1, 4)))
    }

    #[test]
    fn test_storage_round_trip() {
        let state = exec(&[push(9), push(3), op(Opcode::SStore), push(3), op(Opcode::SLoad)]);
        assert_eq!(state.peek(1), s(9));
        assert_eq!(exec(&[push(3), op(Opcode::SLoad)]).peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_storage_source() {
        let env = storage_env();
        let state = run(start(), &[push(4), op(Opcode::SLoad)], &env);
        assert_eq!(state.peek(1), s(40));

        // A slot written with an unknown value no longer reads from the source.
        let state = run(
            start(),
            &[op(Opcode::Caller), push(4), op(Opcode::SStore), push(4), op(Opcode::SLoad)],
            &env,
        );
        assert_eq!(state.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_storage_unknown_key() {
        let env = storage_env();
        let state = run(
            start(),
            &[push(1), op(Opcode::Caller), op(Opcode::SStore), push(4), op(Opcode::SLoad)],
            &env,
        );
        assert_eq!(state.peek(1), BoundedWordSet::Top);
        assert_eq!(state.storage(), Some(&AddressSpace::Top));
    }

    #[test]
    fn test_storage_tracking_off() {
        let config = Config {
            track_storage: false,
            ..Config::default()
        };
        let env = Environment::new(config.clone())
            .unwrap()
            .with_address(Word256::from(1u64))
            .with_storage(Arc::new(Slots), Arc::new(StripedCache::new(1, 4)));
        // The write is not recorded, so the source's 40 would be stale.
        let state = run(
            MachineState::initial(&config),
            &[push(9), push(4), op(Opcode::SStore), push(4), op(Opcode::SLoad)],
            &env,
        );
        assert_eq!(state.peek(1), BoundedWordSet::Top);
        let state = run(MachineState::initial(&config), &[push(4), op(Opcode::SLoad)], &env);
        assert_eq!(state.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_jump_to_non_jumpdest() {
        let env = Environment::default().with_jumpdests([Word256::from(0x20u64)]);
        assert!(run(start(), &[push(0x21), op(Opcode::Jump)], &env).is_bottom());
        assert!(!run(start(), &[push(0x20), op(Opcode::Jump)], &env).is_bottom());
        assert!(!run(start(), &[op(Opcode::CallValue), op(Opcode::Jump)], &env).is_bottom());
        // Without a JUMPDEST set every destination is accepted.
        assert!(!exec(&[push(0x21), op(Opcode::Jump)]).is_bottom());

        let jumpi = op(Opcode::JumpI);
        let forced = run(start(), &[push(1), push(0x21)], &env);
        assert!(forced.step(&jumpi, &env).is_bottom());
        assert!(forced.assume(&jumpi, true, &env).is_bottom());

        let unknown = run(start(), &[op(Opcode::CallValue), push(0x21)], &env);
        assert!(unknown.assume(&jumpi, true, &env).is_bottom());
        assert_eq!(unknown.assume(&jumpi, false, &env), start());
        assert_eq!(unknown.step(&jumpi, &env), start());

        let valid = run(start(), &[op(Opcode::CallValue), push(0x20)], &env);
        assert_eq!(valid.assume(&jumpi, true, &env), start());
    }

    #[test]
    fn test_unassigned_opcodes_have_no_successor() {
        let state = exec(&[push(1), push(2)]);
        let env = Environment::default();
        for opcode in [Opcode::Dup(0), Opcode::Dup(17), Opcode::Swap(0), Opcode::Swap(17), Opcode::Push(33), Opcode::Log(5)] {
            assert!(state.step(&op(opcode), &env).is_bottom(), "{:?}", opcode);
        }
        assert!(MachineState::top(W).step(&op(Opcode::Dup(0)), &env).is_bottom());
    }

    #[test]
    fn test_join_keeps_written_slots() {
        let env = storage_env();
        let a = run(start(), &[push(5), push(4), op(Opcode::SStore)], &env);
        let b = start();
        let joined = a.join(&b);
        let state = joined.step(&push(4), &env).step(&op(Opcode::SLoad), &env);
        assert_eq!(state.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_join_and_sets() {
        let a = exec(&[push(1)]);
        let b = exec(&[push(2)]);
        let j = a.join(&b);
        assert_eq!(j.peek(1), BoundedWordSet::from_values([Word256::from(1u64), Word256::from(2u64)]));
        assert!(a.le(&j));
        assert!(b.le(&j));
        assert!(!j.le(&a));
    }

    #[test]
    fn test_meet_gap_is_bottom() {
        let one = exec(&[push(1)]);
        let two = exec(&[push(1), push(2)]);
        // Slot below the top is Bottom on one side and {1} on the other, and
        // the tops disagree.
        assert!(one.meet(&two).is_bottom());
        assert_eq!(one.meet(&one), one);
    }

    #[test]
    fn test_widening_terminates() {
        let env = Environment::default();
        let body = [push(1), op(Opcode::Add)];
        let mut head = exec(&[push(0)]);
        let mut rounds = 0;
        loop {
            let next = head.widen(&run(head.clone(), &body, &env));
            if next == head {
                break;
            }
            head = next;
            rounds += 1;
            assert!(rounds < 10, "widening did not stabilize: {}", head);
        }
        assert_eq!(head.peek(1), BoundedWordSet::Top);
        assert_eq!(head.widen(&head), head);
    }

    #[test]
    fn test_lattice_axioms() {
        let samples = vec![
            MachineState::Bottom,
            start(),
            exec(&[push(1)]),
            exec(&[push(2)]),
            exec(&[push(1), push(2)]),
            exec(&[push(1), push(0), op(Opcode::MStore)]),
            exec(&[push(7), push(0), op(Opcode::SStore)]),
            MachineState::top(W),
        ];
        check_lattice_axioms(&MachineState::Bottom, &MachineState::top(W), &samples);
    }

    #[test]
    fn test_display() {
        assert_eq!(MachineState::Bottom.to_string(), "⊥");
        let text = exec(&[push(1)]).to_string();
        assert!(text.starts_with("stack: [{1}]"), "{}", text);
    }
}
