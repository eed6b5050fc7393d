//! Per-opcode transfer functions.
//!
//! [`effect`] maps each opcode to an [`Effect`]: a value describing how many
//! operands the instruction consumes, what it computes from them, and what
//! else it touches. The match is exhaustive, so adding an opcode without a
//! transfer function is a compile error. [`MachineState::step`] interprets
//! the effect.
//!
//! Operand positions are counted from the top of the stack: operand 0 is the
//! topmost value popped.
//!
//! [`MachineState::step`]: crate::state::MachineState::step

use crate::opcode::Opcode;
use crate::set::BoundedWordSet;

pub type UnaryOp = fn(&BoundedWordSet) -> BoundedWordSet;
pub type BinaryOp = fn(&BoundedWordSet, &BoundedWordSet) -> BoundedWordSet;
pub type TernaryOp = fn(&BoundedWordSet, &BoundedWordSet, &BoundedWordSet) -> BoundedWordSet;

/// A memory range given by two operand positions: offset and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

const fn region(offset: usize, len: usize) -> Option<Region> {
    Some(Region { offset, len })
}

/// What executing an opcode does to the abstract state.
#[derive(Debug, Clone, Copy)]
pub enum Effect {
    /// No stack or memory change (`JUMPDEST`).
    Nop,
    /// No successor state (`INVALID`).
    Unreachable,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Ternary(TernaryOp),
    /// Pushes the instruction's immediate.
    PushImmediate,
    /// Pushes the instruction's own program counter.
    PushPc,
    /// Pushes the executing contract's address, when known.
    PushAddress,
    /// Pushes the active memory size in bytes.
    PushMsize,
    Dup(usize),
    Swap(usize),
    MLoad,
    MStore,
    MStore8,
    SLoad,
    SStore,
    /// Pops the destination; no successor if it cannot be a `JUMPDEST`.
    Jump,
    /// Pops the destination and the condition.
    JumpI,
    /// Pops `pops` operands and pushes `pushes` unknown values.
    ///
    /// `reads` and `writes` name the memory ranges accessed: reads only grow
    /// the active memory size, writes also forget overlapping words.
    Opaque {
        pops: usize,
        pushes: usize,
        reads: Option<Region>,
        writes: Option<Region>,
    },
}

impl Effect {
    const fn opaque(pops: usize, pushes: usize) -> Self {
        Effect::Opaque {
            pops,
            pushes,
            reads: None,
            writes: None,
        }
    }

    const fn reading(pops: usize, pushes: usize, reads: Option<Region>) -> Self {
        Effect::Opaque {
            pops,
            pushes,
            reads,
            writes: None,
        }
    }

    /// Number of stack positions that must be populated for the opcode to execute.
    pub fn inputs(&self) -> usize {
        match *self {
            Effect::Nop
            | Effect::Unreachable
            | Effect::PushImmediate
            | Effect::PushPc
            | Effect::PushAddress
            | Effect::PushMsize => 0,
            Effect::Unary(_) | Effect::MLoad | Effect::SLoad | Effect::Jump => 1,
            Effect::Binary(_) | Effect::MStore | Effect::MStore8 | Effect::SStore | Effect::JumpI => 2,
            Effect::Ternary(_) => 3,
            Effect::Dup(n) => n,
            Effect::Swap(n) => n + 1,
            Effect::Opaque { pops, .. } => pops,
        }
    }
}

/// The transfer function of `opcode`.
///
/// Family members without a byte encoding, such as `Dup(0)` or `Push(33)`,
/// have no successor.
pub fn effect(opcode: Opcode) -> Effect {
    use Opcode::*;
    if !opcode.is_assigned() {
        return Effect::Unreachable;
    }
    match opcode {
        Stop => Effect::opaque(0, 0),
        Add => Effect::Binary(BoundedWordSet::sum),
        Mul => Effect::Binary(BoundedWordSet::mul),
        Sub => Effect::Binary(BoundedWordSet::sub),
        Div => Effect::Binary(BoundedWordSet::div),
        SDiv => Effect::Binary(BoundedWordSet::sdiv),
        Mod => Effect::Binary(BoundedWordSet::rem),
        SMod => Effect::Binary(BoundedWordSet::smod),
        AddMod => Effect::Ternary(BoundedWordSet::addmod),
        MulMod => Effect::Ternary(BoundedWordSet::mulmod),
        Exp => Effect::Binary(BoundedWordSet::exp),
        SignExtend => Effect::Binary(|byte, value| value.signextend(byte)),
        Lt => Effect::Binary(BoundedWordSet::lt),
        Gt => Effect::Binary(BoundedWordSet::gt),
        SLt => Effect::Binary(BoundedWordSet::slt),
        SGt => Effect::Binary(BoundedWordSet::sgt),
        Eq => Effect::Binary(BoundedWordSet::equal),
        IsZero => Effect::Unary(BoundedWordSet::iszero),
        And => Effect::Binary(BoundedWordSet::and),
        Or => Effect::Binary(BoundedWordSet::or),
        Xor => Effect::Binary(BoundedWordSet::xor),
        Not => Effect::Unary(BoundedWordSet::not),
        Byte => Effect::Binary(|index, value| value.byte(index)),
        Shl => Effect::Binary(|shift, value| value.shl(shift)),
        Shr => Effect::Binary(|shift, value| value.shr(shift)),
        Sar => Effect::Binary(|shift, value| value.sar(shift)),
        Keccak256 => Effect::reading(2, 1, region(0, 1)),

        Address => Effect::PushAddress,
        Balance | CallDataLoad | ExtCodeSize | ExtCodeHash | BlockHash | BlobHash => Effect::opaque(1, 1),
        Origin | Caller | CallValue | CallDataSize | CodeSize | GasPrice | ReturnDataSize | Coinbase | Timestamp
        | Number | PrevRandao | GasLimit | ChainId | SelfBalance | BaseFee | BlobBaseFee | Gas => Effect::opaque(0, 1),
        CallDataCopy | CodeCopy | ReturnDataCopy => Effect::Opaque {
            pops: 3,
            pushes: 0,
            reads: None,
            writes: region(0, 2),
        },
        ExtCodeCopy => Effect::Opaque {
            pops: 4,
            pushes: 0,
            reads: None,
            writes: region(1, 3),
        },

        Pop => Effect::opaque(1, 0),
        MLoad => Effect::MLoad,
        MStore => Effect::MStore,
        MStore8 => Effect::MStore8,
        SLoad => Effect::SLoad,
        SStore => Effect::SStore,
        Jump => Effect::Jump,
        JumpI => Effect::JumpI,
        Pc => Effect::PushPc,
        MSize => Effect::PushMsize,
        JumpDest => Effect::Nop,
        TLoad => Effect::opaque(1, 1),
        TStore => Effect::opaque(2, 0),
        MCopy => Effect::Opaque {
            pops: 3,
            pushes: 0,
            reads: region(1, 2),
            writes: region(0, 2),
        },

        Push(_) => Effect::PushImmediate,
        Dup(n) => Effect::Dup(n as usize),
        Swap(n) => Effect::Swap(n as usize),
        Log(n) => Effect::reading(2 + n as usize, 0, region(0, 1)),

        Create => Effect::reading(3, 1, region(1, 2)),
        Create2 => Effect::reading(4, 1, region(1, 2)),
        Call | CallCode => Effect::Opaque {
            pops: 7,
            pushes: 1,
            reads: region(3, 4),
            writes: region(5, 6),
        },
        DelegateCall | StaticCall => Effect::Opaque {
            pops: 6,
            pushes: 1,
            reads: region(2, 3),
            writes: region(4, 5),
        },
        Return | Revert => Effect::reading(2, 0, region(0, 1)),
        Invalid => Effect::Unreachable,
        SelfDestruct => Effect::opaque(1, 0),
    }
}
