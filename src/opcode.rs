//! Opcodes and decoded instructions.
//!
//! Decoding bytecode into instructions is the caller's job; this module only
//! names the opcodes and carries the decoded immediate.

use std::fmt;

use crate::error::{DomainError, Result};
use crate::word::Word256;

/// Every assigned opcode up to the Cancun fork.
///
/// Families are parameterized: `Push(0)` is `PUSH0`, `Dup(1)` is `DUP1`,
/// `Swap(1)` is `SWAP1`, `Log(0)` is `LOG0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    SDiv,
    Mod,
    SMod,
    AddMod,
    MulMod,
    Exp,
    SignExtend,
    Lt,
    Gt,
    SLt,
    SGt,
    Eq,
    IsZero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Shl,
    Shr,
    Sar,
    Keccak256,
    Address,
    Balance,
    Origin,
    Caller,
    CallValue,
    CallDataLoad,
    CallDataSize,
    CallDataCopy,
    CodeSize,
    CodeCopy,
    GasPrice,
    ExtCodeSize,
    ExtCodeCopy,
    ReturnDataSize,
    ReturnDataCopy,
    ExtCodeHash,
    BlockHash,
    Coinbase,
    Timestamp,
    Number,
    PrevRandao,
    GasLimit,
    ChainId,
    SelfBalance,
    BaseFee,
    BlobHash,
    BlobBaseFee,
    Pop,
    MLoad,
    MStore,
    MStore8,
    SLoad,
    SStore,
    Jump,
    JumpI,
    Pc,
    MSize,
    Gas,
    JumpDest,
    TLoad,
    TStore,
    MCopy,
    /// `PUSH0` through `PUSH32`; the payload is the immediate width in bytes.
    Push(u8),
    /// `DUP1` through `DUP16`.
    Dup(u8),
    /// `SWAP1` through `SWAP16`.
    Swap(u8),
    /// `LOG0` through `LOG4`; the payload is the topic count.
    Log(u8),
    Create,
    Call,
    CallCode,
    Return,
    DelegateCall,
    Create2,
    StaticCall,
    Revert,
    Invalid,
    SelfDestruct,
}

impl Opcode {
    pub fn byte(self) -> u8 {
        use Opcode::*;
        match self {
            Stop => 0x00,
            Add => 0x01,
            Mul => 0x02,
            Sub => 0x03,
            Div => 0x04,
            SDiv => 0x05,
            Mod => 0x06,
            SMod => 0x07,
            AddMod => 0x08,
            MulMod => 0x09,
            Exp => 0x0a,
            SignExtend => 0x0b,
            Lt => 0x10,
            Gt => 0x11,
            SLt => 0x12,
            SGt => 0x13,
            Eq => 0x14,
            IsZero => 0x15,
            And => 0x16,
            Or => 0x17,
            Xor => 0x18,
            Not => 0x19,
            Byte => 0x1a,
            Shl => 0x1b,
            Shr => 0x1c,
            Sar => 0x1d,
            Keccak256 => 0x20,
            Address => 0x30,
            Balance => 0x31,
            Origin => 0x32,
            Caller => 0x33,
            CallValue => 0x34,
            CallDataLoad => 0x35,
            CallDataSize => 0x36,
            CallDataCopy => 0x37,
            CodeSize => 0x38,
            CodeCopy => 0x39,
            GasPrice => 0x3a,
            ExtCodeSize => 0x3b,
            ExtCodeCopy => 0x3c,
            ReturnDataSize => 0x3d,
            ReturnDataCopy => 0x3e,
            ExtCodeHash => 0x3f,
            BlockHash => 0x40,
            Coinbase => 0x41,
            Timestamp => 0x42,
            Number => 0x43,
            PrevRandao => 0x44,
            GasLimit => 0x45,
            ChainId => 0x46,
            SelfBalance => 0x47,
            BaseFee => 0x48,
            BlobHash => 0x49,
            BlobBaseFee => 0x4a,
            Pop => 0x50,
            MLoad => 0x51,
            MStore => 0x52,
            MStore8 => 0x53,
            SLoad => 0x54,
            SStore => 0x55,
            Jump => 0x56,
            JumpI => 0x57,
            Pc => 0x58,
            MSize => 0x59,
            Gas => 0x5a,
            JumpDest => 0x5b,
            TLoad => 0x5c,
            TStore => 0x5d,
            MCopy => 0x5e,
            Push(n @ 0..=32) => 0x5f + n,
            Dup(n @ 1..=16) => 0x7f + n,
            Swap(n @ 1..=16) => 0x8f + n,
            Log(n @ 0..=4) => 0xa0 + n,
            // Family members with no encoding.
            Push(_) | Dup(_) | Swap(_) | Log(_) => 0xfe,
            Create => 0xf0,
            Call => 0xf1,
            CallCode => 0xf2,
            Return => 0xf3,
            DelegateCall => 0xf4,
            Create2 => 0xf5,
            StaticCall => 0xfa,
            Revert => 0xfd,
            Invalid => 0xfe,
            SelfDestruct => 0xff,
        }
    }

    /// Whether the opcode has a byte encoding; `Dup(0)` or `Push(33)` do not.
    pub fn is_assigned(self) -> bool {
        match self {
            Opcode::Push(n) => n <= 32,
            Opcode::Dup(n) | Opcode::Swap(n) => (1..=16).contains(&n),
            Opcode::Log(n) => n <= 4,
            _ => true,
        }
    }

    /// Width of the immediate that follows the opcode in bytecode.
    pub fn immediate_size(self) -> usize {
        match self {
            Opcode::Push(n) => n as usize,
            _ => 0,
        }
    }

    /// Ends execution of the current frame.
    pub fn is_halting(self) -> bool {
        matches!(
            self,
            Opcode::Stop | Opcode::Return | Opcode::Revert | Opcode::Invalid | Opcode::SelfDestruct
        )
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DomainError;

    fn try_from(byte: u8) -> Result<Self> {
        use Opcode::*;
        let op = match byte {
            0x00 => Stop,
            0x01 => Add,
            0x02 => Mul,
            0x03 => Sub,
            0x04 => Div,
            0x05 => SDiv,
            0x06 => Mod,
            0x07 => SMod,
            0x08 => AddMod,
            0x09 => MulMod,
            0x0a => Exp,
            0x0b => SignExtend,
            0x10 => Lt,
            0x11 => Gt,
            0x12 => SLt,
            0x13 => SGt,
            0x14 => Eq,
            0x15 => IsZero,
            0x16 => And,
            0x17 => Or,
            0x18 => Xor,
            0x19 => Not,
            0x1a => Byte,
            0x1b => Shl,
            0x1c => Shr,
            0x1d => Sar,
            0x20 => Keccak256,
            0x30 => Address,
            0x31 => Balance,
            0x32 => Origin,
            0x33 => Caller,
            0x34 => CallValue,
            0x35 => CallDataLoad,
            0x36 => CallDataSize,
            0x37 => CallDataCopy,
            0x38 => CodeSize,
            0x39 => CodeCopy,
            0x3a => GasPrice,
            0x3b => ExtCodeSize,
            0x3c => ExtCodeCopy,
            0x3d => ReturnDataSize,
            0x3e => ReturnDataCopy,
            0x3f => ExtCodeHash,
            0x40 => BlockHash,
            0x41 => Coinbase,
            0x42 => Timestamp,
            0x43 => Number,
            0x44 => PrevRandao,
            0x45 => GasLimit,
            0x46 => ChainId,
            0x47 => SelfBalance,
            0x48 => BaseFee,
            0x49 => BlobHash,
            0x4a => BlobBaseFee,
            0x50 => Pop,
            0x51 => MLoad,
            0x52 => MStore,
            0x53 => MStore8,
            0x54 => SLoad,
            0x55 => SStore,
            0x56 => Jump,
            0x57 => JumpI,
            0x58 => Pc,
            0x59 => MSize,
            0x5a => Gas,
            0x5b => JumpDest,
            0x5c => TLoad,
            0x5d => TStore,
            0x5e => MCopy,
            0x5f..=0x7f => Push(byte - 0x5f),
            0x80..=0x8f => Dup(byte - 0x7f),
            0x90..=0x9f => Swap(byte - 0x8f),
            0xa0..=0xa4 => Log(byte - 0xa0),
            0xf0 => Create,
            0xf1 => Call,
            0xf2 => CallCode,
            0xf3 => Return,
            0xf4 => DelegateCall,
            0xf5 => Create2,
            0xfa => StaticCall,
            0xfd => Revert,
            0xfe => Invalid,
            0xff => SelfDestruct,
            _ => return Err(DomainError::UnknownOpcode(byte)),
        };
        Ok(op)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Push(n) => write!(f, "PUSH{}", n),
            Opcode::Dup(n) => write!(f, "DUP{}", n),
            Opcode::Swap(n) => write!(f, "SWAP{}", n),
            Opcode::Log(n) => write!(f, "LOG{}", n),
            other => f.write_str(&format!("{:?}", other).to_uppercase()),
        }
    }
}

/// One decoded instruction, as supplied by the disassembler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Byte offset of the opcode in the code.
    pub pc: usize,
    pub opcode: Opcode,
    /// The push immediate, for `PUSH1`..`PUSH32`.
    pub immediate: Option<Word256>,
}

impl Instruction {
    pub fn new(pc: usize, opcode: Opcode) -> Self {
        Self {
            pc,
            opcode,
            immediate: None,
        }
    }

    /// A `PUSHn` whose width is the length of `bytes`.
    pub fn push(pc: usize, bytes: &[u8]) -> Result<Self> {
        let value = Word256::from_immediate(bytes)?;
        Ok(Self {
            pc,
            opcode: Opcode::Push(bytes.len() as u8),
            immediate: Some(value),
        })
    }

    /// A `PUSH32` of an arbitrary word.
    pub fn push_word(pc: usize, value: Word256) -> Self {
        Self {
            pc,
            opcode: Opcode::Push(32),
            immediate: Some(value),
        }
    }

    /// Size of the encoded instruction in bytes.
    pub fn size(&self) -> usize {
        1 + self.opcode.immediate_size()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}: {}", self.pc, self.opcode)?;
        if let Some(value) = &self.immediate {
            write!(f, " 0x{:x}", value)?;
        }
        Ok(())
    }
}
