//! Structured, human-readable rendering of domain values.
//!
//! [`Representation`] is a small tree of strings, lists and ordered maps. It
//! is meant for reports and debugging output, not as an interchange format:
//! nothing parses it back.

use std::fmt;

use crate::memory::AddressSpace;
use crate::set::BoundedWordSet;
use crate::stack::OperandStack;
use crate::state::MachineState;
use crate::value::ArithmeticWord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Representation {
    Str(String),
    List(Vec<Representation>),
    /// Key order is preserved.
    Map(Vec<(String, Representation)>),
}

impl Representation {
    pub fn str(s: impl Into<String>) -> Self {
        Representation::Str(s.into())
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Str(s) => write!(f, "{}", s),
            Representation::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Representation::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

pub trait ToRepresentation {
    fn representation(&self) -> Representation;
}

impl ToRepresentation for ArithmeticWord {
    fn representation(&self) -> Representation {
        Representation::str(self.to_string())
    }
}

impl ToRepresentation for BoundedWordSet {
    fn representation(&self) -> Representation {
        match self.values() {
            Some(values) => Representation::List(values.iter().map(|v| Representation::str(v.to_string())).collect()),
            None => Representation::str(self.to_string()),
        }
    }
}

impl ToRepresentation for AddressSpace {
    fn representation(&self) -> Representation {
        match self {
            AddressSpace::Map { .. } => {
                let mut entries: Vec<_> = self
                    .entries()
                    .map(|(k, v)| (format!("{:#x}", k), v.representation()))
                    .collect();
                entries.push(("_".to_string(), self.default_value().representation()));
                Representation::Map(entries)
            }
            other => Representation::str(other.to_string()),
        }
    }
}

impl ToRepresentation for OperandStack {
    /// Live slots, top first.
    fn representation(&self) -> Representation {
        let live: Vec<_> = self.slots().rev().take(self.size()).map(|s| s.representation()).collect();
        Representation::List(live)
    }
}

impl ToRepresentation for MachineState {
    fn representation(&self) -> Representation {
        match self.frame() {
            None => Representation::str("⊥"),
            Some(frame) => Representation::Map(vec![
                ("stack".to_string(), frame.stack.representation()),
                ("msize".to_string(), frame.msize.representation()),
                ("memory".to_string(), frame.memory.representation()),
                ("storage".to_string(), frame.storage.representation()),
            ]),
        }
    }
}
