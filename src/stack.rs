//! Fixed-length window over the top of the operand stack.
//!
//! The window holds exactly `window_size` slots. Slot `window_size - 1` is
//! the top of the stack; slot `i` is the element `window_size - 1 - i`
//! positions below it. A `Bottom` slot means "no element here": an empty
//! stack is a window of `Bottom` slots, and the live depth is the number of
//! slots above the leading run of `Bottom`s.
//!
//! Push and pop shift the window instead of resizing it:
//!
//! ```text
//! push(v):  [s0 s1 .. sT]  ->  [s1 .. sT v]             (s0 scrolls out)
//! pop():    [s0 s1 .. sT]  ->  [b s0 s1 .. sT-1], sT     (b = boundary(s0))
//! ```
//!
//! The boundary slot `b` synthesized by `pop` is `Bottom` when `s0` is
//! `Bottom` (the stack never reached the window edge) and `Top` otherwise
//! (an element may have scrolled out earlier and was never observed).

use std::collections::VecDeque;
use std::fmt;

use crate::lattice::Lattice;
use crate::set::BoundedWordSet;

/// The slot revealed at the deepest position when the window shifts down.
pub fn synthesize_boundary(deepest: &BoundedWordSet) -> BoundedWordSet {
    if deepest.is_bottom() {
        BoundedWordSet::Bottom
    } else {
        BoundedWordSet::Top
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperandStack {
    slots: VecDeque<BoundedWordSet>,
}

impl OperandStack {
    /// An empty stack: every slot is `Bottom`.
    pub fn new(window_size: usize) -> Self {
        Self::filled(window_size, BoundedWordSet::Bottom)
    }

    /// A stack of unknown depth and contents: every slot is `Top`.
    pub fn top(window_size: usize) -> Self {
        Self::filled(window_size, BoundedWordSet::Top)
    }

    fn filled(window_size: usize, slot: BoundedWordSet) -> Self {
        assert!(window_size >= 2, "Stack window must hold at least 2 slots, got {}", window_size);
        Self {
            slots: std::iter::repeat(slot).take(window_size).collect(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.slots.len()
    }

    /// Slots from deepest to top.
    pub fn slots(&self) -> impl DoubleEndedIterator<Item = &BoundedWordSet> {
        self.slots.iter()
    }

    /// Estimated live depth, saturating at the window size.
    pub fn size(&self) -> usize {
        let leading_bottoms = self.slots.iter().take_while(|s| s.is_bottom()).count();
        self.window_size() - leading_bottoms
    }

    /// Window index of the `n`-th element from the top (1-indexed), if tracked.
    fn index_from_top(&self, n: usize) -> Option<usize> {
        assert!(n >= 1, "Stack positions are 1-indexed from the top");
        self.window_size().checked_sub(n)
    }

    /// The `n`-th element from the top (1-indexed).
    ///
    /// Positions below the window read as `Top`, unless the window shows the
    /// stack is shallower than that, in which case they read as `Bottom`.
    pub fn peek(&self, n: usize) -> BoundedWordSet {
        match self.index_from_top(n) {
            Some(i) => self.slots[i].clone(),
            None => synthesize_boundary(&self.slots[0]),
        }
    }

    /// Whether any of the top `n` positions is known to be empty.
    pub fn has_bottom_until(&self, n: usize) -> bool {
        (1..=n).any(|i| self.peek(i).is_bottom())
    }

    pub fn push(&mut self, value: BoundedWordSet) {
        self.slots.pop_front();
        self.slots.push_back(value);
    }

    /// Removes and returns the top element.
    ///
    /// Popping an empty position does not fail: it yields `Top` and leaves
    /// the window well-formed.
    pub fn pop(&mut self) -> BoundedWordSet {
        let boundary = synthesize_boundary(&self.slots[0]);
        let value = self.slots.pop_back().unwrap_or(BoundedWordSet::Bottom);
        self.slots.push_front(boundary);
        if value.is_bottom() {
            log::debug!("pop from an empty stack position, yielding Top");
            BoundedWordSet::Top
        } else {
            value
        }
    }

    /// Pops `n` elements, topmost first.
    pub fn pop_n(&mut self, n: usize) -> Vec<BoundedWordSet> {
        (0..n).map(|_| self.pop()).collect()
    }

    /// `DUPn`: pushes a copy of the `n`-th element from the top.
    pub fn dup(&mut self, n: usize) {
        let value = self.peek(n);
        log::trace!("dup({}) -> {}", n, value);
        self.push(if value.is_bottom() { BoundedWordSet::Top } else { value });
    }

    /// `SWAPn`: exchanges the top with the `n + 1`-th element from the top.
    ///
    /// When the partner lies below the window, the top becomes `Top` and the
    /// old top scrolls out with the untracked region.
    pub fn swap(&mut self, n: usize) {
        let top = self.window_size() - 1;
        match self.index_from_top(n + 1) {
            Some(i) => {
                log::trace!("swap({}) exchanges slots {} and {}", n, i, top);
                self.slots.swap(i, top);
            }
            None => {
                log::trace!("swap({}) reaches below the window", n);
                self.slots[top] = synthesize_boundary(&self.slots[0]);
            }
        }
    }

    fn zip_with(&self, other: &Self, f: impl Fn(&BoundedWordSet, &BoundedWordSet) -> BoundedWordSet) -> Self {
        assert_eq!(
            self.window_size(),
            other.window_size(),
            "Cannot combine stacks of different window sizes"
        );
        Self {
            slots: self.slots.iter().zip(other.slots.iter()).map(|(a, b)| f(a, b)).collect(),
        }
    }
}

/// Element-wise lattice. The least element is the empty stack, which is a
/// reachable configuration: unreachability is tracked by the enclosing state.
impl Lattice for OperandStack {
    fn is_bottom(&self) -> bool {
        self.slots.iter().all(|s| s.is_bottom())
    }

    fn is_top(&self) -> bool {
        self.slots.iter().all(|s| s.is_top())
    }

    fn le(&self, other: &Self) -> bool {
        self.window_size() == other.window_size() && self.slots.iter().zip(other.slots.iter()).all(|(a, b)| a.le(b))
    }

    fn join(&self, other: &Self) -> Self {
        self.zip_with(other, BoundedWordSet::join)
    }

    fn meet(&self, other: &Self) -> Self {
        self.zip_with(other, BoundedWordSet::meet)
    }

    fn widen(&self, other: &Self) -> Self {
        self.zip_with(other, BoundedWordSet::widen)
    }
}

impl fmt::Display for OperandStack {
    /// Live elements only, top first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, slot) in self.slots.iter().rev().take(self.size()).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", slot)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::tests::check_lattice_axioms;
    use crate::word::Word256;
    use test_log::test;

    const W: usize = 4;

    fn s(v: u64) -> BoundedWordSet {
        BoundedWordSet::singleton(Word256::from(v))
    }

    fn stack_of(values: &[u64]) -> OperandStack {
        let mut stack = OperandStack::new(W);
        for &v in values {
            stack.push(s(v));
        }
        stack
    }

    #[test]
    fn test_new_is_empty() {
        let stack = OperandStack::new(W);
        assert_eq!(stack.window_size(), W);
        assert_eq!(stack.size(), 0);
        assert!(stack.is_bottom());
    }

    #[test]
    fn test_push_pop() {
        let mut stack = stack_of(&[1, 2]);
        assert_eq!(stack.size(), 2);
        assert_eq!(stack.peek(1), s(2));
        assert_eq!(stack.pop(), s(2));
        assert_eq!(stack.pop(), s(1));
        assert_eq!(stack.size(), 0);
        assert_eq!(stack.window_size(), W);
    }

    #[test]
    fn test_pop_empty_yields_top() {
        let mut stack = OperandStack::new(W);
        assert_eq!(stack.pop(), BoundedWordSet::Top);
        assert_eq!(stack, OperandStack::new(W));
    }

    #[test]
    fn test_push_then_pop_restores() {
        for depth in 0..=W + 1 {
            let before = stack_of(&(0..depth as u64).collect::<Vec<_>>());
            let mut after = before.clone();
            after.push(s(99));
            assert_eq!(after.pop(), s(99));
            assert_eq!(after.window_size(), W);
            for i in 1..W {
                assert_eq!(after.slots[i], before.slots[i], "depth {}, slot {}", depth, i);
            }
        }
    }

    #[test]
    fn test_overflow_synthesizes_top() {
        // Five pushes into a window of four: the first value scrolls out.
        let mut stack = stack_of(&[1, 2, 3, 4, 5]);
        assert_eq!(stack.size(), W);
        assert_eq!(stack.pop(), s(5));
        assert_eq!(stack.peek(W), BoundedWordSet::Top);
        assert_eq!(stack.pop(), s(4));
        assert_eq!(stack.pop(), s(3));
        assert_eq!(stack.pop(), s(2));
        assert_eq!(stack.pop(), BoundedWordSet::Top);
    }

    #[test]
    fn test_boundary_rule() {
        assert_eq!(synthesize_boundary(&BoundedWordSet::Bottom), BoundedWordSet::Bottom);
        assert_eq!(synthesize_boundary(&s(1)), BoundedWordSet::Top);
        assert_eq!(synthesize_boundary(&BoundedWordSet::Top), BoundedWordSet::Top);
    }

    #[test]
    fn test_size_counts_from_top() {
        let mut stack = OperandStack::new(W);
        stack.push(BoundedWordSet::Top);
        stack.push(s(3));
        assert_eq!(stack.size(), 2);
        assert_eq!(OperandStack::top(W).size(), W);
    }

    #[test]
    fn test_dup_below_window_depth() {
        let mut stack = stack_of(&[10, 20, 30]);
        stack.dup(1);
        assert_eq!(stack.peek(1), s(30));
        stack.dup(4);
        assert_eq!(stack.peek(1), s(10));
    }

    #[test]
    fn test_dup_at_window_boundary() {
        // depth = W - 1
        let stack = stack_of(&[1, 2, 3]);
        assert!(!stack.has_bottom_until(3));
        assert!(stack.has_bottom_until(4));

        // depth = W: the deepest tracked element is still exact
        let mut stack = stack_of(&[1, 2, 3, 4]);
        assert!(!stack.has_bottom_until(W));
        stack.dup(W);
        assert_eq!(stack.peek(1), s(1));

        // depth = W + 1: element W from the top is exact, W + 1 is unknown
        let stack = stack_of(&[1, 2, 3, 4, 5]);
        assert_eq!(stack.peek(W), s(2));
        assert_eq!(stack.peek(W + 1), BoundedWordSet::Top);
        let mut dup = stack.clone();
        dup.dup(W + 1);
        assert_eq!(dup.peek(1), BoundedWordSet::Top);
    }

    #[test]
    fn test_below_window_on_shallow_stack_is_bottom() {
        let stack = stack_of(&[1]);
        assert_eq!(stack.peek(W + 1), BoundedWordSet::Bottom);
        assert!(stack.has_bottom_until(W + 1));
    }

    #[test]
    fn test_swap() {
        let mut stack = stack_of(&[1, 2, 3]);
        stack.swap(1);
        assert_eq!(stack.peek(1), s(2));
        assert_eq!(stack.peek(2), s(3));
        stack.swap(2);
        assert_eq!(stack.peek(1), s(1));
        assert_eq!(stack.peek(3), s(2));
    }

    #[test]
    fn test_swap_at_window_boundary() {
        // Partner at slot 0 (depth = W): exact exchange.
        let mut stack = stack_of(&[1, 2, 3, 4]);
        stack.swap(W - 1);
        assert_eq!(stack.peek(1), s(1));
        assert_eq!(stack.peek(W), s(4));

        // Partner below the window (depth = W + 1).
        let mut stack = stack_of(&[1, 2, 3, 4, 5]);
        stack.swap(W);
        assert_eq!(stack.peek(1), BoundedWordSet::Top);
        assert_eq!(stack.peek(W), s(2));
    }

    #[test]
    fn test_elementwise_join() {
        let a = stack_of(&[1, 2]);
        let b = stack_of(&[1, 3]);
        let j = a.join(&b);
        assert_eq!(j.peek(1), BoundedWordSet::from_values([Word256::from(2u64), Word256::from(3u64)]));
        assert_eq!(j.peek(2), s(1));
        assert!(a.le(&j) && b.le(&j));
        assert!(!j.le(&a));
    }

    #[test]
    #[should_panic(expected = "different window sizes")]
    fn test_join_window_mismatch_panics() {
        let _ = OperandStack::new(4).join(&OperandStack::new(5));
    }

    #[test]
    fn test_display() {
        assert_eq!(stack_of(&[1, 2]).to_string(), "[{2}, {1}]");
        assert_eq!(OperandStack::new(W).to_string(), "[]");
    }

    #[test]
    fn test_lattice_axioms() {
        let samples = vec![
            OperandStack::new(W),
            stack_of(&[1]),
            stack_of(&[2]),
            stack_of(&[1, 2]),
            stack_of(&[1, 2, 3, 4, 5]),
            OperandStack::top(W),
        ];
        check_lattice_axioms(&OperandStack::new(W), &OperandStack::top(W), &samples);
    }
}
