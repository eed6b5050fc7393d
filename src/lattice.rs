//! The lattice interface shared by every abstract domain in this crate.

use std::fmt::Debug;

/// Operations the fixpoint engine needs at control-flow merge points.
///
/// Elements carry their own shape (a stack knows its window size), so the
/// extremes are built by each type's inherent constructors rather than here.
///
/// # Lattice Properties
///
/// - Reflexivity: `∀a. a ⊑ a`
/// - `a ⊑ a ⊔ b` and `b ⊑ a ⊔ b`
/// - `a ⊓ b ⊑ a` and `a ⊓ b ⊑ b`
/// - `a ⊑ a ∇ b`, and every chain `a0 ∇ a1 ∇ …` stabilizes
pub trait Lattice: Clone + Debug + PartialEq + Sized {
    /// Check if an element is bottom (⊥): unreachable.
    fn is_bottom(&self) -> bool;

    /// Check if an element is top (⊤): nothing is known.
    fn is_top(&self) -> bool;

    /// Partial order: `self ⊑ other`.
    fn le(&self, other: &Self) -> bool;

    /// Join (`⊔`): least upper bound.
    fn join(&self, other: &Self) -> Self;

    /// Meet (`⊓`): greatest lower bound.
    fn meet(&self, other: &Self) -> Self;

    /// Widening (`∇`).
    fn widen(&self, other: &Self) -> Self;

    /// Join multiple elements onto `self`.
    fn join_all<'a, I>(&self, others: I) -> Self
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        others.into_iter().fold(self.clone(), |acc, e| acc.join(e))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Test helper: validate basic lattice axioms over a sample of elements.
    pub fn check_lattice_axioms<L: Lattice>(bottom: &L, top: &L, samples: &[L]) {
        assert!(bottom.is_bottom());
        assert!(top.is_top());

        for a in samples {
            assert!(a.le(a), "Reflexivity failed for {:?}", a);
            assert!(bottom.le(a), "Bottom is not least for {:?}", a);
            assert!(a.le(top), "Top is not greatest for {:?}", a);

            assert_eq!(&a.join(bottom), a, "Join with bottom failed");
            assert_eq!(&a.join(a), a, "Join idempotence failed");
            assert_eq!(&a.join(top), top, "Join with top failed");
            assert_eq!(&a.meet(top), a, "Meet with top failed");
        }

        for a in samples {
            for b in samples {
                let ab = a.join(b);
                assert_eq!(ab, b.join(a), "Join commutativity failed for {:?}, {:?}", a, b);
                assert!(a.le(&ab) && b.le(&ab), "Join is not an upper bound of {:?}, {:?}", a, b);

                let met = a.meet(b);
                assert_eq!(met, b.meet(a), "Meet commutativity failed for {:?}, {:?}", a, b);
                assert!(met.le(a) && met.le(b), "Meet is not a lower bound of {:?}, {:?}", a, b);

                let widened = a.widen(b);
                assert!(a.le(&widened) && b.le(&widened), "Widening is not an upper bound");
                assert_eq!(widened.widen(b), widened, "Widening did not stabilize");

                for c in samples {
                    assert_eq!(ab.join(c), a.join(&b.join(c)), "Join associativity failed");
                }
            }
        }
    }
}
