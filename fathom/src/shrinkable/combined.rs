use std::rc::Rc;

use super::{
    CandidateSupplier, Candidates, Mapper, Shrinkable, ShrinkableRef, ShrinkingDistance,
    concat_lazily,
};

/// Value combined from several shrinkable parts of the same type
///
/// Parts shrink one after the other, in declaration order.
pub struct CombinedShrinkable<T, R> {
    parts: Rc<Vec<ShrinkableRef<T>>>,
    combinator: Mapper<Vec<T>, R>,
}

impl<T, R> Clone for CombinedShrinkable<T, R> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts.clone(),
            combinator: self.combinator.clone(),
        }
    }
}

impl<T: 'static, R: 'static> CombinedShrinkable<T, R> {
    pub fn new(parts: Vec<ShrinkableRef<T>>, combinator: Mapper<Vec<T>, R>) -> Self {
        Self {
            parts: Rc::new(parts),
            combinator,
        }
    }

    fn with_part(&self, index: usize, part: ShrinkableRef<T>) -> ShrinkableRef<R> {
        let mut parts = self.parts.as_ref().clone();
        parts[index] = part;
        Rc::new(CombinedShrinkable {
            parts: Rc::new(parts),
            combinator: self.combinator.clone(),
        })
    }
}

impl<T: 'static, R: 'static> Shrinkable<R> for CombinedShrinkable<T, R> {
    fn value(&self) -> R {
        let values = self.parts.iter().map(|part| part.value()).collect();
        (self.combinator)(values)
    }

    fn shrink(&self) -> Candidates<R> {
        let this = self.clone();
        Box::new((0..self.parts.len()).flat_map(move |index| {
            let combined = this.clone();
            this.parts[index]
                .shrink()
                .map(move |candidate| combined.with_part(index, candidate))
        }))
    }

    fn distance(&self) -> ShrinkingDistance {
        ShrinkingDistance::combine(&self.parts)
    }
}

/// Pair of two differently typed shrinkables; the left side shrinks first
pub struct ZipShrinkable<A, B> {
    left: ShrinkableRef<A>,
    right: ShrinkableRef<B>,
}

impl<A: 'static, B: 'static> ZipShrinkable<A, B> {
    pub fn new(left: ShrinkableRef<A>, right: ShrinkableRef<B>) -> Self {
        Self { left, right }
    }
}

impl<A: 'static, B: 'static> Shrinkable<(A, B)> for ZipShrinkable<A, B> {
    fn value(&self) -> (A, B) {
        (self.left.value(), self.right.value())
    }

    fn shrink(&self) -> Candidates<(A, B)> {
        let (left, right) = (self.left.clone(), self.right.clone());
        let shrink_left: CandidateSupplier<(A, B)> = Box::new(move || {
            Box::new(left.shrink().map(move |candidate| {
                Rc::new(ZipShrinkable::new(candidate, right.clone())) as ShrinkableRef<(A, B)>
            })) as Candidates<(A, B)>
        });
        let (left, right) = (self.left.clone(), self.right.clone());
        let shrink_right: CandidateSupplier<(A, B)> = Box::new(move || {
            Box::new(right.shrink().map(move |candidate| {
                Rc::new(ZipShrinkable::new(left.clone(), candidate)) as ShrinkableRef<(A, B)>
            })) as Candidates<(A, B)>
        });
        concat_lazily(vec![shrink_left, shrink_right])
    }

    fn distance(&self) -> ShrinkingDistance {
        self.left.distance().append(&self.right.distance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shrinkable::{ShrinkableBigInt, unshrinkable};
    use num_bigint::BigInt;
    use std::sync::Arc;

    fn int(value: i64) -> ShrinkableRef<BigInt> {
        Rc::new(ShrinkableBigInt::new(
            BigInt::from(value),
            BigInt::from(0),
            BigInt::from(100),
            BigInt::from(0),
        ))
    }

    #[test]
    fn test_combined_value_and_distance() {
        let sum: Mapper<Vec<BigInt>, BigInt> = Arc::new(|values| values.into_iter().sum());
        let combined = CombinedShrinkable::new(vec![int(3), int(4)], sum);
        assert_eq!(combined.value(), BigInt::from(7));
        assert_eq!(combined.distance(), ShrinkingDistance::of(&[3, 4]));
    }

    #[test]
    fn test_combined_shrinks_parts_in_order() {
        let list: Mapper<Vec<BigInt>, Vec<BigInt>> = Arc::new(|values| values);
        let combined = CombinedShrinkable::new(vec![int(2), int(2)], list);
        let candidates: Vec<Vec<BigInt>> = combined.shrink().map(|c| c.value()).collect();
        let expected: Vec<Vec<BigInt>> = [[0, 2], [1, 2], [2, 0], [2, 1]]
            .iter()
            .map(|pair| pair.iter().map(|&v| BigInt::from(v)).collect())
            .collect();
        assert_eq!(candidates, expected);
    }

    #[test]
    fn test_zip_shrinks_left_then_right() {
        let zipped = ZipShrinkable::new(int(1), unshrinkable("x"));
        let candidates: Vec<(BigInt, &str)> = zipped.shrink().map(|c| c.value()).collect();
        assert_eq!(candidates, vec![(BigInt::from(0), "x")]);

        let zipped = ZipShrinkable::new(unshrinkable('a'), int(1));
        let candidates: Vec<(char, BigInt)> = zipped.shrink().map(|c| c.value()).collect();
        assert_eq!(candidates, vec![('a', BigInt::from(0))]);
        assert_eq!(zipped.distance(), ShrinkingDistance::of(&[1]));
    }
}
