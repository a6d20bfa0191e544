use crate::hash::{Digest, DigestAccumulator};

/// Folds per-channel digests into one transcript digest.
///
/// The digests are sorted byte-lexicographically and then hashed in that
/// order, so the result depends only on the multiset of inputs. A single
/// input is still hashed: `aggregate(&[d]) == H(d)`, never `d`.
pub fn aggregate(digests: &[Digest]) -> Digest {
    let mut sorted = digests.to_vec();
    sorted.sort_unstable();

    let mut acc = DigestAccumulator::new();
    for digest in &sorted {
        acc.absorb(digest);
    }
    acc.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(tag: &[u8]) -> Digest {
        DigestAccumulator::hash_once(tag)
    }

    #[test]
    fn empty_input_is_hash_of_nothing() {
        assert_eq!(aggregate(&[]), DigestAccumulator::new().finalize());
    }

    #[test]
    fn single_digest_is_rehashed() {
        let one = d(b"one");
        let agg = aggregate(&[one]);
        assert_ne!(agg, one);
        assert_eq!(agg, DigestAccumulator::hash_once(&one));
        assert_eq!(agg, aggregate(&[one]));
    }

    #[test]
    fn permutation_does_not_change_result() {
        let (a, b, c) = (d(b"a"), d(b"b"), d(b"c"));
        let reference = aggregate(&[a, b, c]);
        for perm in [[a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]] {
            assert_eq!(aggregate(&perm), reference);
        }
        assert_eq!(aggregate(&[a, b]), aggregate(&[b, a]));
    }

    #[test]
    fn hashes_the_sorted_concatenation() {
        let (x, y) = (d(b"x"), d(b"y"));
        let (lo, hi) = if x < y { (x, y) } else { (y, x) };
        assert_eq!(aggregate(&[hi, lo]), DigestAccumulator::hash_once(&[lo, hi].concat()));
    }

    #[test]
    fn multiplicity_matters() {
        let a = d(b"a");
        assert_ne!(aggregate(&[a]), aggregate(&[a, a]));
        assert_eq!(aggregate(&[a, a]), DigestAccumulator::hash_once(&[a, a].concat()));
    }
}
