//! Vote combination for the three-model ensemble

/// Label chosen by more than half of the voters.
///
/// With an odd number of voters this is always well defined. An even split
/// resolves to 0.
pub fn majority_vote(votes: &[u8]) -> u8 {
    let defaults = votes.iter().filter(|&&vote| vote == 1).count();
    u8::from(defaults * 2 > votes.len())
}

/// Fraction of voters agreeing with `label`
pub fn agreement(votes: &[u8], label: u8) -> f64 {
    if votes.is_empty() {
        return 0.0;
    }
    votes.iter().filter(|&&vote| vote == label).count() as f64 / votes.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_all_combinations() {
        for p1 in 0..=1u8 {
            for p2 in 0..=1u8 {
                for p3 in 0..=1u8 {
                    let votes = [p1, p2, p3];
                    let ones = votes.iter().filter(|&&v| v == 1).count();
                    let expected = if ones >= 2 { 1 } else { 0 };
                    assert_eq!(majority_vote(&votes), expected, "votes {:?}", votes);
                }
            }
        }
    }

    #[test]
    fn test_majority_examples() {
        assert_eq!(majority_vote(&[1, 1, 0]), 1);
        assert_eq!(majority_vote(&[0, 0, 1]), 0);
        assert_eq!(majority_vote(&[1, 0, 1]), 1);
    }

    #[test]
    fn test_even_split_resolves_to_zero() {
        assert_eq!(majority_vote(&[1, 0]), 0);
        assert_eq!(majority_vote(&[]), 0);
    }

    #[test]
    fn test_agreement() {
        assert!((agreement(&[1, 1, 0], 1) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(agreement(&[0, 0, 0], 0), 1.0);
        assert_eq!(agreement(&[], 1), 0.0);
    }
}
