//! Splitting a layer into batches

/// Split a layer into consecutive batches of at most `max_concurrency` items
///
/// Order is preserved. A `max_concurrency` of zero is treated as one.
pub fn split_into_batches<T: Clone>(items: &[T], max_concurrency: usize) -> Vec<Vec<T>> {
    items
        .chunks(max_concurrency.max(1))
        .map(<[T]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_order() {
        let batches = split_into_batches(&["a", "b", "c", "d", "e"], 2);
        assert_eq!(batches, vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
    }

    #[test]
    fn test_split_edge_cases() {
        assert!(split_into_batches::<u8>(&[], 3).is_empty());
        assert_eq!(split_into_batches(&[1, 2], 0), vec![vec![1], vec![2]]);
        assert_eq!(split_into_batches(&[1, 2], 10), vec![vec![1, 2]]);
    }
}
