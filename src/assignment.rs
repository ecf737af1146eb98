use munkres::{solve_assignment, WeightMatrix};
use ndarray::Array2;

use crate::error::Error;

// cost of a padding cell, well above any 1 - IoU
const PADDING_COST: f32 = 100_000.0;

/// Minimum-total-cost one-to-one assignment of rows to columns.
///
/// The matrix may be rectangular; it is padded to a square one before solving and pairs
/// that land on padding are discarded, so every row or column in excess stays unassigned.
/// Returned pairs are `(row, column)` in increasing row order.
pub fn solve(costs: &Array2<f32>) -> Result<Vec<(usize, usize)>, Error> {
    let (rows, cols) = costs.dim();
    if rows == 0 || cols == 0 {
        return Ok(Vec::new());
    }

    let n = rows.max(cols);
    let mut mat = WeightMatrix::from_fn(n, |(r, c)| {
        if r < rows && c < cols && costs[[r, c]].is_finite() {
            costs[[r, c]]
        } else {
            PADDING_COST
        }
    });

    let solution =
        solve_assignment(&mut mat).map_err(|err| Error::Assignment(format!("{:?}", err)))?;

    let mut pairs: Vec<_> = solution
        .into_iter()
        .filter(|pos| pos.row < rows && pos.column < cols)
        .map(|pos| (pos.row, pos.column))
        .collect();

    pairs.sort_unstable();

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::solve;
    use ndarray::{array, Array2};

    #[test]
    fn prefers_lower_total_over_locally_best_pair() {
        // greedy would take (0, 0) first and be forced into (1, 1): total 1.0
        let costs = array![[0.1f32, 0.2], [0.2, 0.9]];
        assert_eq!(solve(&costs).unwrap(), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn identity_when_it_is_optimal() {
        let costs = array![[0.0f32, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]];
        assert_eq!(solve(&costs).unwrap(), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn rectangular_matrices_leave_extras_unassigned() {
        let wide = array![[0.9f32, 0.1, 0.5]];
        assert_eq!(solve(&wide).unwrap(), vec![(0, 1)]);

        let tall = array![[1.0f32], [0.3], [0.7]];
        assert_eq!(solve(&tall).unwrap(), vec![(1, 0)]);
    }

    #[test]
    fn empty_matrix_is_a_noop() {
        let costs = Array2::<f32>::zeros((0, 3));
        assert!(solve(&costs).unwrap().is_empty());

        let costs = Array2::<f32>::zeros((2, 0));
        assert!(solve(&costs).unwrap().is_empty());
    }

    #[test]
    fn deterministic_on_ties() {
        let costs = array![[1.0f32, 1.0], [1.0, 1.0]];
        let first = solve(&costs).unwrap();
        assert_eq!(first.len(), 2);
        for _ in 0..10 {
            assert_eq!(solve(&costs).unwrap(), first);
        }
    }
}
