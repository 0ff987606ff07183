//! Global minimum cut via Stoer–Wagner.
//!
//! Operates on a dense symmetric weight matrix. O(V³) with the simple
//! maximum-adjacency search, which is fine at fleet scale (tens to low
//! hundreds of nodes); callers guarantee the input graph is connected and
//! has at least two vertices.

/// Compute the global minimum cut weight of a connected undirected graph
/// given as a symmetric adjacency matrix (`weights[i][j]` = edge weight,
/// 0.0 = no edge, diagonal ignored).
pub fn stoer_wagner(mut weights: Vec<Vec<f64>>) -> f64 {
    let n = weights.len();
    debug_assert!(n >= 2, "min-cut needs at least two vertices");
    debug_assert!(weights.iter().all(|row| row.len() == n));

    // Indices into the original matrix that are still alive; merging
    // contracts one vertex into another and shrinks this list.
    let mut alive: Vec<usize> = (0..n).collect();
    let mut best = f64::INFINITY;

    while alive.len() > 1 {
        let m = alive.len();
        let mut added = vec![false; m];
        let mut score = vec![0.0_f64; m];
        let mut order = Vec::with_capacity(m);

        // Maximum-adjacency search: repeatedly add the vertex most tightly
        // connected to the growing set. The score of the last vertex at
        // the moment it is added is the cut-of-the-phase.
        for _ in 0..m {
            let next = (0..m)
                .filter(|&i| !added[i])
                .max_by(|&a, &b| score[a].total_cmp(&score[b]))
                .unwrap_or(0);
            added[next] = true;
            order.push(next);
            for i in 0..m {
                if !added[i] {
                    score[i] += weights[alive[next]][alive[i]];
                }
            }
        }

        let last = order[m - 1];
        let second_last = order[m - 2];
        best = best.min(score[last]);

        // Contract the last vertex into the second-to-last.
        let (keep, gone) = (alive[second_last], alive[last]);
        for i in 0..n {
            if i != keep {
                weights[keep][i] += weights[gone][i];
                weights[i][keep] = weights[keep][i];
            }
        }
        weights[keep][keep] = 0.0;
        alive.remove(last);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn matrix(n: usize, edges: &[(usize, usize, f64)]) -> Vec<Vec<f64>> {
        let mut w = vec![vec![0.0; n]; n];
        for &(a, b, weight) in edges {
            w[a][b] += weight;
            w[b][a] += weight;
        }
        w
    }

    /// Enumerate all 2^(n-1) bipartitions; ground truth for small graphs.
    fn brute_force_min_cut(w: &[Vec<f64>]) -> f64 {
        let n = w.len();
        let mut best = f64::INFINITY;
        for mask in 1..(1u32 << (n - 1)) {
            let mut cut = 0.0;
            for i in 0..n {
                for j in (i + 1)..n {
                    let side_i = mask >> i & 1;
                    let side_j = if j == n - 1 { 0 } else { mask >> j & 1 };
                    if side_i != side_j {
                        cut += w[i][j];
                    }
                }
            }
            best = best.min(cut);
        }
        best
    }

    #[test]
    fn test_complete_graph_cut_isolates_one_vertex() {
        let n = 5;
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                edges.push((i, j, 1.0));
            }
        }
        assert_relative_eq!(stoer_wagner(matrix(n, &edges)), 4.0);
    }

    #[test]
    fn test_path_graph_cut_is_weakest_link() {
        let edges = [(0, 1, 3.0), (1, 2, 1.5), (2, 3, 2.0)];
        assert_relative_eq!(stoer_wagner(matrix(4, &edges)), 1.5);
    }

    #[test]
    fn test_two_clusters_cut_is_the_bridge() {
        // Two triangles joined by a single light edge.
        let edges = [
            (0, 1, 2.0),
            (1, 2, 2.0),
            (0, 2, 2.0),
            (3, 4, 2.0),
            (4, 5, 2.0),
            (3, 5, 2.0),
            (2, 3, 0.5),
        ];
        assert_relative_eq!(stoer_wagner(matrix(6, &edges)), 0.5);
    }

    #[test]
    fn test_two_vertices() {
        assert_relative_eq!(stoer_wagner(matrix(2, &[(0, 1, 7.0)])), 7.0);
    }

    #[test]
    fn test_matches_brute_force_on_random_graphs() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let n = rng.gen_range(3..=7);
            // Spanning path keeps the graph connected, then random extras.
            let mut edges: Vec<(usize, usize, f64)> = (0..n - 1)
                .map(|i| (i, i + 1, rng.gen_range(0.5..4.0)))
                .collect();
            for i in 0..n {
                for j in (i + 2)..n {
                    if rng.gen_bool(0.4) {
                        edges.push((i, j, rng.gen_range(0.5..4.0)));
                    }
                }
            }
            let w = matrix(n, &edges);
            assert_relative_eq!(
                stoer_wagner(w.clone()),
                brute_force_min_cut(&w),
                epsilon = 1e-9
            );
        }
    }
}
