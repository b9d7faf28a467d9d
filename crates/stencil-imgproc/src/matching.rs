use std::collections::HashMap;

use rayon::prelude::*;

/// A corpus descriptor found close to a query descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Index of the descriptor in the corpus.
    pub index: usize,
    /// Euclidean distance to the query descriptor.
    pub distance: f32,
}

/// A correspondence that survived the ratio test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    /// Index of the descriptor in the query set, usually the template.
    pub query_idx: usize,
    /// Index of the descriptor in the corpus, usually the target.
    pub train_idx: usize,
    /// Euclidean distance between both descriptors.
    pub distance: f32,
}

/// Parameters of [`match_descriptors`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatchConfig {
    /// Number of neighbors searched per query descriptor.
    pub k: usize,
    /// A match is accepted iff `d0 < ratio_threshold * d1`.
    pub ratio_threshold: f32,
    /// Keep at most one match per corpus descriptor, the closest one.
    pub unique_targets: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            k: 2,
            ratio_threshold: 0.7,
            unique_targets: true,
        }
    }
}

#[inline]
fn squared_l2<const N: usize>(a: &[f32; N], b: &[f32; N]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum()
}

/// Brute-force k-nearest-neighbor search under the Euclidean distance.
///
/// # Arguments
///
/// * `query` - The descriptors to look up.
/// * `corpus` - The descriptors searched into.
/// * `k` - The maximum number of neighbors per query.
///
/// # Returns
///
/// One list per query descriptor, in query order, holding up to `k` neighbors sorted by
/// ascending distance. Lists are shorter than `k` when the corpus is smaller than `k`.
/// Equal distances are ordered by lower corpus index.
pub fn knn_search<const N: usize>(
    query: &[[f32; N]],
    corpus: &[[f32; N]],
    k: usize,
) -> Vec<Vec<Neighbor>> {
    let k = k.min(corpus.len());

    query
        .par_iter()
        .map(|q| {
            if k == 0 {
                return Vec::new();
            }

            // (squared distance, index) kept sorted, the worst at the end
            let mut best: Vec<(f32, usize)> = Vec::with_capacity(k + 1);

            for (j, c) in corpus.iter().enumerate() {
                let d = squared_l2(q, c);
                if best.len() == k && d >= best[k - 1].0 {
                    continue;
                }
                let pos = best.partition_point(|&(bd, _)| bd <= d);
                best.insert(pos, (d, j));
                best.truncate(k);
            }

            best.into_iter()
                .map(|(d, index)| Neighbor {
                    index,
                    distance: d.sqrt(),
                })
                .collect()
        })
        .collect()
}

/// Filter nearest neighbors with Lowe's ratio test.
///
/// A query with at least two neighbors is accepted iff the closest neighbor distance is
/// strictly smaller than `ratio` times the second closest. Queries with fewer than two
/// neighbors are skipped. The output keeps the query order.
pub fn ratio_test(neighbors: &[Vec<Neighbor>], ratio: f32) -> Vec<Match> {
    neighbors
        .iter()
        .enumerate()
        .filter_map(|(query_idx, nn)| match nn.as_slice() {
            [first, second, ..] if first.distance < ratio * second.distance => Some(Match {
                query_idx,
                train_idx: first.index,
                distance: first.distance,
            }),
            _ => None,
        })
        .collect()
}

/// Keep a single match per corpus descriptor.
///
/// When several matches point to the same corpus descriptor only the closest survives,
/// equal distances going to the lower query index. The output keeps the query order.
pub fn unique_matches(matches: &[Match]) -> Vec<Match> {
    let mut winner: HashMap<usize, Match> = HashMap::new();
    for m in matches {
        winner
            .entry(m.train_idx)
            .and_modify(|w| {
                if m.distance < w.distance
                    || (m.distance == w.distance && m.query_idx < w.query_idx)
                {
                    *w = *m;
                }
            })
            .or_insert(*m);
    }

    let mut kept: Vec<Match> = winner.into_values().collect();
    kept.sort_by_key(|m| m.query_idx);
    kept
}

/// Match query descriptors against a corpus.
///
/// Runs the k-nearest-neighbor search, the ratio test and, if enabled, the one match per
/// corpus descriptor resolution. The result holds at most
/// `min(query.len(), corpus.len())` matches sorted by query index.
///
/// # Example
///
/// ```
/// use stencil_imgproc::matching::{match_descriptors, MatchConfig};
///
/// let query = [[0.0f32, 0.01]];
/// let corpus = [[0.0f32, 0.0], [10.0, 0.0]];
///
/// let matches = match_descriptors(&query, &corpus, &MatchConfig::default());
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].train_idx, 0);
/// ```
pub fn match_descriptors<const N: usize>(
    query: &[[f32; N]],
    corpus: &[[f32; N]],
    config: &MatchConfig,
) -> Vec<Match> {
    if query.is_empty() || corpus.is_empty() {
        return Vec::new();
    }

    let neighbors = knn_search(query, corpus, config.k);
    let matches = ratio_test(&neighbors, config.ratio_threshold);

    let matches = if config.unique_targets {
        unique_matches(&matches)
    } else {
        matches
    };

    log::debug!(
        "{} of {} query descriptors matched against {} corpus descriptors",
        matches.len(),
        query.len(),
        corpus.len()
    );

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Descriptor, DESCRIPTOR_SIZE};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn descriptor(values: &[f32]) -> Descriptor {
        let mut d = [0.0; DESCRIPTOR_SIZE];
        d[..values.len()].copy_from_slice(values);
        d
    }

    /// 50 target descriptors grouped in pairs `t` and `t + v`, each template descriptor
    /// sitting at 0.01 from its own target and `sqrt(0.01^2 + |v|^2)` from the decoy.
    fn paired_sets(decoy_distance: f32) -> (Vec<Descriptor>, Vec<Descriptor>) {
        let v = (decoy_distance * decoy_distance - 0.01 * 0.01).sqrt();
        let mut templates = Vec::new();
        let mut targets = Vec::new();
        for pair in 0..25 {
            let cluster = 100.0 * pair as f32;
            for offset in [0.0, v] {
                targets.push(descriptor(&[0.0, offset, cluster]));
                templates.push(descriptor(&[0.01, offset, cluster]));
            }
        }
        (templates, targets)
    }

    fn random_set(n: usize, seed: u64) -> Vec<[f32; 8]> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| std::array::from_fn(|_| rng.random::<f32>()))
            .collect()
    }

    #[test]
    fn test_knn_search_order() {
        let query = [[0.0f32, 0.0]];
        let corpus = [[3.0f32, 0.0], [1.0, 0.0], [2.0, 0.0]];
        let nn = knn_search(&query, &corpus, 2);
        assert_eq!(nn.len(), 1);
        assert_eq!(nn[0].len(), 2);
        assert_eq!(nn[0][0].index, 1);
        assert_eq!(nn[0][1].index, 2);
        assert_relative_eq!(nn[0][0].distance, 1.0);
        assert_relative_eq!(nn[0][1].distance, 2.0);
    }

    #[test]
    fn test_knn_search_ties_lower_index() {
        let query = [[0.0f32, 0.0]];
        let corpus = [[0.0f32, 1.0], [1.0, 0.0], [0.0, -1.0]];
        let nn = knn_search(&query, &corpus, 2);
        assert_eq!(nn[0][0].index, 0);
        assert_eq!(nn[0][1].index, 1);
    }

    #[test]
    fn test_knn_search_small_corpus() {
        let query = [[0.0f32], [1.0]];
        let nn = knn_search(&query, &[[0.5f32]], 2);
        assert_eq!(nn.len(), 2);
        assert!(nn.iter().all(|n| n.len() == 1));

        let nn = knn_search(&query, &[], 2);
        assert!(nn.iter().all(|n| n.is_empty()));
    }

    #[test]
    fn test_ratio_test_skips_single_neighbor() {
        let neighbors = vec![
            vec![Neighbor {
                index: 0,
                distance: 0.1,
            }],
            vec![
                Neighbor {
                    index: 1,
                    distance: 0.1,
                },
                Neighbor {
                    index: 0,
                    distance: 1.0,
                },
            ],
        ];
        let matches = ratio_test(&neighbors, 0.7);
        assert_eq!(
            matches,
            vec![Match {
                query_idx: 1,
                train_idx: 1,
                distance: 0.1,
            }]
        );
    }

    #[test]
    fn test_ratio_test_strict() {
        let neighbors = vec![vec![
            Neighbor {
                index: 0,
                distance: 0.5,
            },
            Neighbor {
                index: 1,
                distance: 1.0,
            },
        ]];
        assert!(ratio_test(&neighbors, 0.5).is_empty());
        assert_eq!(ratio_test(&neighbors, 0.51).len(), 1);
    }

    #[test]
    fn test_distant_decoy_accepts_all() {
        let (templates, targets) = paired_sets(10.0);
        let matches = match_descriptors(&templates, &targets, &MatchConfig::default());
        assert_eq!(matches.len(), 50);
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(m.query_idx, i);
            assert_eq!(m.train_idx, i);
            assert_relative_eq!(m.distance, 0.01, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_close_decoy_rejects_all() {
        let (templates, targets) = paired_sets(0.012);
        let matches = match_descriptors(&templates, &targets, &MatchConfig::default());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_ratio_monotonicity() {
        let query = random_set(200, 1);
        let corpus = random_set(150, 2);
        for unique_targets in [false, true] {
            let mut previous = 0;
            for ratio in [0.1, 0.3, 0.5, 0.7, 0.8, 0.9, 1.0] {
                let config = MatchConfig {
                    ratio_threshold: ratio,
                    unique_targets,
                    ..Default::default()
                };
                let count = match_descriptors(&query, &corpus, &config).len();
                assert!(count >= previous, "ratio {ratio}: {count} < {previous}");
                previous = count;
            }
        }
    }

    #[test]
    fn test_match_exclusivity_and_count_bound() {
        // many queries competing for a handful of corpus descriptors
        let query = random_set(300, 3);
        let corpus = random_set(12, 4);
        let config = MatchConfig {
            ratio_threshold: 1.0,
            ..Default::default()
        };
        let matches = match_descriptors(&query, &corpus, &config);

        assert!(matches.len() <= query.len().min(corpus.len()));
        let mut query_ids: Vec<_> = matches.iter().map(|m| m.query_idx).collect();
        query_ids.dedup();
        assert_eq!(query_ids.len(), matches.len());
        let mut train_ids: Vec<_> = matches.iter().map(|m| m.train_idx).collect();
        train_ids.sort();
        train_ids.dedup();
        assert_eq!(train_ids.len(), matches.len());
    }

    #[test]
    fn test_unique_matches_closest_wins() {
        let matches = [
            Match {
                query_idx: 0,
                train_idx: 4,
                distance: 0.3,
            },
            Match {
                query_idx: 1,
                train_idx: 4,
                distance: 0.2,
            },
            Match {
                query_idx: 2,
                train_idx: 4,
                distance: 0.2,
            },
            Match {
                query_idx: 3,
                train_idx: 1,
                distance: 0.5,
            },
        ];
        let kept = unique_matches(&matches);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].query_idx, 1);
        assert_eq!(kept[1].query_idx, 3);
    }

    #[test]
    fn test_degenerate_corpus() {
        let query = random_set(10, 5);
        assert!(match_descriptors(&query, &[], &MatchConfig::default()).is_empty());
        assert!(match_descriptors::<8>(&[], &query, &MatchConfig::default()).is_empty());
        // a single corpus descriptor never yields two neighbors
        assert!(match_descriptors(&query, &query[..1], &MatchConfig::default()).is_empty());
    }

    #[test]
    fn test_match_descriptors_deterministic() {
        let query = random_set(120, 6);
        let corpus = random_set(90, 7);
        let config = MatchConfig {
            ratio_threshold: 0.9,
            ..Default::default()
        };
        let first = match_descriptors(&query, &corpus, &config);
        let second = match_descriptors(&query, &corpus, &config);
        assert_eq!(first, second);
    }
}
