//! Partition a point set into a small number of geographic clusters.
//!
//! Hierarchical methods build the full merge tree and cut it at `k`
//! components: the merges form a spanning tree over the points, so applying
//! its `n − k` lowest merges through a union-find always leaves exactly `k`
//! clusters.

use crate::error::{PlanError, Result};
use crate::problem::Coord;
use log::debug;
use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Upper bound on Lloyd iterations for k-means.
pub const KMEANS_MAX_ITERATIONS: usize = 300;

/// Clustering algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMethod {
    /// Agglomerative clustering minimizing within-cluster variance
    #[default]
    Ward,
    /// Agglomerative clustering on the closest pair between clusters
    Single,
    /// Lloyd's algorithm with k-means++ seeding
    KMeans,
}

impl fmt::Display for ClusterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterMethod::Ward => "ward",
            ClusterMethod::Single => "single",
            ClusterMethod::KMeans => "kmeans",
        };
        f.write_str(name)
    }
}

impl FromStr for ClusterMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ward" => Ok(ClusterMethod::Ward),
            "single" => Ok(ClusterMethod::Single),
            "kmeans" | "k-means" => Ok(ClusterMethod::KMeans),
            other => Err(format!(
                "unknown cluster method `{}` (expected ward, single or kmeans)",
                other
            )),
        }
    }
}

/// One group of points.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Member point indices and their coordinates
    pub members: BTreeMap<usize, Coord>,
    /// Arithmetic mean of the member coordinates
    pub centroid: Coord,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The result of clustering a point set.
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Cluster id of every input point
    pub labels: Vec<usize>,
    /// Clusters indexed by id
    pub clusters: Vec<Cluster>,
}

impl Clustering {
    /// Centroids indexed by cluster id.
    pub fn centroids(&self) -> Vec<Coord> {
        self.clusters.iter().map(|cluster| cluster.centroid).collect()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Group points by label; ids are numbered by first appearance.
    fn from_raw_labels(coords: &[Coord], raw: &[usize]) -> Self {
        let mut renumber: BTreeMap<usize, usize> = BTreeMap::new();
        let mut labels = Vec::with_capacity(raw.len());
        let mut clusters: Vec<BTreeMap<usize, Coord>> = Vec::new();

        for (point, &raw_label) in raw.iter().enumerate() {
            let next_id = renumber.len();
            let id = *renumber.entry(raw_label).or_insert(next_id);
            if id == clusters.len() {
                clusters.push(BTreeMap::new());
            }
            clusters[id].insert(point, coords[point]);
            labels.push(id);
        }

        let clusters = clusters
            .into_iter()
            .map(|members| {
                let centroid = Coord::mean(members.values()).unwrap_or(Coord::new(0.0, 0.0));
                Cluster { members, centroid }
            })
            .collect();

        Clustering { labels, clusters }
    }
}

/// Partition `coords` into `k` clusters.
pub fn cluster_points(
    coords: &[Coord],
    k: usize,
    method: ClusterMethod,
    seed: u64,
) -> Result<Clustering> {
    let n = coords.len();
    if n == 0 {
        return Err(PlanError::invalid("cannot cluster an empty point set"));
    }
    if k == 0 || k > n {
        return Err(PlanError::invalid(format!(
            "cluster count must be within 1..={}, got {}",
            n, k
        )));
    }

    let start_time = Instant::now();
    let raw = match method {
        ClusterMethod::Ward => cut_merges(n, k, ward_merges(coords)),
        ClusterMethod::Single => cut_merges(n, k, single_linkage_merges(coords)),
        ClusterMethod::KMeans => kmeans_labels(coords, k, seed),
    };
    let clustering = Clustering::from_raw_labels(coords, &raw);

    debug!(
        "{} clustering of {} points into {} clusters took {:?}",
        method,
        n,
        clustering.len(),
        start_time.elapsed()
    );

    Ok(clustering)
}

/// A merge between the clusters represented by two points.
#[derive(Debug, Clone, Copy)]
struct Merge {
    a: usize,
    b: usize,
    height: f64,
}

/// Apply the `n − k` lowest merges and label each point by its component.
fn cut_merges(n: usize, k: usize, mut merges: Vec<Merge>) -> Vec<usize> {
    merges.sort_by(|x, y| x.height.total_cmp(&y.height));

    let mut components = UnionFind::<usize>::new(n);
    for merge in merges.iter().take(n - k) {
        components.union(merge.a, merge.b);
    }

    (0..n).map(|point| components.find(point)).collect()
}

/// Position of the pair `i < j` in a condensed upper-triangular matrix.
fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    i * n - i * (i + 1) / 2 + (j - i - 1)
}

/// Ward merges by the nearest-neighbour chain algorithm.
///
/// Dissimilarities are squared Euclidean distances updated with the
/// Lance–Williams formula. Ward linkage is reducible, so reciprocal nearest
/// neighbours can be merged as soon as they are found.
fn ward_merges(coords: &[Coord]) -> Vec<Merge> {
    let n = coords.len();
    if n < 2 {
        return Vec::new();
    }

    let mut dissimilarity = vec![0.0; n * (n - 1) / 2];
    for i in 0..n {
        for j in (i + 1)..n {
            dissimilarity[condensed_index(n, i, j)] = coords[i].squared_distance(&coords[j]);
        }
    }

    let mut size = vec![1usize; n];
    let mut active = vec![true; n];
    let mut remaining = n;
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges = Vec::with_capacity(n - 1);

    while remaining > 1 {
        if chain.is_empty() {
            if let Some(first) = active.iter().position(|&alive| alive) {
                chain.push(first);
            }
        }

        // Grow the chain until its last two entries are mutual nearest neighbours
        let (a, b) = loop {
            let Some(&tip) = chain.last() else {
                return merges;
            };
            let previous = chain.len().checked_sub(2).map(|pos| chain[pos]);

            let mut nearest = previous;
            let mut nearest_dist = previous.map_or(f64::INFINITY, |p| {
                dissimilarity[condensed_index(n, tip, p)]
            });
            for other in 0..n {
                if other == tip || !active[other] {
                    continue;
                }
                let d = dissimilarity[condensed_index(n, tip, other)];
                if d < nearest_dist {
                    nearest_dist = d;
                    nearest = Some(other);
                }
            }

            match nearest {
                Some(next) if Some(next) == previous => break (tip, next),
                Some(next) => chain.push(next),
                None => return merges,
            }
        };

        chain.truncate(chain.len() - 2);
        let d_ab = dissimilarity[condensed_index(n, a, b)];
        merges.push(Merge {
            a,
            b,
            height: d_ab,
        });

        // The merged cluster lives on in slot `a`
        let (size_a, size_b) = (size[a] as f64, size[b] as f64);
        for other in 0..n {
            if other == a || other == b || !active[other] {
                continue;
            }
            let size_o = size[other] as f64;
            let d_ao = dissimilarity[condensed_index(n, a, other)];
            let d_bo = dissimilarity[condensed_index(n, b, other)];
            dissimilarity[condensed_index(n, a, other)] = ((size_a + size_o) * d_ao
                + (size_b + size_o) * d_bo
                - size_o * d_ab)
                / (size_a + size_b + size_o);
        }

        size[a] += size[b];
        active[b] = false;
        remaining -= 1;
    }

    merges
}

/// Single-linkage merges: the edges of a minimum spanning tree.
fn single_linkage_merges(coords: &[Coord]) -> Vec<Merge> {
    let n = coords.len();
    let mut graph = UnGraph::<usize, f64>::with_capacity(n, n * n.saturating_sub(1) / 2);
    let nodes: Vec<_> = (0..n).map(|point| graph.add_node(point)).collect();

    for i in 0..n {
        for j in (i + 1)..n {
            graph.add_edge(nodes[i], nodes[j], coords[i].distance(&coords[j]));
        }
    }

    min_spanning_tree(&graph)
        .filter_map(|element| match element {
            Element::Edge {
                source,
                target,
                weight,
            } => Some(Merge {
                a: source,
                b: target,
                height: weight,
            }),
            Element::Node { .. } => None,
        })
        .collect()
}

/// Lloyd's algorithm with k-means++ seeding; every cluster ends non-empty.
fn kmeans_labels(coords: &[Coord], k: usize, seed: u64) -> Vec<usize> {
    let n = coords.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centers = kmeans_plus_plus(coords, k, &mut rng);
    let mut labels = vec![usize::MAX; n];

    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (point, coord) in coords.iter().enumerate() {
            let nearest = nearest_center(coord, &centers);
            if labels[point] != nearest {
                labels[point] = nearest;
                changed = true;
            }
        }

        fill_empty_clusters(coords, &mut labels, &centers, k);

        for (cluster, center) in centers.iter_mut().enumerate() {
            let members = coords
                .iter()
                .zip(&labels)
                .filter(|(_, &label)| label == cluster)
                .map(|(coord, _)| coord);
            if let Some(mean) = Coord::mean(members) {
                *center = mean;
            }
        }

        if !changed {
            break;
        }
    }

    labels
}

fn kmeans_plus_plus<R: Rng>(coords: &[Coord], k: usize, rng: &mut R) -> Vec<Coord> {
    let n = coords.len();
    let mut chosen = vec![rng.gen_range(0..n)];

    while chosen.len() < k {
        let weights: Vec<f64> = coords
            .iter()
            .map(|coord| {
                chosen
                    .iter()
                    .map(|&c| coord.squared_distance(&coords[c]))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let pick = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (point, &weight) in weights.iter().enumerate() {
                if target < weight {
                    pick = point;
                    break;
                }
                target -= weight;
            }
            pick
        } else {
            // Every point coincides with a center already
            (0..n).find(|point| !chosen.contains(point)).unwrap_or(0)
        };
        chosen.push(pick);
    }

    chosen.into_iter().map(|point| coords[point]).collect()
}

fn nearest_center(coord: &Coord, centers: &[Coord]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (cluster, center) in centers.iter().enumerate() {
        let d = coord.squared_distance(center);
        if d < best_dist {
            best_dist = d;
            best = cluster;
        }
    }
    best
}

/// Move the worst-fitting point of a shared cluster into each empty cluster.
fn fill_empty_clusters(coords: &[Coord], labels: &mut [usize], centers: &[Coord], k: usize) {
    loop {
        let mut counts = vec![0usize; k];
        for &label in labels.iter() {
            counts[label] += 1;
        }
        let Some(empty) = counts.iter().position(|&count| count == 0) else {
            return;
        };

        let donor = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| counts[label] > 1)
            .max_by(|(a, &la), (b, &lb)| {
                coords[*a]
                    .squared_distance(&centers[la])
                    .total_cmp(&coords[*b].squared_distance(&centers[lb]))
            })
            .map(|(point, _)| point);

        match donor {
            Some(point) => labels[point] = empty,
            None => return,
        }
    }
}
