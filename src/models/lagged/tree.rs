//! Greedy regression tree shared by the bagged and boosted ensembles.
//!
//! Trees are grown on first/second order statistics `(g_i, h_i)` per sample.
//! A leaf predicts `-G / (H + lambda)` and a split is scored with
//! `G_L^2/(H_L+lambda) + G_R^2/(H_R+lambda) - G^2/(H+lambda)`.
//! With `g_i = -y_i`, `h_i = 1` and `lambda = 0` this reduces to a plain
//! least-squares CART tree whose leaves hold the mean label.

/// Growth limits and regularisation for one tree.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Maximum depth (None grows until leaves are pure or too small).
    pub max_depth: Option<usize>,
    /// Minimum number of samples a node needs to be considered for a split.
    pub min_samples_split: usize,
    /// Minimum number of samples in each child.
    pub min_samples_leaf: usize,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    /// Minimum loss reduction required to split.
    pub gamma: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            lambda: 0.0,
            gamma: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// A fitted regression tree stored as a flat node arena.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Grower<'a> {
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    config: &'a TreeConfig,
    nodes: Vec<Node>,
}

impl<'a> Grower<'a> {
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.lambda;
        if denom > 0.0 {
            -g / denom
        } else {
            0.0
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.lambda;
        if denom > 0.0 {
            g * g / denom
        } else {
            0.0
        }
    }

    fn best_split(&self, samples: &[usize], g_total: f64, h_total: f64) -> Option<Candidate> {
        let n_features = self.features[samples[0]].len();
        let parent = self.score(g_total, h_total);
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<Candidate> = None;
        let mut order = samples.to_vec();

        for feature in 0..n_features {
            order.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let i = order[k];
                g_left += self.gradients[i];
                h_left += self.hessians[i];

                let here = self.features[i][feature];
                let next = self.features[order[k + 1]][feature];
                if here == next {
                    continue;
                }
                let n_left = k + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let (g_right, h_right) = (g_total - g_left, h_total - h_left);
                if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent)
                    - self.config.gamma;
                if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let g: f64 = samples.iter().map(|&i| self.gradients[i]).sum();
        let h: f64 = samples.iter().map(|&i| self.hessians[i]).sum();
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(g, h),
        });

        let depth_left = self.config.max_depth.map_or(true, |max| depth < max);
        if !depth_left || samples.len() < self.config.min_samples_split.max(2) {
            return id;
        }

        let Some(split) = self.best_split(&samples, g, h) else {
            return id;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.features[i][split.feature] <= split.threshold);
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `samples` (repeats allowed).
    ///
    /// `features` rows must all have the same width; `gradients` and
    /// `hessians` are indexed like `features`.
    pub fn fit(
        features: &[Vec<f64>],
        gradients: &[f64],
        hessians: &[f64],
        samples: Vec<usize>,
        config: &TreeConfig,
    ) -> Self {
        let mut grower = Grower {
            features,
            gradients,
            hessians,
            config,
            nodes: Vec::new(),
        };
        if samples.is_empty() {
            return Self {
                nodes: vec![Node::Leaf { value: 0.0 }],
            };
        }
        grower.grow(samples, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    /// Least-squares tree on labels directly (leaves hold mean labels).
    pub fn fit_least_squares(
        features: &[Vec<f64>],
        targets: &[f64],
        samples: Vec<usize>,
        config: &TreeConfig,
    ) -> Self {
        let gradients: Vec<f64> = targets.iter().map(|y| -y).collect();
        let hessians = vec![1.0; targets.len()];
        let config = TreeConfig {
            lambda: 0.0,
            ..config.clone()
        };
        Self::fit(features, &gradients, &hessians, samples, &config)
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}
