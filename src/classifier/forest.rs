//! Decision forest classifier loaded from a JSON artifact.
//!
//! The artifact is a JSON object whose `"model"` key holds the ensemble; other keys are ignored:
//!
//! ```json
//! {
//!   "model": {
//!     "n_features": 84,
//!     "classes": [0, 1, 2],
//!     "trees": [
//!       {
//!         "children_left":  [1, -1, -1],
//!         "children_right": [2, -1, -1],
//!         "feature":        [0, -2, -2],
//!         "threshold":      [0.25, -2.0, -2.0],
//!         "value":          [[4, 4, 2], [4, 0, 0], [0, 4, 2]]
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! Trees use the array layout of a fitted scikit-learn `tree_`: node `0` is the root, a node is a
//! leaf when its `children_left` entry is `-1`, and a sample goes left when
//! `x[feature] <= threshold`. `value` holds per-class weights (counts or fractions) for every node.

use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use super::{Classifier, LabelTable};
use crate::features::{FeatureVector, FEATURE_LEN};

const LEAF: i64 = -1;

/// Reasons a classifier artifact is rejected.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("malformed classifier artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("classifier has no trees")]
    NoTrees,

    #[error("classifier has no classes")]
    NoClasses,

    #[error("classifier expects {found} features, but {expected} are extracted")]
    FeatureCount { expected: usize, found: usize },

    #[error("class {0} has no entry in the label table")]
    UnknownClass(usize),

    #[error("tree {tree} is empty")]
    EmptyTree { tree: usize },

    #[error("tree {tree}: node arrays have different lengths")]
    ArrayLengths { tree: usize },

    #[error("tree {tree}, node {node}: child {child} is out of bounds or not after its parent")]
    BadChild { tree: usize, node: usize, child: i64 },

    #[error("tree {tree}, node {node}: feature {feature} is out of bounds")]
    BadFeature { tree: usize, node: usize, feature: i64 },

    #[error("tree {tree}, node {node}: leaf holds {found} class weights, expected {expected}")]
    LeafLength {
        tree: usize,
        node: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Deserialize)]
struct Artifact {
    model: Ensemble,
}

#[derive(Deserialize)]
struct Ensemble {
    n_features: usize,
    classes: Vec<usize>,
    trees: Vec<RawTree>,
}

#[derive(Deserialize)]
struct RawTree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Normalized class distribution.
    Leaf(Box<[f64]>),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_raw(index: usize, raw: RawTree, num_classes: usize) -> Result<Self, ArtifactError> {
        let len = raw.children_left.len();
        if len == 0 {
            return Err(ArtifactError::EmptyTree { tree: index });
        }
        if [
            raw.children_right.len(),
            raw.feature.len(),
            raw.threshold.len(),
            raw.value.len(),
        ]
        .iter()
        .any(|&l| l != len)
        {
            return Err(ArtifactError::ArrayLengths { tree: index });
        }

        // Children must come after their parent, which rules out cycles.
        let child = |node: usize, child: i64| match usize::try_from(child) {
            Ok(c) if c > node && c < len => Ok(c),
            _ => Err(ArtifactError::BadChild {
                tree: index,
                node,
                child,
            }),
        };

        let mut nodes = Vec::with_capacity(len);
        for (node, value) in raw.value.into_iter().enumerate() {
            let (left, right) = (raw.children_left[node], raw.children_right[node]);
            if left == LEAF && right == LEAF {
                if value.len() != num_classes {
                    return Err(ArtifactError::LeafLength {
                        tree: index,
                        node,
                        expected: num_classes,
                        found: value.len(),
                    });
                }
                nodes.push(Node::Leaf(normalize(value)));
                continue;
            }

            let feature = raw.feature[node];
            let feature = match usize::try_from(feature) {
                Ok(f) if f < FEATURE_LEN => f,
                _ => {
                    return Err(ArtifactError::BadFeature {
                        tree: index,
                        node,
                        feature,
                    })
                }
            };
            nodes.push(Node::Split {
                feature,
                threshold: raw.threshold[node],
                left: child(node, left)?,
                right: child(node, right)?,
            });
        }

        Ok(Self { nodes })
    }

    fn leaf(&self, features: &[f32]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if f64::from(features[*feature]) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf(dist) => return dist,
            }
        }
    }
}

fn normalize(mut weights: Vec<f64>) -> Box<[f64]> {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        weights.iter_mut().for_each(|w| *w /= sum);
    }
    weights.into_boxed_slice()
}

/// An ensemble of decision trees voting with their averaged leaf distributions.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    classes: Vec<usize>,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    /// Loads and validates a classifier artifact from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P, labels: &LabelTable) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read classifier from '{}'", path.display()))?;
        let forest = Self::from_json(&json, labels)
            .with_context(|| format!("failed to load classifier from '{}'", path.display()))?;
        log::debug!(
            "loaded classifier with {} trees and {} classes from '{}'",
            forest.trees.len(),
            forest.classes.len(),
            path.display()
        );
        Ok(forest)
    }

    /// Parses and validates a classifier artifact.
    ///
    /// Every class the classifier can output must be present in `labels`.
    pub fn from_json(json: &str, labels: &LabelTable) -> Result<Self, ArtifactError> {
        let Artifact { model } = serde_json::from_str(json)?;

        if model.trees.is_empty() {
            return Err(ArtifactError::NoTrees);
        }
        if model.classes.is_empty() {
            return Err(ArtifactError::NoClasses);
        }
        if model.n_features != FEATURE_LEN {
            return Err(ArtifactError::FeatureCount {
                expected: FEATURE_LEN,
                found: model.n_features,
            });
        }
        if let Some(&class) = model.classes.iter().find(|&&c| labels.get(c).is_none()) {
            return Err(ArtifactError::UnknownClass(class));
        }

        let num_classes = model.classes.len();
        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Tree::from_raw(i, raw, num_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            classes: model.classes,
            trees,
        })
    }

    /// Returns the averaged class distribution for `features`, in the order of the artifact's
    /// `classes`.
    pub fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf(features)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }
}

impl Classifier for ForestClassifier {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<usize> {
        let proba = self.predict_proba(features);
        // Ties resolve to the first class.
        let best = proba
            .iter()
            .enumerate()
            .rev()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .context("classifier has no classes")?;
        Ok(self.classes[best])
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    /// One stump splitting on feature 0 at 0.25: left -> class 0 ('A'), right -> mostly class 1.
    const STUMP: &str = r#"{
        "model": {
            "n_features": 84,
            "classes": [0, 1, 2],
            "trees": [{
                "children_left":  [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature":        [0, -2, -2],
                "threshold":      [0.25, -2.0, -2.0],
                "value":          [[4, 4, 2], [4, 0, 0], [0, 4, 2]]
            }]
        },
        "labels": "ignored"
    }"#;

    fn stump() -> ForestClassifier {
        ForestClassifier::from_json(STUMP, &LabelTable::asl()).unwrap()
    }

    fn features(first: f32) -> FeatureVector {
        FeatureVector::from_values([first])
    }

    #[test]
    fn split_goes_left_on_equal() {
        let forest = stump();
        assert_eq!(forest.predict(&features(0.25)).unwrap(), 0);
        assert_eq!(forest.predict(&features(0.0)).unwrap(), 0);
        assert_eq!(forest.predict(&features(0.3)).unwrap(), 1);
    }

    #[test]
    fn leaf_distributions_are_normalized() {
        let proba = stump().predict_proba(&features(1.0));
        assert_eq!(proba.len(), 3);
        approx::assert_relative_eq!(proba[1], 4.0 / 6.0);
        approx::assert_relative_eq!(proba.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn trees_are_averaged() {
        let json = r#"{"model": {"n_features": 84, "classes": [3, 7], "trees": [
            {"children_left": [-1], "children_right": [-1], "feature": [-2],
             "threshold": [-2.0], "value": [[1.0, 0.0]]},
            {"children_left": [-1], "children_right": [-1], "feature": [-2],
             "threshold": [-2.0], "value": [[0.0, 3.0]]},
            {"children_left": [-1], "children_right": [-1], "feature": [-2],
             "threshold": [-2.0], "value": [[0.0, 1.0]]}
        ]}}"#;
        let forest = ForestClassifier::from_json(json, &LabelTable::asl()).unwrap();
        assert_eq!(forest.predict(&features(0.0)).unwrap(), 7);
    }

    #[test]
    fn ties_resolve_to_first_class() {
        let json = r#"{"model": {"n_features": 84, "classes": [5, 2], "trees": [
            {"children_left": [-1], "children_right": [-1], "feature": [-2],
             "threshold": [-2.0], "value": [[2, 2]]}
        ]}}"#;
        let forest = ForestClassifier::from_json(json, &LabelTable::asl()).unwrap();
        assert_eq!(forest.predict(&features(0.0)).unwrap(), 5);
    }

    fn err(json: &str) -> ArtifactError {
        ForestClassifier::from_json(json, &LabelTable::asl()).unwrap_err()
    }

    #[test]
    fn rejects_malformed_artifacts() {
        assert!(matches!(err("not json"), ArtifactError::Json(_)));
        assert!(matches!(err(r#"{"classifier": {}}"#), ArtifactError::Json(_)));
        assert!(matches!(
            err(r#"{"model": {"n_features": 84, "classes": [0], "trees": []}}"#),
            ArtifactError::NoTrees
        ));

        let wrong_features = STUMP.replace("\"n_features\": 84", "\"n_features\": 42");
        assert!(matches!(
            err(&wrong_features),
            ArtifactError::FeatureCount { found: 42, .. }
        ));

        let unknown_class = STUMP.replace("[0, 1, 2]", "[0, 1, 26]");
        assert!(matches!(err(&unknown_class), ArtifactError::UnknownClass(26)));

        let no_classes = STUMP.replace("[0, 1, 2]", "[]");
        assert!(matches!(err(&no_classes), ArtifactError::NoClasses));
    }

    #[test]
    fn rejects_broken_trees() {
        let cycle = STUMP.replace("[1, -1, -1]", "[0, -1, -1]");
        assert!(matches!(
            err(&cycle),
            ArtifactError::BadChild {
                tree: 0,
                node: 0,
                child: 0
            }
        ));

        let dangling = STUMP.replace("[2, -1, -1]", "[9, -1, -1]");
        assert!(matches!(err(&dangling), ArtifactError::BadChild { child: 9, .. }));

        let bad_feature = STUMP.replace("[0, -2, -2]", "[84, -2, -2]");
        assert!(matches!(
            err(&bad_feature),
            ArtifactError::BadFeature { feature: 84, .. }
        ));

        let short_leaf = STUMP.replace("[4, 0, 0]", "[4, 0]");
        assert!(matches!(
            err(&short_leaf),
            ArtifactError::LeafLength {
                node: 1,
                expected: 3,
                found: 2,
                ..
            }
        ));

        let short_array = STUMP.replace("[0.25, -2.0, -2.0]", "[0.25, -2.0]");
        assert!(matches!(err(&short_array), ArtifactError::ArrayLengths { tree: 0 }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(STUMP.as_bytes()).unwrap();

        let forest = ForestClassifier::load(file.path(), &LabelTable::asl()).unwrap();
        assert_eq!(forest.predict(&features(0.0)).unwrap(), 0);

        let missing = ForestClassifier::load("/nonexistent/model.json", &LabelTable::asl());
        assert!(missing.is_err());
    }
}
