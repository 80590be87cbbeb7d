// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Exhaustive descriptor matching with ratio test and cross check.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::dfn::{Dfn, FeaturesMatching2D};
use crate::core::types::{CorrespondenceMap2D, VisualPointFeatureVector2D};
use crate::error::{Error, Result};
use crate::misc::config::{self, Validate};
use crate::misc::type_aliases::Float;

/// Parameters of the brute force matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherParameters {
    /// Best distance must be below `ratio` times the second best.
    pub ratio: Float,
    /// Keep a match only if the source is also the best match of the sink.
    pub cross_check: bool,
    /// Maximum descriptor distance of a match.
    pub max_distance: Option<Float>,
}

impl Default for MatcherParameters {
    fn default() -> Self {
        Self {
            ratio: 0.8,
            cross_check: true,
            max_distance: None,
        }
    }
}

impl Validate for MatcherParameters {
    fn validate(&self) -> Result<()> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "matcher ratio must be in ]0, 1], got {}",
                self.ratio
            )));
        }
        match self.max_distance {
            Some(d) if !(d >= 0.0) => Err(Error::InvalidConfiguration(format!(
                "matcher max distance must be positive, got {}",
                d
            ))),
            _ => Ok(()),
        }
    }
}

/// Brute force matcher on the L2 distance of descriptors.
///
/// Keypoints without descriptor are never matched.
#[derive(Debug, Default)]
pub struct BruteForceMatcher {
    configuration_file: Option<PathBuf>,
    /// Current parameters.
    pub parameters: MatcherParameters,
    source: VisualPointFeatureVector2D,
    sink: VisualPointFeatureVector2D,
    matches: CorrespondenceMap2D,
}

impl BruteForceMatcher {
    /// Matcher with the given parameters.
    pub fn new(parameters: MatcherParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }
}

/// Index and distance of the nearest and second nearest candidates of `query`.
fn two_nearest(
    query: usize,
    queries: &VisualPointFeatureVector2D,
    candidates: &VisualPointFeatureVector2D,
) -> Option<((usize, Float), Float)> {
    let descriptor = queries.descriptor(query);
    if descriptor.is_empty() {
        return None;
    }
    let mut best: Option<(usize, Float)> = None;
    let mut second = std::f32::INFINITY;
    for (index, feature) in candidates.features().iter().enumerate() {
        if feature.descriptor.len() != descriptor.len() {
            continue;
        }
        let distance = descriptor.squared_distance(&feature.descriptor).sqrt();
        match best {
            Some((_, d)) if distance >= d => second = second.min(distance),
            _ => {
                if let Some((_, d)) = best {
                    second = d;
                }
                best = Some((index, distance));
            }
        }
    }
    best.map(|b| (b, second))
}

/// Matches from `source` to `sink`, as `(source index, sink index, distance)`.
pub fn match_descriptors(
    source: &VisualPointFeatureVector2D,
    sink: &VisualPointFeatureVector2D,
    parameters: &MatcherParameters,
) -> Vec<(usize, usize, Float)> {
    let mut matches = Vec::new();
    for query in 0..source.len() {
        let ((found, distance), second) = match two_nearest(query, source, sink) {
            Some(nearest) => nearest,
            None => continue,
        };
        if second.is_finite() && !(distance < parameters.ratio * second) {
            continue;
        }
        if parameters.max_distance.map_or(false, |max| distance > max) {
            continue;
        }
        if parameters.cross_check {
            match two_nearest(found, sink, source) {
                Some(((back, _), _)) if back == query => {}
                _ => continue,
            }
        }
        matches.push((query, found, distance));
    }
    matches
}

impl Dfn for BruteForceMatcher {
    fn set_configuration_file(&mut self, file_path: &Path) {
        self.configuration_file = Some(file_path.to_path_buf());
    }

    fn configure(&mut self) -> Result<()> {
        config::reload(self.configuration_file.as_ref(), &mut self.parameters)
    }

    fn process(&mut self) {
        self.matches.clear();
        for (i, j, distance) in match_descriptors(&self.source, &self.sink, &self.parameters) {
            let probability = 1.0 / (1.0 + distance);
            self.matches
                .add(self.source.point(i), self.sink.point(j), probability);
        }
        tracing::debug!(
            "Matcher: {} matches between {} and {} features",
            self.matches.len(),
            self.source.len(),
            self.sink.len()
        );
    }
}

impl FeaturesMatching2D for BruteForceMatcher {
    fn source_features_input(&mut self, features: &VisualPointFeatureVector2D) {
        self.source.clone_from(features);
    }

    fn sink_features_input(&mut self, features: &VisualPointFeatureVector2D) {
        self.sink.clone_from(features);
    }

    fn matches_output(&self) -> &CorrespondenceMap2D {
        &self.matches
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::dfn::executor;
    use crate::misc::type_aliases::Point2;

    fn features(descriptors: &[&[Float]]) -> VisualPointFeatureVector2D {
        let mut features = VisualPointFeatureVector2D::new();
        for (i, d) in descriptors.iter().enumerate() {
            features
                .add_described_point(Point2::new(i as Float, 0.0), d)
                .unwrap();
        }
        features
    }

    #[test]
    fn unambiguous_matches() {
        let source = features(&[&[0.0, 0.0], &[10.0, 0.0], &[0.0, 10.0]]);
        let sink = features(&[&[0.0, 9.5], &[0.2, 0.0], &[10.0, 0.3]]);
        let matches = match_descriptors(&source, &sink, &MatcherParameters::default());
        let pairs: Vec<_> = matches.iter().map(|&(i, j, _)| (i, j)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 0)]);
    }

    #[test]
    fn ratio_test_rejects_ambiguous_matches() {
        let source = features(&[&[0.0, 0.0]]);
        let sink = features(&[&[1.0, 0.0], &[0.0, 1.05]]);
        assert!(match_descriptors(&source, &sink, &MatcherParameters::default()).is_empty());
        let loose = MatcherParameters {
            ratio: 1.0,
            ..MatcherParameters::default()
        };
        assert_eq!(match_descriptors(&source, &sink, &loose).len(), 1);
    }

    #[test]
    fn cross_check_rejects_one_sided_matches() {
        // Both sources prefer the single sink, which prefers source 1.
        let source = features(&[&[0.0, 0.0], &[1.0, 0.0]]);
        let sink = features(&[&[1.1, 0.0]]);
        let matches = match_descriptors(&source, &sink, &MatcherParameters::default());
        let pairs: Vec<_> = matches.iter().map(|&(i, j, _)| (i, j)).collect();
        assert_eq!(pairs, vec![(1, 0)]);
        let one_sided = MatcherParameters {
            cross_check: false,
            ..MatcherParameters::default()
        };
        assert_eq!(match_descriptors(&source, &sink, &one_sided).len(), 2);
    }

    #[test]
    fn max_distance_and_undescribed_points() {
        let source = features(&[&[0.0, 0.0]]);
        let sink = features(&[&[3.0, 4.0]]);
        let strict = MatcherParameters {
            max_distance: Some(4.9),
            ..MatcherParameters::default()
        };
        assert!(match_descriptors(&source, &sink, &strict).is_empty());
        let bare = VisualPointFeatureVector2D::from_points(vec![Point2::new(0.0, 0.0)]);
        assert!(match_descriptors(&bare, &bare, &MatcherParameters::default()).is_empty());
    }

    #[test]
    fn module_copies_the_pixel_coordinates() {
        let mut dfn = BruteForceMatcher::default();
        dfn.configure().unwrap();
        let source = features(&[&[0.0, 0.0], &[10.0, 0.0]]);
        let sink = features(&[&[10.0, 0.0], &[0.0, 0.0]]);
        let matches = executor::match_features_2d(&mut dfn, &source, &sink);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches.source(0), source.point(0));
        assert_eq!(matches.sink(0), sink.point(1));
        assert_eq!(matches.get(0).probability, 1.0);
    }
}
