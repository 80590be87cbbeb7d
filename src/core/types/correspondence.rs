// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Correspondence maps between two images (2D) or two point clouds (3D),
//! and the sequence of 3D maps between every camera pair of a window.

use crate::misc::helper::{is_valid_point2, is_valid_point3};
use crate::misc::type_aliases::{Float, Point2, Point3};

/// A matched pair of points with a confidence.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Correspondence<P> {
    /// Point in the source image / cloud.
    pub source: P,
    /// Point in the sink image / cloud.
    pub sink: P,
    /// Confidence of the match, usually in [0, 1].
    pub probability: Float,
}

/// Ordered list of correspondences.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrespondenceMap<P> {
    correspondences: Vec<Correspondence<P>>,
}

/// Matches between two images.
pub type CorrespondenceMap2D = CorrespondenceMap<Point2>;
/// Matches between two point clouds.
pub type CorrespondenceMap3D = CorrespondenceMap<Point3>;

impl<P> Default for CorrespondenceMap<P> {
    fn default() -> Self {
        Self {
            correspondences: Vec::new(),
        }
    }
}

impl<P: Copy> CorrespondenceMap<P> {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a correspondence.
    pub fn add(&mut self, source: P, sink: P, probability: Float) {
        self.correspondences.push(Correspondence {
            source,
            sink,
            probability,
        });
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.correspondences.len()
    }

    /// True if the map has no correspondence.
    pub fn is_empty(&self) -> bool {
        self.correspondences.is_empty()
    }

    /// Correspondence at `index`.
    pub fn get(&self, index: usize) -> &Correspondence<P> {
        &self.correspondences[index]
    }

    /// Source point at `index`.
    pub fn source(&self, index: usize) -> P {
        self.correspondences[index].source
    }

    /// Sink point at `index`.
    pub fn sink(&self, index: usize) -> P {
        self.correspondences[index].sink
    }

    /// Iterator over the correspondences in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Correspondence<P>> {
        self.correspondences.iter()
    }

    /// Remove every correspondence.
    pub fn clear(&mut self) {
        self.correspondences.clear();
    }
}

impl CorrespondenceMap2D {
    /// Correspondences whose two endpoints are valid, with their original index.
    pub fn valid(&self) -> impl Iterator<Item = (usize, &Correspondence<Point2>)> + '_ {
        self.iter()
            .enumerate()
            .filter(|(_, c)| is_valid_point2(&c.source) && is_valid_point2(&c.sink))
    }
}

impl CorrespondenceMap3D {
    /// Correspondences whose two endpoints are valid, with their original index.
    pub fn valid(&self) -> impl Iterator<Item = (usize, &Correspondence<Point3>)> + '_ {
        self.iter()
            .enumerate()
            .filter(|(_, c)| is_valid_point3(&c.source) && is_valid_point3(&c.sink))
    }
}

impl<'a, P> IntoIterator for &'a CorrespondenceMap<P> {
    type Item = &'a Correspondence<P>;
    type IntoIter = std::slice::Iter<'a, Correspondence<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.correspondences.iter()
    }
}

/// 3D correspondence maps between every pair of cameras of a window.
///
/// Cameras are counted in backward steps (0 is the most recent).
/// The map of pair `(source, sink)` with `source < sink` holds points
/// seen by camera `source` (as source) and by camera `sink` (as sink).
/// Maps are stored in the canonical order
/// `(0,1), (0,2), ..., (0,n-1), (1,2), ..., (n-2,n-1)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrespondenceMaps3DSequence {
    number_of_cameras: usize,
    maps: Vec<CorrespondenceMap3D>,
}

impl CorrespondenceMaps3DSequence {
    /// Sequence of empty maps for a window of `number_of_cameras` cameras.
    pub fn new(number_of_cameras: usize) -> Self {
        let number_of_maps = number_of_cameras * number_of_cameras.saturating_sub(1) / 2;
        Self {
            number_of_cameras,
            maps: vec![CorrespondenceMap3D::new(); number_of_maps],
        }
    }

    /// Number of cameras of the window.
    pub fn number_of_cameras(&self) -> usize {
        self.number_of_cameras
    }

    /// Number of maps, one per camera pair.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// True if there is no camera pair.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Position of the pair `(source, sink)` in the canonical order.
    ///
    /// # Panics
    ///
    /// If `source >= sink` or `sink >= number_of_cameras`.
    pub fn pair_index(&self, source: usize, sink: usize) -> usize {
        let n = self.number_of_cameras;
        assert!(
            source < sink && sink < n,
            "invalid camera pair ({}, {}) for {} cameras",
            source,
            sink,
            n
        );
        // Rows before `source` hold (n-1) + (n-2) + ... + (n-source) maps.
        source * (2 * n - source - 1) / 2 + (sink - source - 1)
    }

    /// Map of the pair `(source, sink)`.
    pub fn get(&self, source: usize, sink: usize) -> &CorrespondenceMap3D {
        &self.maps[self.pair_index(source, sink)]
    }

    /// Replace the map of the pair `(source, sink)`.
    pub fn set(&mut self, source: usize, sink: usize, map: CorrespondenceMap3D) {
        let index = self.pair_index(source, sink);
        self.maps[index] = map;
    }

    /// Iterator over `((source, sink), map)` in canonical order.
    pub fn pairs(&self) -> impl Iterator<Item = ((usize, usize), &CorrespondenceMap3D)> + '_ {
        let n = self.number_of_cameras;
        (0..n)
            .flat_map(move |source| (source + 1..n).map(move |sink| (source, sink)))
            .zip(self.maps.iter())
    }

    /// Sequence one step later: every camera moves one step back,
    /// a new camera 0 appears with empty maps, and pairs whose
    /// cameras fall outside `number_of_cameras` are dropped.
    pub fn shifted(&self, number_of_cameras: usize) -> Self {
        let mut next = Self::new(number_of_cameras);
        for ((source, sink), map) in self.pairs() {
            if sink + 1 < number_of_cameras {
                next.set(source + 1, sink + 1, map.clone());
            }
        }
        next
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    fn tagged(tag: f32) -> CorrespondenceMap3D {
        let mut map = CorrespondenceMap3D::new();
        map.add(Point3::new(tag, 0.0, 0.0), Point3::new(0.0, tag, 0.0), 1.0);
        map
    }

    #[test]
    fn canonical_pair_order() {
        let sequence = CorrespondenceMaps3DSequence::new(4);
        assert_eq!(sequence.len(), 6);
        let pairs: Vec<_> = sequence.pairs().map(|(pair, _)| pair).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        for (index, &(source, sink)) in pairs.iter().enumerate() {
            assert_eq!(sequence.pair_index(source, sink), index);
        }
    }

    #[test]
    #[should_panic]
    fn reversed_pair_is_rejected() {
        CorrespondenceMaps3DSequence::new(3).pair_index(2, 1);
    }

    #[test]
    fn shifting_drops_pairs_leaving_the_window() {
        let mut sequence = CorrespondenceMaps3DSequence::new(3);
        sequence.set(0, 1, tagged(1.0));
        sequence.set(0, 2, tagged(2.0));
        sequence.set(1, 2, tagged(3.0));
        let next = sequence.shifted(3);
        assert_eq!(next.get(1, 2), &tagged(1.0));
        assert!(next.get(0, 1).is_empty());
        assert!(next.get(0, 2).is_empty());
    }

    #[test]
    fn shifting_while_the_window_grows() {
        let mut sequence = CorrespondenceMaps3DSequence::new(2);
        sequence.set(0, 1, tagged(5.0));
        let next = sequence.shifted(3);
        assert_eq!(next.number_of_cameras(), 3);
        assert_eq!(next.get(1, 2), &tagged(5.0));
    }

    #[test]
    fn valid_skips_nan_endpoints() {
        let mut map = CorrespondenceMap2D::new();
        map.add(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), 1.0);
        map.add(Point2::new(std::f32::NAN, 0.0), Point2::new(1.0, 1.0), 1.0);
        map.add(Point2::new(2.0, 0.0), Point2::new(3.0, 1.0), 0.5);
        let indices: Vec<_> = map.valid().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
