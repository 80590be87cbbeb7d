// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sliding window of the perception artifacts of the last time steps.
//!
//! Artifacts are stored per kind (images, features, matches, point clouds)
//! and per named category, each in its own circular buffer.
//! Entries are addressed in backward steps: 0 is the most recent one.

use std::collections::HashMap;

use crate::core::types::{CorrespondenceMap2D, Frame, PointCloud, VisualPointFeatureVector2D};
use crate::misc::helper::wrap_index;

/// Category used when there is only one of a kind.
pub const DEFAULT_CATEGORY: &str = "DEFAULT";

/// Fixed capacity circular buffer.
/// Slots own their entries, overwriting a slot drops the previous entry.
#[derive(Clone, Debug)]
struct Ring<T> {
    slots: Vec<Option<T>>,
    most_recent: usize,
    count: usize,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            most_recent: capacity - 1,
            count: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, backward_steps: usize) -> usize {
        wrap_index(self.most_recent, backward_steps, self.capacity())
    }

    fn push(&mut self, value: T) {
        self.most_recent = (self.most_recent + 1) % self.capacity();
        self.slots[self.most_recent] = Some(value);
        self.count = (self.count + 1).min(self.capacity());
    }

    fn get(&self, backward_steps: usize, what: &str) -> &T {
        assert!(
            backward_steps < self.count,
            "{} requested {} steps back, but only {} held",
            what,
            backward_steps,
            self.count
        );
        self.slots[self.slot(backward_steps)]
            .as_ref()
            .expect("slots younger than count are occupied")
    }

    /// Remove the entry `backward_steps` back, newer entries move one step back.
    fn remove(&mut self, backward_steps: usize) {
        if backward_steps >= self.count {
            return;
        }
        for step in (1..=backward_steps).rev() {
            let newer_slot = self.slot(step - 1);
            let newer = self.slots[newer_slot].take();
            let slot = self.slot(step);
            self.slots[slot] = newer;
        }
        let head = self.slot(0);
        self.slots[head] = None;
        self.most_recent = self.slot(1);
        self.count -= 1;
    }
}

/// Stereo images of one time step.
#[derive(Clone, Debug)]
struct ImagePair {
    left: Frame,
    right: Frame,
}

/// Sliding window over the last `size` time steps.
#[derive(Clone, Debug)]
pub struct BundleHistory {
    size: usize,
    images: Ring<ImagePair>,
    features: HashMap<String, Ring<VisualPointFeatureVector2D>>,
    matches: HashMap<String, Ring<CorrespondenceMap2D>>,
    point_clouds: HashMap<String, Ring<PointCloud>>,
}

fn add_to<T>(rings: &mut HashMap<String, Ring<T>>, size: usize, category: &str, value: T) {
    rings
        .entry(category.to_string())
        .or_insert_with(|| Ring::new(size))
        .push(value);
}

fn count_in<T>(rings: &HashMap<String, Ring<T>>, category: &str) -> usize {
    rings.get(category).map_or(0, |ring| ring.count)
}

fn get_from<'a, T>(
    rings: &'a HashMap<String, Ring<T>>,
    backward_steps: usize,
    category: &str,
    what: &str,
) -> &'a T {
    match rings.get(category) {
        Some(ring) => ring.get(backward_steps, what),
        None => panic!("{} requested in unknown category \"{}\"", what, category),
    }
}

impl BundleHistory {
    /// Window holding the last `size` entries of each category.
    ///
    /// # Panics
    ///
    /// If `size` is 0.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "a bundle history needs a strictly positive size");
        Self {
            size,
            images: Ring::new(size),
            features: HashMap::new(),
            matches: HashMap::new(),
            point_clouds: HashMap::new(),
        }
    }

    /// Capacity of the window.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Add a stereo pair, evicting the oldest one if the window is full.
    pub fn add_images(&mut self, left: &Frame, right: &Frame) {
        self.images.push(ImagePair {
            left: left.clone(),
            right: right.clone(),
        });
    }

    /// Add a feature vector to `category`.
    pub fn add_features(&mut self, features: &VisualPointFeatureVector2D, category: &str) {
        add_to(&mut self.features, self.size, category, features.clone());
    }

    /// Add a correspondence map to `category`.
    pub fn add_matches(&mut self, matches: &CorrespondenceMap2D, category: &str) {
        add_to(&mut self.matches, self.size, category, matches.clone());
    }

    /// Add a point cloud to `category`.
    pub fn add_point_cloud(&mut self, cloud: &PointCloud, category: &str) {
        add_to(&mut self.point_clouds, self.size, category, cloud.clone());
    }

    /// Left image `backward_steps` back.
    ///
    /// # Panics
    ///
    /// If `backward_steps >= number_of_images()`, for this getter and all the others.
    pub fn left_image(&self, backward_steps: usize) -> &Frame {
        &self.images.get(backward_steps, "left image").left
    }

    /// Right image `backward_steps` back.
    pub fn right_image(&self, backward_steps: usize) -> &Frame {
        &self.images.get(backward_steps, "right image").right
    }

    /// Features of `category`, `backward_steps` back.
    pub fn features(&self, backward_steps: usize, category: &str) -> &VisualPointFeatureVector2D {
        get_from(&self.features, backward_steps, category, "features")
    }

    /// Matches of `category`, `backward_steps` back.
    pub fn matches(&self, backward_steps: usize, category: &str) -> &CorrespondenceMap2D {
        get_from(&self.matches, backward_steps, category, "matches")
    }

    /// Point cloud of `category`, `backward_steps` back.
    pub fn point_cloud(&self, backward_steps: usize, category: &str) -> &PointCloud {
        get_from(&self.point_clouds, backward_steps, category, "point cloud")
    }

    /// Number of stereo pairs held.
    pub fn number_of_images(&self) -> usize {
        self.images.count
    }

    /// Number of feature vectors held in `category` (0 if unknown).
    pub fn number_of_features(&self, category: &str) -> usize {
        count_in(&self.features, category)
    }

    /// Number of correspondence maps held in `category` (0 if unknown).
    pub fn number_of_matches(&self, category: &str) -> usize {
        count_in(&self.matches, category)
    }

    /// Number of point clouds held in `category` (0 if unknown).
    pub fn number_of_point_clouds(&self, category: &str) -> usize {
        count_in(&self.point_clouds, category)
    }

    /// Discard the time step `backward_steps` back in every category that
    /// holds it. Newer entries move one step back, older ones are untouched.
    pub fn remove_entry(&mut self, backward_steps: usize) {
        self.images.remove(backward_steps);
        self.features
            .values_mut()
            .for_each(|ring| ring.remove(backward_steps));
        self.matches
            .values_mut()
            .for_each(|ring| ring.remove(backward_steps));
        self.point_clouds
            .values_mut()
            .for_each(|ring| ring.remove(backward_steps));
    }

    /// Discard the oldest entry of every category.
    pub fn remove_oldest_entry(&mut self) {
        fn remove_oldest<T>(ring: &mut Ring<T>) {
            if ring.count > 0 {
                ring.remove(ring.count - 1);
            }
        }
        remove_oldest(&mut self.images);
        self.features.values_mut().for_each(remove_oldest);
        self.matches.values_mut().for_each(remove_oldest);
        self.point_clouds.values_mut().for_each(remove_oldest);
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::misc::type_aliases::Point3;
    use quickcheck_macros::quickcheck;

    fn cloud(tag: usize) -> PointCloud {
        let mut cloud = PointCloud::from_points(vec![Point3::new(tag as f32, 0.0, 0.0)]);
        cloud.timestamp = tag as i64;
        cloud
    }

    fn tags(history: &BundleHistory, category: &str) -> Vec<i64> {
        (0..history.number_of_point_clouds(category))
            .map(|k| history.point_cloud(k, category).timestamp)
            .collect()
    }

    #[test]
    fn adding_past_capacity_evicts_the_first_entry() {
        let mut history = BundleHistory::new(3);
        for tag in 0..4 {
            history.add_point_cloud(&cloud(tag), DEFAULT_CATEGORY);
        }
        assert_eq!(history.number_of_point_clouds(DEFAULT_CATEGORY), 3);
        assert_eq!(tags(&history, DEFAULT_CATEGORY), vec![3, 2, 1]);
    }

    #[quickcheck]
    fn most_recent_is_always_step_zero(capacity: u8, additions: u8) -> bool {
        let capacity = capacity as usize % 8 + 1;
        let additions = additions as usize % 30 + 1;
        let mut history = BundleHistory::new(capacity);
        for tag in 0..additions {
            history.add_point_cloud(&cloud(tag), "dense");
            if history.point_cloud(0, "dense").timestamp != tag as i64 {
                return false;
            }
        }
        let held = history.number_of_point_clouds("dense");
        held == additions.min(capacity)
            && history.point_cloud(held - 1, "dense").timestamp == (additions - held) as i64
    }

    #[test]
    fn oldest_entry_is_count_minus_one() {
        let mut history = BundleHistory::new(4);
        history.add_point_cloud(&cloud(10), "a");
        history.add_point_cloud(&cloud(11), "a");
        assert_eq!(history.point_cloud(1, "a").timestamp, 10);
    }

    #[test]
    #[should_panic]
    fn getting_past_the_count_panics() {
        let mut history = BundleHistory::new(4);
        history.add_point_cloud(&cloud(10), "a");
        history.add_point_cloud(&cloud(11), "a");
        history.point_cloud(2, "a");
    }

    #[test]
    #[should_panic]
    fn getting_from_an_empty_category_panics() {
        BundleHistory::new(2).features(0, "left");
    }

    #[test]
    fn unknown_categories_hold_nothing() {
        let history = BundleHistory::new(2);
        assert_eq!(history.number_of_features("left"), 0);
        assert_eq!(history.number_of_matches(DEFAULT_CATEGORY), 0);
        assert_eq!(history.number_of_images(), 0);
    }

    #[test]
    #[should_panic]
    fn zero_size_panics() {
        BundleHistory::new(0);
    }

    #[test]
    fn categories_are_independent() {
        let mut history = BundleHistory::new(2);
        history.add_point_cloud(&cloud(1), "dense");
        history.add_point_cloud(&cloud(2), "keypoints");
        history.add_point_cloud(&cloud(3), "keypoints");
        history.add_point_cloud(&cloud(4), "keypoints");
        assert_eq!(tags(&history, "dense"), vec![1]);
        assert_eq!(tags(&history, "keypoints"), vec![4, 3]);
    }

    #[test]
    fn images_are_stored_by_pair() {
        let mut history = BundleHistory::new(2);
        let left = Frame::from_gray(1, 1, vec![1]).unwrap();
        let right = Frame::from_gray(1, 1, vec![2]).unwrap();
        history.add_images(&left, &right);
        assert_eq!(history.left_image(0), &left);
        assert_eq!(history.right_image(0), &right);
    }

    #[test]
    fn remove_entry_keeps_the_order_of_the_others() {
        let mut history = BundleHistory::new(4);
        for tag in 0..6 {
            history.add_point_cloud(&cloud(tag), "a");
        }
        history.add_point_cloud(&cloud(100), "b");
        // a: [5, 4, 3, 2], b: [100]
        history.remove_entry(1);
        assert_eq!(tags(&history, "a"), vec![5, 3, 2]);
        assert_eq!(tags(&history, "b"), vec![100]);

        // The freed slot is reused by the next addition.
        history.add_point_cloud(&cloud(6), "a");
        assert_eq!(tags(&history, "a"), vec![6, 5, 3, 2]);
        history.add_point_cloud(&cloud(7), "a");
        assert_eq!(tags(&history, "a"), vec![7, 6, 5, 3]);
    }

    #[test]
    fn remove_most_recent_entry() {
        let mut history = BundleHistory::new(3);
        for tag in 0..3 {
            history.add_point_cloud(&cloud(tag), "a");
        }
        history.remove_entry(0);
        assert_eq!(tags(&history, "a"), vec![1, 0]);
    }

    #[test]
    fn remove_oldest_entry_in_every_category() {
        let mut history = BundleHistory::new(3);
        for tag in 0..3 {
            history.add_point_cloud(&cloud(tag), "a");
        }
        history.add_point_cloud(&cloud(50), "b");
        history.remove_oldest_entry();
        assert_eq!(tags(&history, "a"), vec![2, 1]);
        assert_eq!(history.number_of_point_clouds("b"), 0);
    }
}
