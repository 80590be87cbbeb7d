// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Trajectories in the TUM RGB-D format and stereo sequence associations.
//!
//! A trajectory line is `timestamp tx ty tz qx qy qz qw`,
//! an association line is `timestamp left_path right_path`.
//! In both files, lines starting with `#` are comments.

use std::path::PathBuf;

use crate::core::types::Pose3D;

/// Timestamp (in seconds) and camera pose.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryPoint {
    /// Timestamp of the pose.
    pub timestamp: f64,
    /// Camera pose at that time.
    pub pose: Pose3D,
}

/// Left and right image files of a stereo pair.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoAssociation {
    /// Timestamp of the pair, in seconds.
    pub timestamp: f64,
    /// File path of the left image.
    pub left_file_path: PathBuf,
    /// File path of the right image.
    pub right_file_path: PathBuf,
}

impl StereoAssociation {
    /// Timestamp in microseconds, as used by frames.
    pub fn timestamp_micros(&self) -> i64 {
        (self.timestamp * 1e6).round() as i64
    }
}

/// Write a pose in the TUM RGB-D format for trajectories.
pub fn to_line(timestamp: f64, pose: &Pose3D) -> String {
    let [x, y, z, qx, qy, qz, qw] = pose.to_array();
    format!(
        "{} {} {} {} {} {} {} {}",
        timestamp, x, y, z, qx, qy, qz, qw
    )
}

impl std::fmt::Display for TrajectoryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&to_line(self.timestamp, &self.pose))
    }
}

/// Parse trajectory and association files.
pub mod parse {
    use super::*;
    use crate::error::{Error, Result};
    use nom::{
        branch::alt,
        bytes::complete::{is_not, tag},
        character::complete::{multispace0, space0, space1},
        combinator::{all_consuming, map, rest, value},
        number::complete::double,
        sequence::{delimited, preceded, tuple},
        IResult,
    };

    /// Parse a trajectory file into a vector of `TrajectoryPoint`.
    pub fn trajectory(file_content: &str) -> Result<Vec<TrajectoryPoint>> {
        multi_line(trajectory_line, file_content)
    }

    /// Parse a stereo association file into a vector of `StereoAssociation`.
    pub fn stereo_associations(file_content: &str) -> Result<Vec<StereoAssociation>> {
        multi_line(association_line, file_content)
    }

    fn multi_line<F, T>(line_parser: F, file_content: &str) -> Result<Vec<T>>
    where
        F: Fn(&str) -> IResult<&str, Option<T>> + Copy,
    {
        let mut vec_data = Vec::new();
        for (index, line) in file_content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match all_consuming(delimited(space0, line_parser, multispace0))(line) {
                Ok((_, Some(data))) => vec_data.push(data),
                Ok(_) => (),
                Err(_) => return Err(Error::Parse(format!("line {}: \"{}\"", index + 1, line))),
            }
        }
        Ok(vec_data)
    }

    // nom parsers #############################################################

    // A comment runs until the end of the line.
    fn comment(input: &str) -> IResult<&str, ()> {
        value((), preceded(tag("#"), rest))(input)
    }

    // Associations --------------------

    fn association_line(input: &str) -> IResult<&str, Option<StereoAssociation>> {
        alt((map(comment, |_| None), map(association, Some)))(input)
    }

    fn association(input: &str) -> IResult<&str, StereoAssociation> {
        map(
            tuple((double, space1, path, space1, path)),
            |(timestamp, _, left_file_path, _, right_file_path)| StereoAssociation {
                timestamp,
                left_file_path,
                right_file_path,
            },
        )(input)
    }

    fn path(input: &str) -> IResult<&str, PathBuf> {
        map(is_not(" \t\r\n"), PathBuf::from)(input)
    }

    // Trajectory ----------------------

    fn trajectory_line(input: &str) -> IResult<&str, Option<TrajectoryPoint>> {
        alt((map(comment, |_| None), map(trajectory_point, Some)))(input)
    }

    fn trajectory_point(input: &str) -> IResult<&str, TrajectoryPoint> {
        map(tuple((double, space1, pose)), |(timestamp, _, pose)| TrajectoryPoint {
            timestamp,
            pose,
        })(input)
    }

    // Position then orientation quaternion, stored as given.
    fn pose(input: &str) -> IResult<&str, Pose3D> {
        map(
            tuple((
                double, space1, double, space1, double, space1,
                double, space1, double, space1, double, space1, double,
            )),
            |(x, _, y, _, z, _, qx, _, qy, _, qz, _, qw)| Pose3D::new([x, y, z], [qx, qy, qz, qw]),
        )(input)
    }
} // pub mod parse

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::error::Error;
    use quickcheck_macros;

    #[test]
    fn trajectory_with_comments() {
        let content = "# ground truth trajectory\n\
                       # timestamp tx ty tz qx qy qz qw\n\
                       1305031102.1753 1.3405 0.6266 1.6575 0.6574 0.6126 -0.2949 -0.3248\n\
                       \n\
                       1305031102.2153 1.3 0.6 1.6 0.0 0.0 0.0 1.0  \n";
        let points = parse::trajectory(content).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 1305031102.1753);
        assert_eq!(points[0].pose.position.z, 1.6575);
        assert_eq!(points[0].pose.orientation.coords.x, 0.6574);
        assert_eq!(points[0].pose.orientation.coords.w, -0.3248);
        assert_eq!(points[1].pose, Pose3D::new([1.3, 0.6, 1.6], [0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn stereo_associations() {
        let content = "# timestamp left right\n\
                       0.05 left/000000.png right/000000.png\n\
                       0.15\tleft/000001.png\tright/000001.png\n";
        let associations = parse::stereo_associations(content).unwrap();
        assert_eq!(associations.len(), 2);
        assert_eq!(associations[1].timestamp, 0.15);
        assert_eq!(associations[1].timestamp_micros(), 150_000);
        assert_eq!(associations[0].left_file_path, PathBuf::from("left/000000.png"));
        assert_eq!(associations[1].right_file_path, PathBuf::from("right/000001.png"));
    }

    #[test]
    fn malformed_lines_are_reported() {
        let result = parse::stereo_associations("0.05 left.png\n");
        assert!(matches!(result, Err(Error::Parse(_))));
        let result = parse::trajectory("# ok\n1.0 0 0 0 0 0 0\n");
        match result {
            Err(Error::Parse(message)) => assert!(message.starts_with("line 2")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn written_line() {
        let pose = Pose3D::new([1.0, -2.5, 0.0], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(to_line(0.5, &pose), "0.5 1 -2.5 0 0 0 0 1");
    }

    #[quickcheck_macros::quickcheck]
    fn written_lines_parse_back(timestamp: f64, position: (f64, f64, f64), orientation: (f64, f64, f64, f64)) -> bool {
        let values = [
            timestamp, position.0, position.1, position.2, orientation.0, orientation.1, orientation.2, orientation.3,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return true;
        }
        let point = TrajectoryPoint {
            timestamp,
            pose: Pose3D::new(
                [position.0, position.1, position.2],
                [orientation.0, orientation.1, orientation.2, orientation.3],
            ),
        };
        match parse::trajectory(&point.to_string()) {
            Ok(points) => points == vec![point],
            Err(_) => false,
        }
    }
}
