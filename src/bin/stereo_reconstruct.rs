// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::{env, fs, path::Path, path::PathBuf};
use tracing_subscriber::EnvFilter;

use stereo_reconstruction::core::camera::StereoRig;
use stereo_reconstruction::core::dfn::builtin::block_matching::BlockMatchingParameters;
use stereo_reconstruction::core::dfn::builtin::triangulation::TriangulationParameters;
use stereo_reconstruction::core::dfn::builtin::{
    BlockMatchingStereo, BruteForceMatcher, HarrisDetector2D, IterativeClosestPoint,
    PairwiseRigidEstimation, PatchDescriptor, Triangulation,
};
use stereo_reconstruction::core::dfn::registry::DfnRegistry;
use stereo_reconstruction::core::reconstruction::{
    DenseRegistrationFromStereo, DenseRegistrationFromStereoConfig, EstimationFromStereo,
    EstimationFromStereoConfig, Reconstruction3D,
};
use stereo_reconstruction::core::types::Frame;
use stereo_reconstruction::dataset::trajectory::{self, parse, StereoAssociation};
use stereo_reconstruction::misc::{config, interop};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args: Vec<String> = env::args().collect();
    if let Err(error) = my_run(&args) {
        eprintln!("{:?}", error);
        std::process::exit(1);
    }
}

const USAGE: &str = "Usage: ./stereo_reconstruct config.json associations.txt";

/// Chain run over the sequence.
#[derive(Debug, Clone, Copy, Deserialize)]
enum Chain {
    EstimationFromStereo,
    DenseRegistrationFromStereo,
}

impl Default for Chain {
    fn default() -> Self {
        Chain::EstimationFromStereo
    }
}

/// Content of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    chain: Chain,
    /// Calibration of the rectified stereo rig.
    rig: StereoRig,
    estimation_from_stereo: EstimationFromStereoConfig,
    dense_registration_from_stereo: DenseRegistrationFromStereoConfig,
    /// Configuration files of modules, by role, relative to the configuration file.
    modules: BTreeMap<String, PathBuf>,
}

fn my_run(args: &[String]) -> anyhow::Result<()> {
    let (config_path, associations_path) = match args {
        [_, config_path, associations_path] => (Path::new(config_path), Path::new(associations_path)),
        _ => {
            eprintln!("{}", USAGE);
            bail!("Wrong number of arguments");
        }
    };
    let config: Config = config::load_json(config_path)
        .with_context(|| format!("Loading configuration {}", config_path.display()))?;
    let associations = read_associations(associations_path)?;
    tracing::info!("{} stereo pairs to process", associations.len());

    let mut registry = builtin_registry(&config);
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    for (role, file_path) in &config.modules {
        registry.set_configuration_file(role, &config_dir.join(file_path))?;
    }

    let mut chain: Box<dyn Reconstruction3D> = match config.chain {
        Chain::EstimationFromStereo => {
            let chain_config = EstimationFromStereoConfig {
                baseline: config.rig.baseline as f64,
                ..config.estimation_from_stereo
            };
            Box::new(EstimationFromStereo::setup(chain_config, &mut registry)?)
        }
        Chain::DenseRegistrationFromStereo => Box::new(DenseRegistrationFromStereo::setup(
            config.dense_registration_from_stereo,
            &mut registry,
        )?),
    };

    for association in &associations {
        let (left, right) = read_stereo_pair(association)?;
        chain.left_image_input(&left);
        chain.right_image_input(&right);
        chain.run()?;
        if chain.success_output() {
            println!("{}", trajectory::to_line(association.timestamp, chain.pose_output()));
        } else {
            tracing::info!("No pose at {}", association.timestamp);
        }
    }
    Ok(())
}

/// Built-in modules for the chain, set up for the rig.
fn builtin_registry(config: &Config) -> DfnRegistry {
    let mut registry = DfnRegistry::new();
    registry.register_stereo_reconstruction(
        "reconstructor3d",
        BlockMatchingStereo::new(BlockMatchingParameters {
            rig: config.rig,
            ..BlockMatchingParameters::default()
        }),
    );
    match config.chain {
        Chain::EstimationFromStereo => {
            registry.register_features_extraction_2d("featuresExtractor2d", HarrisDetector2D::default());
            registry.register_features_description_2d("featuresDescriptor2d", PatchDescriptor::default());
            registry.register_features_matching_2d("featuresMatcher2d", BruteForceMatcher::default());
            registry.register_point_cloud_reconstruction_2d_to_3d(
                "reconstructor3dfrom2dmatches",
                Triangulation::new(TriangulationParameters {
                    intrinsics: config.rig.intrinsics,
                }),
            );
            registry.register_transform_3d_estimation("transformEstimator", PairwiseRigidEstimation::default());
        }
        Chain::DenseRegistrationFromStereo => {
            registry.register_registration_3d("registrator3d", IterativeClosestPoint::default());
        }
    }
    registry
}

/// Associations with image paths relative to the association file.
fn read_associations(file_path: &Path) -> anyhow::Result<Vec<StereoAssociation>> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Reading associations {}", file_path.display()))?;
    let parent = file_path.parent().unwrap_or_else(|| Path::new(""));
    let associations = parse::stereo_associations(&content)?
        .into_iter()
        .map(|a| StereoAssociation {
            left_file_path: parent.join(&a.left_file_path),
            right_file_path: parent.join(&a.right_file_path),
            ..a
        })
        .collect();
    Ok(associations)
}

fn read_stereo_pair(association: &StereoAssociation) -> anyhow::Result<(Frame, Frame)> {
    let timestamp = association.timestamp_micros();
    let mut left = interop::read_gray_frame(&association.left_file_path)
        .with_context(|| format!("Reading {}", association.left_file_path.display()))?;
    let mut right = interop::read_gray_frame(&association.right_file_path)
        .with_context(|| format!("Reading {}", association.right_file_path.display()))?;
    left.timestamp = timestamp;
    right.timestamp = timestamp;
    Ok((left, right))
}
