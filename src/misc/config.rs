// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Loading of JSON configuration files.
//!
//! Configurations are plain structs deriving serde traits with
//! `#[serde(default)]`, so a file only lists the values it changes.

use serde::de::DeserializeOwned;
use std::{fs, path::Path};

use crate::error::Result;

/// Configuration with a range check.
pub trait Validate {
    /// Check every value is in its valid range.
    fn validate(&self) -> Result<()>;
}

/// Read and deserialize a JSON configuration file.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(file_path: P) -> Result<T> {
    let content = fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Configuration stored in a file, or the default one if no file is given.
pub fn load_json_or_default<T, P>(file_path: Option<P>) -> Result<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    match file_path {
        Some(path) => load_json(path),
        None => Ok(T::default()),
    }
}

/// Replace `current` by the validated content of `file_path` if any,
/// otherwise validate `current` as it is.
/// On error `current` is left untouched.
pub fn reload<T, P>(file_path: Option<P>, current: &mut T) -> Result<()>
where
    T: DeserializeOwned + Validate,
    P: AsRef<Path>,
{
    match file_path {
        Some(path) => {
            let loaded: T = load_json(path)?;
            loaded.validate()?;
            *current = loaded;
            Ok(())
        }
        None => current.validate(),
    }
}

// TESTS #############################################################
