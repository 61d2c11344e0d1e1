//! Package identity in the Open Build Service.

use crate::core::{ObsError, ObsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A package in the Open Build Service, identified by the project it lives in
/// and its own name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// The project the package belongs to
    pub project: String,

    /// The package's name
    pub package: String,
}

impl Package {
    /// Create a new package reference. Both identifiers must be non-empty.
    pub fn new(project: impl Into<String>, package: impl Into<String>) -> ObsResult<Self> {
        let project = project.into();
        let package = package.into();
        if project.is_empty() || package.is_empty() {
            return Err(ObsError::InvalidPackage(format!(
                "project and package must be non-empty, got '{}/{}'",
                project, package
            )));
        }
        Ok(Self { project, package })
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.package)
    }
}

impl FromStr for Package {
    type Err = ObsError;

    /// Parse a `project/package` reference, the form osc prints branch
    /// targets in.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((project, package))
                if !project.is_empty() && !package.is_empty() && !package.contains('/') =>
            {
                Ok(Self {
                    project: project.to_string(),
                    package: package.to_string(),
                })
            }
            _ => Err(ObsError::InvalidPackage(format!(
                "expected 'project/package', got '{}'",
                s
            ))),
        }
    }
}
