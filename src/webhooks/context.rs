//! Oracles the policies consult: feature gates and the current admission
//! request.
//!
//! Both are handed to the dispatcher at construction time and threaded into
//! each policy call, so tests can inject their own.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kube::core::admission::Operation;

use crate::error::{Error, Result};
use crate::validation::{FieldError, FieldPath};

/// Feature gates consumed by the admission policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    /// Managed control planes and machine pools.
    MachinePool,
    /// Managed clusters.
    Aks,
}

impl Feature {
    pub const ALL: [Feature; 2] = [Feature::MachinePool, Feature::Aks];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::MachinePool => "MachinePool",
            Feature::Aks => "AKS",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown feature gate {:?}", s)))
    }
}

/// Read-only feature gate lookup.
pub trait FeatureGates: Send + Sync {
    fn enabled(&self, feature: Feature) -> bool;
}

/// Gate set parsed once at startup. Unlisted gates are disabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureGateSet {
    gates: BTreeMap<Feature, bool>,
}

impl FeatureGateSet {
    /// Parse `--feature-gates` syntax: `MachinePool=true,AKS=false`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut gates = BTreeMap::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("feature gate {:?} is missing '='", entry)))?;
            let feature: Feature = name.trim().parse()?;
            let enabled: bool = value.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "feature gate {} has non-boolean value {:?}",
                    feature, value
                ))
            })?;
            gates.insert(feature, enabled);
        }
        Ok(Self { gates })
    }

    /// Enable every gate.
    pub fn all_enabled() -> Self {
        Self {
            gates: Feature::ALL.into_iter().map(|f| (f, true)).collect(),
        }
    }

    pub fn with(mut self, feature: Feature, enabled: bool) -> Self {
        self.gates.insert(feature, enabled);
        self
    }
}

impl FeatureGates for FeatureGateSet {
    fn enabled(&self, feature: Feature) -> bool {
        self.gates.get(&feature).copied().unwrap_or(false)
    }
}

/// The parts of the admission request a policy may read.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestInfo {
    pub uid: String,
    pub operation: Operation,
    pub dry_run: bool,
    pub user: Option<String>,
}

/// Everything a validator sees besides the objects themselves.
#[derive(Clone, Copy)]
pub struct AdmissionContext<'a> {
    pub gates: &'a dyn FeatureGates,
    pub request: Option<&'a RequestInfo>,
}

impl<'a> AdmissionContext<'a> {
    pub fn new(gates: &'a dyn FeatureGates, request: Option<&'a RequestInfo>) -> Self {
        Self { gates, request }
    }

    /// The admission request, or an internal error when none was threaded
    /// through.
    pub fn request(&self) -> std::result::Result<&'a RequestInfo, FieldError> {
        self.request.ok_or_else(|| {
            FieldError::internal(
                &FieldPath::new("spec"),
                "admission request not found in context",
            )
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.request.is_some_and(|r| r.dry_run)
    }

    /// `None` when `feature` is enabled, otherwise the error rejecting the
    /// operation at `path`.
    pub fn require_gate(&self, feature: Feature, path: &FieldPath) -> Option<FieldError> {
        if self.gates.enabled(feature) {
            None
        } else {
            Some(FieldError::unsupported(
                path,
                None,
                format!(
                    "can be set only if the {} feature flag is enabled",
                    feature
                ),
            ))
        }
    }
}
