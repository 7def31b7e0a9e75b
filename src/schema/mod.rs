//! Feature vocabulary shared by the whole pipeline: the ordered schema, per
//! feature kinds, generator online-groups, base weights, PMS mode codes.

use crate::error::EvalError;
use std::collections::HashMap;

/// Suffix marking a 0/1 equipment-online flag column.
pub const ONLINE_SUFFIX: &str = "_online";

/// Name of the categorical operating-mode column, when the model uses one.
pub const MODE_CODE_COL: &str = "mode_code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Real-valued physical measurement; imputed and rescaled.
    Continuous,
    /// 0/1 equipment-online flag.
    Binary,
    /// Enumerated code (e.g. PMS operating mode).
    Categorical,
}

/// Power-management-system operating mode, as emitted by the plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmsMode {
    Startup,
    Stable,
    HighLoad,
    BadEnv,
}

impl PmsMode {
    pub fn label(self) -> &'static str {
        match self {
            PmsMode::Startup => "startup",
            PmsMode::Stable => "stable",
            PmsMode::HighLoad => "high_load",
            PmsMode::BadEnv => "bad_env",
        }
    }

    pub fn code(self) -> f32 {
        match self {
            PmsMode::Startup => 1.0,
            PmsMode::Stable => 2.0,
            PmsMode::HighLoad => 3.0,
            PmsMode::BadEnv => 4.0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "startup" => Some(PmsMode::Startup),
            "stable" => Some(PmsMode::Stable),
            "high_load" => Some(PmsMode::HighLoad),
            "bad_env" => Some(PmsMode::BadEnv),
            _ => None,
        }
    }

    /// Fixed label→code table; unknown labels map to 0.
    pub fn code_for_label(label: &str) -> f32 {
        Self::from_label(label).map(PmsMode::code).unwrap_or(0.0)
    }
}

/// One controllable generator set: the index of its online flag and the
/// continuous columns that are only meaningful while it runs.
#[derive(Debug, Clone)]
pub struct GeneratorGroup {
    pub prefix: String,
    pub online: usize,
    pub cont: Vec<usize>,
}

/// Ordered feature schema. The order is fixed for the lifetime of a deployed
/// model and must match the order the reconstructor was trained on.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    names: Vec<String>,
    kinds: Vec<FeatureKind>,
    index: HashMap<String, usize>,
    groups: Vec<GeneratorGroup>,
}

impl FeatureSchema {
    pub fn from_columns(cols: &[String]) -> Result<Self, EvalError> {
        if cols.is_empty() {
            return Err(EvalError::mismatch("feature_cols is empty"));
        }
        let mut index = HashMap::with_capacity(cols.len());
        for (i, name) in cols.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(EvalError::mismatch(format!(
                    "duplicate feature column '{}'",
                    name
                )));
            }
        }

        let kinds: Vec<FeatureKind> = cols
            .iter()
            .map(|name| {
                if name.ends_with(ONLINE_SUFFIX) {
                    FeatureKind::Binary
                } else if name == MODE_CODE_COL {
                    FeatureKind::Categorical
                } else {
                    FeatureKind::Continuous
                }
            })
            .collect();

        // Each `<prefix>_online` flag gates the continuous `<prefix>_*` columns.
        let mut groups = Vec::new();
        for (online, name) in cols.iter().enumerate() {
            if kinds[online] != FeatureKind::Binary {
                continue;
            }
            let prefix = format!("{}_", &name[..name.len() - ONLINE_SUFFIX.len()]);
            let cont: Vec<usize> = cols
                .iter()
                .enumerate()
                .filter(|(j, other)| {
                    kinds[*j] == FeatureKind::Continuous && other.starts_with(&prefix)
                })
                .map(|(j, _)| j)
                .collect();
            if !cont.is_empty() {
                groups.push(GeneratorGroup {
                    prefix,
                    online,
                    cont,
                });
            }
        }

        Ok(Self {
            names: cols.to_vec(),
            kinds,
            index,
            groups,
        })
    }

    pub fn dim(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    pub fn kind(&self, i: usize) -> FeatureKind {
        self.kinds[i]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn groups(&self) -> &[GeneratorGroup] {
        &self.groups
    }

    /// Default rescaled subset: every column not ending in the online suffix.
    pub fn default_scaled_columns(&self) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| !n.ends_with(ONLINE_SUFFIX))
            .cloned()
            .collect()
    }
}

/// Static per-feature weights in [0, 1]. Binary and categorical columns are
/// pinned to 0 (never penalized); continuous columns default to 1.0 with
/// configured reductions for high-variance channels.
#[derive(Debug, Clone)]
pub struct BaseWeights {
    weights: Vec<f32>,
}

impl BaseWeights {
    pub fn from_schema(
        schema: &FeatureSchema,
        overrides: &HashMap<String, f32>,
    ) -> Result<Self, EvalError> {
        let mut weights: Vec<f32> = (0..schema.dim())
            .map(|i| match schema.kind(i) {
                FeatureKind::Continuous => 1.0,
                FeatureKind::Binary | FeatureKind::Categorical => 0.0,
            })
            .collect();

        for (name, &w) in overrides {
            let i = schema.index_of(name).ok_or_else(|| {
                EvalError::mismatch(format!("weight override for unknown column '{}'", name))
            })?;
            if schema.kind(i) != FeatureKind::Continuous {
                return Err(EvalError::mismatch(format!(
                    "weight override for non-continuous column '{}'",
                    name
                )));
            }
            if !(0.0..=1.0).contains(&w) {
                return Err(EvalError::mismatch(format!(
                    "weight override for '{}' out of [0, 1]: {}",
                    name, w
                )));
            }
            weights[i] = w;
        }

        Ok(Self { weights })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }
}
