//! Closed set of material models, stored by value in elements.

use pliant_math::{DMat3, Tensor9};
use pliant_types::PliantResult;
use serde::{Deserialize, Serialize};

use crate::corotated::CorotatedModel;
use crate::linear::LinearModel;
use crate::properties::MaterialProperties;
use crate::traits::{ConstitutiveModel, ConstitutiveResponse};

/// Which constitutive model to build. Used in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialModelKind {
    Linear,
    #[default]
    Corotated,
}

/// A constitutive model instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Material {
    Linear(LinearModel),
    Corotated(CorotatedModel),
}

impl Material {
    /// Builds a model of the given kind from validated properties.
    pub fn new(kind: MaterialModelKind, properties: &MaterialProperties) -> PliantResult<Self> {
        properties.validate()?;
        let lame = properties.lame();
        Ok(match kind {
            MaterialModelKind::Linear => Self::Linear(LinearModel::new(lame)),
            MaterialModelKind::Corotated => Self::Corotated(CorotatedModel::new(lame)),
        })
    }

    /// Returns the kind of this model.
    pub fn kind(&self) -> MaterialModelKind {
        match self {
            Self::Linear(_) => MaterialModelKind::Linear,
            Self::Corotated(_) => MaterialModelKind::Corotated,
        }
    }

    fn model(&self) -> &dyn ConstitutiveModel {
        match self {
            Self::Linear(m) => m,
            Self::Corotated(m) => m,
        }
    }
}

impl ConstitutiveModel for Material {
    fn calc_energy_density(&self, f: &DMat3) -> PliantResult<f64> {
        self.model().calc_energy_density(f)
    }

    fn calc_stress(&self, f: &DMat3) -> PliantResult<DMat3> {
        self.model().calc_stress(f)
    }

    fn calc_tangent(&self, f: &DMat3) -> PliantResult<Tensor9> {
        self.model().calc_tangent(f)
    }

    fn evaluate(&self, f: &DMat3) -> PliantResult<ConstitutiveResponse> {
        self.model().evaluate(f)
    }

    fn name(&self) -> &str {
        match self {
            Self::Linear(_) => "linear",
            Self::Corotated(_) => "corotated",
        }
    }
}
