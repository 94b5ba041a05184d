use serde::{Deserialize, Serialize};

/// Pan law
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanLaw {
    /// Attenuate the opposite side only. Centre is unity on both sides.
    #[default]
    Balance,
    EqualPower,
}

/// Pan position (-1.0 = left, 0.0 = center, 1.0 = right)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pan {
    pub value: f32,
    pub law: PanLaw,
}

impl Pan {
    pub fn new(value: f32, law: PanLaw) -> Self {
        Self {
            value: value.clamp(-1.0, 1.0),
            law,
        }
    }

    pub fn center(law: PanLaw) -> Self {
        Self::new(0.0, law)
    }

    #[inline(always)]
    pub fn gains(&self) -> (f32, f32) {
        match self.law {
            PanLaw::Balance => {
                if self.value < 0.0 {
                    (1.0, 1.0 + self.value)
                } else {
                    (1.0 - self.value, 1.0)
                }
            }
            PanLaw::EqualPower => {
                let theta = (self.value + 1.0) * std::f32::consts::FRAC_PI_4;
                (theta.cos(), theta.sin())
            }
        }
    }
}
