use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bands::{Band6Coefficients, BAND_COUNT};

/// Acoustic properties of one surface group.
///
/// Six per-octave-band absorption coefficients in [0, 1] plus a scalar
/// roughness in [0, 1] controlling the specular-vs-diffuse reflection mix
/// (0 = mirror, 1 = fully diffuse).
#[derive(Copy, Clone, Debug, PartialEq, Default, Deserialize, Serialize)]
pub struct MaterialProperties {
    pub absorption: Band6Coefficients,
    pub roughness: f32,
}

#[derive(Debug, Error, PartialEq)]
pub enum MaterialParseError {
    #[error("material name has no [..] absorption block")]
    MissingAbsorption,
    #[error("expected {BAND_COUNT} absorption coefficients, found {0}")]
    WrongCoefficientCount(usize),
    #[error("material name has no (..) roughness block")]
    MissingRoughness,
    #[error("invalid number in material name: {0:?}")]
    InvalidNumber(String),
}

fn parse_coefficient(text: &str) -> Result<f32, MaterialParseError> {
    text.trim()
        .parse::<f32>()
        .map_err(|_| MaterialParseError::InvalidNumber(text.trim().into()))
}

/// Decodes the acoustic parameters embedded in a mesh material name.
///
/// Room files carry absorption and roughness inside the material name using
/// `name[a0/a1/a2/a3/a4/a5](roughness)`, with the six absorption
/// coefficients ordered from the 125 Hz band upward. An empty name yields
/// the default properties; anything else must match the grammar exactly.
pub fn parse_material_name(name: &str) -> Result<MaterialProperties, MaterialParseError> {
    if name.is_empty() {
        return Ok(MaterialProperties::default());
    }

    let open = name.find('[').ok_or(MaterialParseError::MissingAbsorption)?;
    let close = name[open..]
        .find(']')
        .map(|i| open + i)
        .ok_or(MaterialParseError::MissingAbsorption)?;

    let values: Vec<&str> = name[open + 1..close].split('/').collect();
    if values.len() != BAND_COUNT {
        return Err(MaterialParseError::WrongCoefficientCount(values.len()));
    }

    let mut absorption = Band6Coefficients::default();
    for (band, value) in values.iter().enumerate() {
        absorption[band] = parse_coefficient(value)?;
    }

    let open = name[close..]
        .find('(')
        .map(|i| close + i)
        .ok_or(MaterialParseError::MissingRoughness)?;
    let close = name[open..]
        .find(')')
        .map(|i| open + i)
        .ok_or(MaterialParseError::MissingRoughness)?;
    let roughness = parse_coefficient(&name[open + 1..close])?;

    Ok(MaterialProperties {
        absorption,
        roughness,
    })
}
