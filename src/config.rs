use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::scene::Object;

/// Room volume estimation quality. Anything above `Off` enables the voxel
/// flood fill, with higher levels using smaller cubes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
pub enum VolumeQuality {
    Off,
    Coarse,
    Medium,
    Fine,
}

impl VolumeQuality {
    /// Edge length of the flood-fill cube, `None` when refined estimation is
    /// disabled.
    pub fn cube_size_cm(self) -> Option<i32> {
        match self {
            Self::Off => None,
            Self::Coarse => Some(75),
            Self::Medium => Some(50),
            Self::Fine => Some(25),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channel_count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// Excitation signal the band envelopes are imprinted on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
pub enum ExcitationMode {
    WhiteNoise,
    DiracSequence,
}

/// All knobs of one simulation run.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SimulationSettings {
    pub rays_per_source: u32,
    pub volume_quality: VolumeQuality,
    pub sample_rate: f64,
    pub channels: ChannelLayout,
    pub excitation: ExcitationMode,
    /// Clamp negative Lambert cosines to zero instead of letting
    /// backside reflections subtract energy
    pub clamp_lambert_cosine: bool,
    /// Seed for all stochastic stages; a fixed seed reproduces the run
    /// bit for bit
    pub seed: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            rays_per_source: 100,
            volume_quality: VolumeQuality::Medium,
            sample_rate: 48_000.0,
            channels: ChannelLayout::Stereo,
            excitation: ExcitationMode::DiracSequence,
            clamp_lambert_cosine: false,
            seed: 0,
        }
    }
}

/// The host-persisted part of a session: scene objects plus settings.
/// (De)serialized through strings only; file handling stays with the host.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SessionState {
    pub objects: Vec<Object>,
    pub settings: SimulationSettings,
}

impl SessionState {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
