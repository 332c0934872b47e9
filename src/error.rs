use thiserror::Error;

#[derive(Error, Debug)]
pub enum SonoError {
    #[error("no active microphone in the scene")]
    NoActiveMicrophone,

    #[error("no active speakers in the scene")]
    NoActiveSpeakers,

    #[error("the room mesh has no triangles")]
    EmptyRoom,

    #[error("receiver '{receiver}' gathered no energy portions")]
    EmptyHistogram { receiver: String },

    #[error("an object named '{name}' already exists")]
    DuplicateObjectName { name: String },

    #[error("material name parse error: {0}")]
    MaterialParse(#[from] crate::scene::MaterialParseError),

    #[error("{stage} did not converge within its iteration cap")]
    DidNotConverge { stage: &'static str },

    #[error("the run was cancelled")]
    Cancelled,
}

impl SonoError {
    /// Configuration gaps mean there is nothing to simulate; everything else
    /// is a real failure.
    pub fn is_nothing_to_do(&self) -> bool {
        matches!(
            self,
            Self::NoActiveMicrophone
                | Self::NoActiveSpeakers
                | Self::EmptyRoom
                | Self::EmptyHistogram { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SonoError>;
