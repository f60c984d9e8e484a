//! Identifier types shared across the project model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The null identifier
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim_matches(|c| c == '{' || c == '}')).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identity of a project; immutable after creation
    ProjectId
);
uuid_id!(
    /// Identity of an image layer, change layer, or image sub-layer
    LayerId
);
uuid_id!(
    /// Identity of a generated artifact tracked by the file registry
    FileId
);
uuid_id!(
    /// Identity of a submitted background detection job
    JobId
);

/// Handle the canvas collaborator uses to refer to a drawable layer.
///
/// Derived from the owning layer id so a layer keeps the same handle across save/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderableHandle(LayerId);

impl RenderableHandle {
    pub fn for_layer(layer_id: LayerId) -> Self {
        Self(layer_id)
    }

    pub fn layer_id(&self) -> LayerId {
        self.0
    }
}

impl fmt::Display for RenderableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canvas:{}", self.0)
    }
}
