use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unrecognised wire value for a string-backed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid enum value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde goes through the same strings so the wire form matches storage.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(
    /// Workflow progress of a prescription, merged in from the status store.
    FulfillmentStatus {
        Pending => "Pending",
        PrescriptionIssued => "Prescription Issued",
        Completed => "Completed",
    }
);

str_enum!(
    /// A value that can be written to the status store. `Pending` is not
    /// writable: it is the absence of an entry.
    FulfillmentAction {
        PrescriptionIssued => "Prescription Issued",
        Completed => "Completed",
    }
);

impl Default for FulfillmentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl From<FulfillmentAction> for FulfillmentStatus {
    fn from(action: FulfillmentAction) -> Self {
        match action {
            FulfillmentAction::PrescriptionIssued => Self::PrescriptionIssued,
            FulfillmentAction::Completed => Self::Completed,
        }
    }
}

impl FulfillmentStatus {
    /// Position in the conventional Pending → Issued → Completed order.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::PrescriptionIssued => 1,
            Self::Completed => 2,
        }
    }
}
