use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

macro_rules! impl_id {
    ($ident:ident) => {
        /// UUIDv7: time-ordered prefix, random tail. Safe to use in file names.
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $ident(pub Uuid);

        impl $ident {
            pub fn generate() -> Self {
                $ident(Uuid::now_v7())
            }
        }

        impl From<Uuid> for $ident {
            fn from(value: Uuid) -> Self {
                $ident(value)
            }
        }

        impl FromStr for $ident {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map($ident)
            }
        }

        impl Display for $ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }
    };
}

impl_id!(MediaId);

#[test]
fn generated_ids_are_distinct() {
    let ids: Vec<MediaId> = (0..1000).map(|_| MediaId::generate()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
}
