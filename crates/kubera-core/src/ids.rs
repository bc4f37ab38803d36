//! Arena-style integer identifiers.
//!
//! Every persisted record is addressed by a 64-bit row id wrapped in its own
//! newtype, so a `TermId` can never be passed where a `ContractId` is
//! expected. Records refer to each other only through these ids.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<i64> for $name {
      fn from(raw: i64) -> Self { Self(raw) }
    }
  };
}

id_type!(
  /// A healthcare provider (entity store).
  ProviderId
);
id_type!(
  /// A payor (entity store).
  PayorId
);
id_type!(
  /// A document held by the external document store.
  DocumentId
);
id_type!(
  /// A provider–payor contract.
  ContractId
);
id_type!(
  /// A named term on one contract.
  TermId
);
id_type!(
  /// A committed amendment.
  AmendmentId
);
id_type!(
  /// One entry of a term's revision log. Assigned in insertion order, so it
  /// doubles as the tie-breaker between revisions with equal `changed_at`.
  RevisionId
);
