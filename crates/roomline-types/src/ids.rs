use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use compact_str::CompactString;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UnixSeconds(pub u64);

impl UnixSeconds {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnixSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that carries a unix-second timestamp, either directly (a plain
/// number) or encoded in its first 8 hex digits (a line-id or commit-id).
///
/// Mirrors `timeOf(idOrNumber)`: the caller passes whichever it has and the
/// trait dispatch picks the right extraction, rather than branching on a
/// runtime type tag.
pub trait TimeSource {
    fn unix_seconds(&self) -> UnixSeconds;
}

impl TimeSource for UnixSeconds {
    fn unix_seconds(&self) -> UnixSeconds {
        *self
    }
}

fn parse_leading_hex8(s: &str) -> UnixSeconds {
    let prefix = &s.as_bytes()[..s.len().min(8)];
    let prefix = std::str::from_utf8(prefix).unwrap_or("0");
    let secs = u64::from_str_radix(prefix, 16).unwrap_or(0);
    UnixSeconds(secs)
}

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub CompactString);

        impl $name {
            pub fn new(id: impl Into<CompactString>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            pub fn into_string(self) -> String {
                self.0.into_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(CompactString::from(s))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(CompactString::from(s))
            }
        }
    };
}

opaque_id!(LineId);
opaque_id!(UserId);
opaque_id!(ProjectId);
opaque_id!(PageId);
opaque_id!(CommitId);

impl TimeSource for LineId {
    fn unix_seconds(&self) -> UnixSeconds {
        parse_leading_hex8(&self.0)
    }
}

impl TimeSource for CommitId {
    fn unix_seconds(&self) -> UnixSeconds {
        parse_leading_hex8(&self.0)
    }
}

/// `timeOf(idOrNumber)` — extracts the unix-second timestamp from anything
/// that carries one.
pub fn time_of(source: &impl TimeSource) -> UnixSeconds {
    source.unix_seconds()
}

/// Mints a fresh 24-hex-char line id: `hex8(now)` + last 6 hex chars of the
/// user id + `"0000"` + `hex6(random & 0xFFFFFE)`.
///
/// Collisions are not impossible, only negligible within one user's commit
/// rate — matching the source's own tolerance (§4.5).
pub fn new_line_id(user_id: &UserId) -> LineId {
    let now = UnixSeconds::now().get();
    let time_part = format!("{now:08x}");

    let user_hex = user_id.as_str();
    let user_part = if user_hex.len() >= 6 {
        user_hex[user_hex.len() - 6..].to_string()
    } else {
        format!("{user_hex:0>6}")
    };

    let random = rand::thread_rng().gen_range(0..0xFFFFFE_u32);
    let random_part = format!("{random:06x}");

    LineId::new(format!("{time_part}{user_part}0000{random_part}"))
}

/// Anchor for an `_insert` change-op: either a specific surviving line, or
/// "after the last line".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertAnchor {
    End,
    Before(LineId),
}

impl InsertAnchor {
    pub const END_TOKEN: &'static str = "_end";

    pub fn as_wire_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            InsertAnchor::End => std::borrow::Cow::Borrowed(Self::END_TOKEN),
            InsertAnchor::Before(id) => std::borrow::Cow::Borrowed(id.as_str()),
        }
    }

    pub fn from_wire_str(s: &str) -> Self {
        if s == Self::END_TOKEN {
            InsertAnchor::End
        } else {
            InsertAnchor::Before(LineId::new(s))
        }
    }
}

impl fmt::Display for InsertAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_line_id_embeds_timestamp_and_user_suffix() {
        let user = UserId::new("5f9b1c2d3e4f5a6b7c8d9e0f");
        let before = UnixSeconds::now();
        let id = new_line_id(&user);
        let after = UnixSeconds::now();

        assert_eq!(id.as_str().len(), 24, "line id should be 24 hex chars");
        let stamp = time_of(&id);
        assert!(stamp.get() >= before.get() && stamp.get() <= after.get());
        assert_eq!(&id.as_str()[8..14], "4f5a6b");
    }

    #[test]
    fn time_of_unix_seconds_is_identity() {
        let n = UnixSeconds(1_700_000_000);
        assert_eq!(time_of(&n), n);
    }

    #[test]
    fn time_of_parses_leading_hex8() {
        let id = LineId::new("6553f100abcdef00000012ab");
        assert_eq!(time_of(&id).get(), 0x6553f100);
    }

    #[test]
    fn insert_anchor_wire_roundtrip() {
        assert_eq!(InsertAnchor::from_wire_str("_end"), InsertAnchor::End);
        let anchor = InsertAnchor::from_wire_str("abc123");
        assert_eq!(anchor.as_wire_str(), "abc123");
    }
}
