use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::RoomError;
use crate::ids::{InsertAnchor, LineId};

/// One ordered record inside a commit batch (§3).
///
/// Applied left-to-right; an op's anchor must exist in the state produced
/// by all prior ops in the same batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeOp {
    /// Insert a fresh line before `anchor` (or at the end).
    Insert {
        anchor: InsertAnchor,
        line_id: LineId,
        text: String,
    },
    /// Replace the text of the line anchored at `anchor`.
    Update { anchor: LineId, text: String },
    /// Remove the line anchored at `anchor`.
    Delete { anchor: LineId },
    /// Set the page title (derived, never hand-authored by a caller).
    Title(String),
    /// Set the line-2..line-6 description snapshot (derived).
    Descriptions(Vec<String>),
    /// Delete the whole page. Only valid alone in a batch.
    DeletedPage,
}

const KEY_INSERT: &str = "_insert";
const KEY_UPDATE: &str = "_update";
const KEY_DELETE: &str = "_delete";
const KEY_TITLE: &str = "title";
const KEY_DESCRIPTIONS: &str = "descriptions";
const KEY_DELETED: &str = "deleted";

impl ChangeOp {
    /// Encodes this op as the flat JSON object the wire expects: no enum
    /// tag wrapper, only the keys named for this variant.
    pub fn to_json(&self) -> Value {
        match self {
            ChangeOp::Insert {
                anchor,
                line_id,
                text,
            } => json!({
                KEY_INSERT: anchor.as_wire_str(),
                "lines": { "id": line_id.as_str(), "text": text },
            }),
            ChangeOp::Update { anchor, text } => json!({
                KEY_UPDATE: anchor.as_str(),
                "lines": { "text": text },
            }),
            ChangeOp::Delete { anchor } => json!({
                KEY_DELETE: anchor.as_str(),
                "lines": -1,
            }),
            ChangeOp::Title(title) => json!({ KEY_TITLE: title }),
            ChangeOp::Descriptions(lines) => json!({ KEY_DESCRIPTIONS: lines }),
            ChangeOp::DeletedPage => json!({ KEY_DELETED: true }),
        }
    }

    /// Decodes a flat JSON object by which discriminant key is present,
    /// rejecting ambiguous or empty objects.
    pub fn from_json(value: &Value) -> Result<Self, RoomError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RoomError::Codec("change-op must be a JSON object".into()))?;

        let present: Vec<&str> = [
            KEY_INSERT,
            KEY_UPDATE,
            KEY_DELETE,
            KEY_TITLE,
            KEY_DESCRIPTIONS,
            KEY_DELETED,
        ]
        .into_iter()
        .filter(|k| obj.contains_key(*k))
        .collect();

        match present.as_slice() {
            [] => Err(RoomError::Codec(
                "change-op names none of _insert/_update/_delete/title/descriptions/deleted"
                    .into(),
            )),
            [one] => Self::from_discriminant(*one, obj),
            many => Err(RoomError::Codec(format!(
                "change-op names more than one discriminant key: {}",
                many.join(", ")
            ))),
        }
    }

    fn from_discriminant(key: &str, obj: &Map<String, Value>) -> Result<Self, RoomError> {
        match key {
            KEY_INSERT => {
                let anchor = obj
                    .get(KEY_INSERT)
                    .and_then(Value::as_str)
                    .ok_or_else(|| RoomError::Codec("_insert anchor must be a string".into()))?;
                let lines = obj
                    .get("lines")
                    .and_then(Value::as_object)
                    .ok_or_else(|| RoomError::Codec("_insert missing lines payload".into()))?;
                let id = lines
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RoomError::Codec("_insert lines.id must be a string".into()))?;
                let text = lines
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        RoomError::Codec("_insert lines.text must be a string".into())
                    })?;
                Ok(ChangeOp::Insert {
                    anchor: InsertAnchor::from_wire_str(anchor),
                    line_id: LineId::new(id),
                    text: text.to_string(),
                })
            }
            KEY_UPDATE => {
                let anchor = obj
                    .get(KEY_UPDATE)
                    .and_then(Value::as_str)
                    .ok_or_else(|| RoomError::Codec("_update anchor must be a string".into()))?;
                let text = obj
                    .get("lines")
                    .and_then(Value::as_object)
                    .and_then(|l| l.get("text"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        RoomError::Codec("_update lines.text must be a string".into())
                    })?;
                Ok(ChangeOp::Update {
                    anchor: LineId::new(anchor),
                    text: text.to_string(),
                })
            }
            KEY_DELETE => {
                let anchor = obj
                    .get(KEY_DELETE)
                    .and_then(Value::as_str)
                    .ok_or_else(|| RoomError::Codec("_delete anchor must be a string".into()))?;
                Ok(ChangeOp::Delete {
                    anchor: LineId::new(anchor),
                })
            }
            KEY_TITLE => {
                let title = obj
                    .get(KEY_TITLE)
                    .and_then(Value::as_str)
                    .ok_or_else(|| RoomError::Codec("title must be a string".into()))?;
                Ok(ChangeOp::Title(title.to_string()))
            }
            KEY_DESCRIPTIONS => {
                let arr = obj
                    .get(KEY_DESCRIPTIONS)
                    .and_then(Value::as_array)
                    .ok_or_else(|| RoomError::Codec("descriptions must be an array".into()))?;
                let lines = arr
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| RoomError::Codec("descriptions[] must be strings".into()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ChangeOp::Descriptions(lines))
            }
            KEY_DELETED => Ok(ChangeOp::DeletedPage),
            other => Err(RoomError::Codec(format!("unknown discriminant: {other}"))),
        }
    }
}

impl Serialize for ChangeOp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChangeOp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ChangeOp::from_json(&value).map_err(serde::de::Error::custom)
    }
}
