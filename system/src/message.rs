use crate::history::History;
use crate::types::ActionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} envelope without payload")]
    MissingPayload(&'static str),
}

/// Steady-state message from a session member, decoded only as far as
/// dispatch needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Drawing(ActionRecord),
    GetHistory,
    Undo,
    Redo,
    Unknown(String),
}

#[derive(Deserialize)]
struct RawEnvelope {
    kind: String,
    #[serde(default)]
    payload: Option<ActionRecord>,
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: RawEnvelope = serde_json::from_slice(bytes)?;
        let envelope = match raw.kind.as_str() {
            "drawing" => Envelope::Drawing(raw.payload.ok_or(DecodeError::MissingPayload("drawing"))?),
            "getHistory" => Envelope::GetHistory,
            "undo" | "history_undo" => Envelope::Undo,
            "redo" | "history_redo" => Envelope::Redo,
            _ => Envelope::Unknown(raw.kind),
        };
        Ok(envelope)
    }
}

#[derive(Serialize)]
struct HistoryMessage<'a> {
    kind: &'static str,
    payload: &'a History,
}

/// `{"kind":"history","payload":{"actions":[..],"redoStack":[..]}}`
pub fn encode_history(history: &History) -> Result<String, serde_json::Error> {
    serde_json::to_string(&HistoryMessage {
        kind: "history",
        payload: history,
    })
}
