use serde::{Deserialize, Serialize};

/// Messages sent from the client to the transcription service.
///
/// Audio travels as raw binary frames; everything else is a small JSON
/// control message.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A chunk of raw little-endian PCM16 audio.
    Audio(Vec<u8>),
    /// Heartbeat to keep an otherwise idle connection open.
    KeepAlive,
    /// Ask the server to flush and close the stream.
    CloseStream,
}

#[derive(Debug, Serialize)]
pub(crate) struct ControlMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
}

/// Events broadcast to subscribers of the live connection.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A transcript fragment. `is_final` distinguishes confirmed text from
    /// interim candidates that may still be revised.
    Transcript { text: String, is_final: bool },
    /// The socket closed, normally or otherwise.
    Closed { reason: Option<String> },
}

/// One result frame as the service sends it.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_final: bool,
    pub channel: Option<Channel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Channel {
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Alternative {
    pub transcript: String,
}

impl ResultFrame {
    /// The best transcript in the frame, if it carries one.
    pub fn transcript(&self) -> Option<&str> {
        self.channel
            .as_ref()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_frame() {
        let raw = r#"{
            "type": "Results",
            "is_final": true,
            "channel": { "alternatives": [ { "transcript": "hello there", "confidence": 0.98 } ] }
        }"#;
        let frame: ResultFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "Results");
        assert!(frame.is_final);
        assert_eq!(frame.transcript(), Some("hello there"));
    }

    #[test]
    fn metadata_frame_has_no_transcript() {
        let raw = r#"{ "type": "Metadata", "request_id": "abc" }"#;
        let frame: ResultFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "Metadata");
        assert!(frame.transcript().is_none());
    }

    #[test]
    fn keepalive_serializes_as_control_message() {
        let text = serde_json::to_string(&ControlMessage { kind: "KeepAlive" }).unwrap();
        assert_eq!(text, r#"{"type":"KeepAlive"}"#);
    }
}
