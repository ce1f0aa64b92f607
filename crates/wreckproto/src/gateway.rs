use serde::{Deserialize, Serialize};

use crate::{ChannelId, ProtoError, UserId};

/// A channel the adapter can post into, as announced by `hello`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
}

/// A structured render payload. The adapter translates this into whatever
/// rich-message shape its platform supports; the core never emits markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub fields: Vec<(String, String)>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Card {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
            image: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }
}

/// Adapter -> core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayUp {
    /// Announced once after connect: the text-capable channels visible to the
    /// adapter. This is the spawn scheduler's eligible-channel set.
    Hello { channels: Vec<ChannelRef> },
    /// One participant utterance from one channel.
    Directive {
        user: UserId,
        channel: ChannelId,
        text: String,
    },
}

/// Core -> adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayDown {
    Render { channel: ChannelId, card: Card },
}

pub fn decode_up(line: &str) -> Result<GatewayUp, ProtoError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtoError::EmptyLine);
    }
    serde_json::from_str(line).map_err(|e| ProtoError::Malformed(e.to_string()))
}

pub fn decode_down(line: &str) -> Result<GatewayDown, ProtoError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtoError::EmptyLine);
    }
    serde_json::from_str(line).map_err(|e| ProtoError::Malformed(e.to_string()))
}

pub fn encode_up(msg: &GatewayUp) -> String {
    serde_json::to_string(msg).expect("gateway message serializes")
}

pub fn encode_down(msg: &GatewayDown) -> String {
    serde_json::to_string(msg).expect("gateway message serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_up_hello_and_directive() {
        let up = decode_up(r##"{"type":"hello","channels":[{"id":42,"name":"#arcade"}]}"##)
            .expect("hello");
        assert_eq!(
            up,
            GatewayUp::Hello {
                channels: vec![ChannelRef {
                    id: ChannelId(42),
                    name: "#arcade".to_string(),
                }],
            }
        );

        let up = decode_up(r#"{"type":"directive","user":"u:7","channel":42,"text":"engage"}"#)
            .expect("directive");
        assert_eq!(
            up,
            GatewayUp::Directive {
                user: UserId::new("u:7"),
                channel: ChannelId(42),
                text: "engage".to_string(),
            }
        );
    }

    #[test]
    fn decode_up_rejects_empty_and_garbage() {
        assert!(matches!(decode_up("   "), Err(ProtoError::EmptyLine)));
        assert!(matches!(
            decode_up("not json"),
            Err(ProtoError::Malformed(_))
        ));
        assert!(matches!(
            decode_up(r#"{"type":"warp","x":1}"#),
            Err(ProtoError::Malformed(_))
        ));
    }

    #[test]
    fn encoded_down_is_one_line_the_adapter_can_decode() {
        let msg = GatewayDown::Render {
            channel: ChannelId(9),
            card: Card::new("A derelict drifts into view", "Engage it before someone else does")
                .field("Hull", "1200")
                .image("https://example.invalid/hulk.png"),
        };
        let line = encode_down(&msg);
        assert!(!line.contains('\n'));
        assert_eq!(decode_down(&line).expect("round trip"), msg);
    }
}
