use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::{
    EncodeError, Error, Identity, ProtocolError, Result, MAX_PAYLOAD_SIZE, MAX_START_DELAY_MS,
    TAG_PREFIX,
};
use super::message::{Message, RoomName, ScoreEntry};

/// Protocol message codec for text frames
///
/// A frame is `REACTZ <TAG> <room name>[ <field>]`. Anything that does not
/// parse as such is treated as foreign traffic and decodes to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Creates a new message codec
    pub fn new() -> Self {
        MessageCodec
    }

    /// Encodes a message into a datagram payload
    pub fn encode_message(&mut self, message: &Message) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.encode(message, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Decodes a datagram payload, returning `None` for anything that is not ours
    pub fn decode_message(&mut self, payload: &[u8]) -> Option<Message> {
        let mut src = BytesMut::from(payload);
        self.decode(&mut src).ok().flatten()
    }
}

impl<'a> Encoder<&'a Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: &'a Message, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        let frame = render(item);

        // Checked before writing so an oversized frame leaves dst untouched
        if frame.len() > MAX_PAYLOAD_SIZE {
            return Err(EncodeError::TooLarge {
                size: frame.len(),
                max: MAX_PAYLOAD_SIZE,
            }
            .into());
        }

        dst.reserve(frame.len());
        dst.put_slice(frame.as_bytes());
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    /// Consumes the whole buffer as one datagram
    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let frame = src.split();
        match parse(&frame) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                trace!("Dropping frame: {}", e);
                Ok(None)
            }
        }
    }
}

fn render(message: &Message) -> String {
    let room = message.room();
    let tag = message.tag();
    match message {
        Message::Advertise { .. } | Message::Join { .. } | Message::JoinAck { .. } => {
            format!("{TAG_PREFIX}{tag} {room}")
        }
        Message::Start { delay_ms, .. } => format!("{TAG_PREFIX}{tag} {room} {delay_ms}"),
        Message::Time { elapsed_ms, .. } => format!("{TAG_PREFIX}{tag} {room} {elapsed_ms}"),
        Message::Result { entries, .. } => {
            let payload = entries
                .iter()
                .map(|e| format!("{}:{}", e.identity.to_hex(), e.elapsed_ms))
                .collect::<Vec<_>>()
                .join(",");
            format!("{TAG_PREFIX}{tag} {room} {payload}")
        }
    }
}

fn malformed(msg: impl Into<String>) -> ProtocolError {
    ProtocolError::MalformedFrame(msg.into())
}

fn parse(frame: &[u8]) -> std::result::Result<Message, ProtocolError> {
    if frame.len() > MAX_PAYLOAD_SIZE {
        return Err(malformed(format!("{} byte frame is oversized", frame.len())));
    }

    let text = std::str::from_utf8(frame).map_err(|_| malformed("frame is not UTF-8"))?;
    let body = text
        .strip_prefix(TAG_PREFIX)
        .ok_or_else(|| malformed("missing tag prefix"))?;
    let (tag, rest) = body
        .split_once(' ')
        .ok_or_else(|| malformed("missing room name"))?;

    match tag {
        "HOST" => Ok(Message::Advertise { room: RoomName::new(rest)? }),
        "JOIN" => Ok(Message::Join { room: RoomName::new(rest)? }),
        "JOINED" => Ok(Message::JoinAck { room: RoomName::new(rest)? }),
        "START" => {
            let (room, delay) = split_last_field(rest)?;
            let delay_ms = parse_number(delay)?;
            if delay_ms > MAX_START_DELAY_MS {
                return Err(malformed(format!("start delay {delay_ms} out of range")));
            }
            Ok(Message::Start { room, delay_ms })
        }
        "TIME" => {
            let (room, elapsed) = split_last_field(rest)?;
            Ok(Message::Time { room, elapsed_ms: parse_number(elapsed)? })
        }
        "RESULT" => {
            let (room, list) = split_last_field(rest)?;
            let entries = if list.is_empty() {
                Vec::new()
            } else {
                list.split(',').map(parse_entry).collect::<std::result::Result<Vec<_>, _>>()?
            };
            Ok(Message::Result { room, entries })
        }
        other => Err(malformed(format!("unknown tag {other:?}"))),
    }
}

/// Splits `<room name> <field>` at the last space
fn split_last_field(rest: &str) -> std::result::Result<(RoomName, &str), ProtocolError> {
    let (room, field) = rest
        .rsplit_once(' ')
        .ok_or_else(|| malformed("missing trailing field"))?;
    Ok((RoomName::new(room)?, field))
}

fn parse_number(field: &str) -> std::result::Result<u32, ProtocolError> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("{field:?} is not a number")));
    }
    field
        .parse()
        .map_err(|_| malformed(format!("{field:?} is out of range")))
}

fn parse_entry(pair: &str) -> std::result::Result<ScoreEntry, ProtocolError> {
    let (id, ms) = pair
        .split_once(':')
        .ok_or_else(|| malformed(format!("entry {pair:?} lacks ':'")))?;
    if id.len() != 12 {
        return Err(malformed(format!("identity {id:?} has the wrong length")));
    }
    let identity: Identity = id
        .parse()
        .map_err(|_| malformed(format!("identity {id:?} is not hex")))?;
    Ok(ScoreEntry::new(identity, parse_number(ms)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn room(name: &str) -> RoomName {
        RoomName::new(name).unwrap()
    }

    fn id(s: &str) -> Identity {
        s.parse().unwrap()
    }

    #[test]
    fn test_wire_format() {
        let mut codec = MessageCodec::new();
        let cases = vec![
            (Message::Advertise { room: room("banana fish") }, "REACTZ HOST banana fish"),
            (Message::Join { room: room("banana fish") }, "REACTZ JOIN banana fish"),
            (Message::JoinAck { room: room("banana fish") }, "REACTZ JOINED banana fish"),
            (
                Message::Start { room: room("banana fish"), delay_ms: 2500 },
                "REACTZ START banana fish 2500",
            ),
            (
                Message::Time { room: room("banana fish"), elapsed_ms: 312 },
                "REACTZ TIME banana fish 312",
            ),
            (
                Message::Result {
                    room: room("banana fish"),
                    entries: vec![
                        ScoreEntry::new(id("112233445566"), 280),
                        ScoreEntry::new(id("aabbccddeeff"), 312),
                    ],
                },
                "REACTZ RESULT banana fish 112233445566:280,aabbccddeeff:312",
            ),
        ];

        for (message, wire) in cases {
            let encoded = codec.encode_message(&message).unwrap();
            assert_eq!(&encoded[..], wire.as_bytes());
            assert_eq!(codec.decode_message(&encoded), Some(message));
        }
    }

    #[test]
    fn test_single_word_room_round_trip() {
        let mut codec = MessageCodec::new();
        let message = Message::Result { room: room("kite"), entries: vec![] };
        let encoded = codec.encode_message(&message).unwrap();
        assert_eq!(&encoded[..], b"REACTZ RESULT kite ");
        assert_eq!(codec.decode_message(&encoded), Some(message));
    }

    #[test]
    fn test_foreign_frames_are_ignored() {
        let mut codec = MessageCodec::new();
        let frames: &[&[u8]] = &[
            b"",
            b"HOST banana fish",
            b"REACTZ",
            b"REACTZ ",
            b"REACTZ HOST",
            b"REACTZ PING banana fish",
            b"REACTZ START banana fish",
            b"REACTZ START banana fish soon",
            b"REACTZ START banana fish -5",
            b"REACTZ START banana fish +5",
            b"REACTZ START banana fish 999999",
            b"REACTZ TIME banana fish 99999999999",
            b"REACTZ RESULT banana fish aabbccddeeff",
            b"REACTZ RESULT banana fish aabb:12",
            b"REACTZ RESULT banana fish aabbccddeeff:12,",
            b"REACTZ JOIN banana  fish",
            b"\xff\xfe\x00garbage",
        ];

        for frame in frames {
            assert_eq!(codec.decode_message(frame), None, "{:?}", String::from_utf8_lossy(frame));
        }
    }

    #[test]
    fn test_oversized_result_is_rejected_before_writing() {
        let mut codec = MessageCodec::new();
        let entries = (0..12u8)
            .map(|i| ScoreEntry::new(Identity([i; 6]), 4_000_000_000))
            .collect();
        let message = Message::Result { room: room("trapezoid seahorse"), entries };

        let mut dst = BytesMut::new();
        let err = codec.encode(&message, &mut dst).unwrap_err();
        assert!(matches!(err, Error::Encode(EncodeError::TooLarge { max: MAX_PAYLOAD_SIZE, .. })));
        assert!(dst.is_empty());
    }

    #[test]
    fn test_oversized_input_is_dropped() {
        let mut codec = MessageCodec::new();
        let mut frame = b"REACTZ HOST ".to_vec();
        frame.extend(std::iter::repeat(b'a').take(MAX_PAYLOAD_SIZE));
        assert_eq!(codec.decode_message(&frame), None);
    }

    #[test]
    fn test_decoder_consumes_whole_datagram() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(&b"REACTZ JOIN coral kite"[..]);
        let decoded = codec.decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(Message::Join { room: room("coral kite") }));
        assert!(buf.is_empty());

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    fn arb_room() -> impl Strategy<Value = RoomName> {
        (0..crate::util::words::ROOM_WORDS.len(), 0..crate::util::words::ROOM_WORDS.len()).prop_map(
            |(a, b)| {
                let words = crate::util::words::ROOM_WORDS;
                RoomName::new(format!("{} {}", words[a], words[b])).unwrap()
            },
        )
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        let entry = (any::<[u8; 6]>(), any::<u32>())
            .prop_map(|(bytes, ms)| ScoreEntry::new(Identity(bytes), ms));
        prop_oneof![
            arb_room().prop_map(|room| Message::Advertise { room }),
            arb_room().prop_map(|room| Message::Join { room }),
            arb_room().prop_map(|room| Message::JoinAck { room }),
            (arb_room(), 0..=MAX_START_DELAY_MS)
                .prop_map(|(room, delay_ms)| Message::Start { room, delay_ms }),
            (arb_room(), any::<u32>())
                .prop_map(|(room, elapsed_ms)| Message::Time { room, elapsed_ms }),
            (arb_room(), proptest::collection::vec(entry, 0..6))
                .prop_map(|(room, entries)| Message::Result { room, entries }),
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
            let _ = MessageCodec::new().decode_message(&bytes);
        }

        #[test]
        fn prop_frames_without_prefix_are_dropped(text in "[A-Z ]{0,40}") {
            prop_assume!(!text.starts_with(TAG_PREFIX));
            prop_assert_eq!(MessageCodec::new().decode_message(text.as_bytes()), None);
        }

        #[test]
        fn prop_encoded_messages_decode_back(message in arb_message()) {
            let mut codec = MessageCodec::new();
            let encoded = codec.encode_message(&message).unwrap();
            prop_assert!(encoded.len() <= MAX_PAYLOAD_SIZE);
            prop_assert_eq!(codec.decode_message(&encoded), Some(message));
        }
    }
}
