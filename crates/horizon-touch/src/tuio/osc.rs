//! Open Sound Control 1.0 packets.
//!
//! TUIO travels as OSC messages, usually grouped in a `#bundle` per frame.
//! [`decode`] parses a packet from raw bytes; every read is bounds-checked,
//! so truncated or corrupt input yields an [`OscError`] instead of a panic.
//! [`encode`] produces the wire form and is used by simulators and tests.
//!
//! Supported argument type tags: `i f s S b h d t c r m T F N I`.

use bytes::{Buf, BufMut, BytesMut};

const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";
const MAX_BUNDLE_DEPTH: usize = 16;

/// Errors produced while decoding an OSC packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OscError {
    /// The packet ended before a complete value could be read.
    #[error("packet truncated")]
    Truncated,
    /// The packet is neither a message nor a bundle.
    #[error("packet is neither a message nor a bundle")]
    BadPacket,
    /// A string was not NUL-terminated or not valid UTF-8.
    #[error("malformed string")]
    BadString,
    /// The type tag string does not start with ','.
    #[error("malformed type tag string")]
    BadTypeTag,
    /// An argument type tag is not supported.
    #[error("unsupported type tag '{0}'")]
    UnsupportedType(char),
    /// A bundle element has an impossible size.
    #[error("malformed bundle element")]
    BadBundle,
    /// Bundles are nested too deeply.
    #[error("bundles nested too deeply")]
    TooDeep,
}

/// An OSC time tag: NTP seconds and fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OscTime {
    pub seconds: u32,
    pub fractional: u32,
}

impl OscTime {
    /// The special "immediately" time tag.
    pub const IMMEDIATE: Self = Self {
        seconds: 0,
        fractional: 1,
    };
}

/// An RGBA color argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OscColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

/// A single OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscType {
    Int(i32),
    Float(f32),
    String(String),
    Symbol(String),
    Blob(Vec<u8>),
    Long(i64),
    Double(f64),
    Time(OscTime),
    Char(char),
    Color(OscColor),
    Midi([u8; 4]),
    Bool(bool),
    Nil,
    Inf,
}

impl OscType {
    fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => b'i',
            Self::Float(_) => b'f',
            Self::String(_) => b's',
            Self::Symbol(_) => b'S',
            Self::Blob(_) => b'b',
            Self::Long(_) => b'h',
            Self::Double(_) => b'd',
            Self::Time(_) => b't',
            Self::Char(_) => b'c',
            Self::Color(_) => b'r',
            Self::Midi(_) => b'm',
            Self::Bool(true) => b'T',
            Self::Bool(false) => b'F',
            Self::Nil => b'N',
            Self::Inf => b'I',
        }
    }

    /// The value as a 32-bit integer, accepting any integral argument.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Long(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as a float, accepting any numeric argument.
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Double(v) => Some(v as f32),
            Self::Int(v) => Some(v as f32),
            Self::Long(v) => Some(v as f32),
            _ => None,
        }
    }

    /// The value as a string, accepting strings and symbols.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a time tag.
    pub fn as_time(&self) -> Option<OscTime> {
        match *self {
            Self::Time(t) => Some(t),
            _ => None,
        }
    }
}

/// An OSC message: an address pattern and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub addr: String,
    pub args: Vec<OscType>,
}

impl OscMessage {
    /// Create a message.
    pub fn new(addr: impl Into<String>, args: Vec<OscType>) -> Self {
        Self {
            addr: addr.into(),
            args,
        }
    }

    /// The first argument as a string, which TUIO uses as the command name.
    pub fn command(&self) -> Option<&str> {
        self.args.first().and_then(OscType::as_str)
    }
}

/// A bundle of packets sharing a time tag.
#[derive(Debug, Clone, PartialEq)]
pub struct OscBundle {
    pub timetag: OscTime,
    pub content: Vec<OscPacket>,
}

/// A message or a bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    /// Flatten nested bundles into their messages, in wire order.
    pub fn into_messages(self, out: &mut Vec<OscMessage>) {
        match self {
            Self::Message(message) => out.push(message),
            Self::Bundle(bundle) => {
                for packet in bundle.content {
                    packet.into_messages(out);
                }
            }
        }
    }
}

/// Decode one packet.
pub fn decode(data: &[u8]) -> Result<OscPacket, OscError> {
    decode_packet(data, 0)
}

fn decode_packet(data: &[u8], depth: usize) -> Result<OscPacket, OscError> {
    if data.starts_with(BUNDLE_TAG) {
        decode_bundle(&data[BUNDLE_TAG.len()..], depth)
    } else if data.first() == Some(&b'/') {
        decode_message(data).map(OscPacket::Message)
    } else {
        Err(OscError::BadPacket)
    }
}

fn decode_bundle(mut buf: &[u8], depth: usize) -> Result<OscPacket, OscError> {
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(OscError::TooDeep);
    }
    let timetag = read_time(&mut buf)?;
    let mut content = Vec::new();
    while buf.has_remaining() {
        let size = read_i32(&mut buf)?;
        let size = usize::try_from(size).map_err(|_| OscError::BadBundle)?;
        if size > buf.remaining() || size % 4 != 0 {
            return Err(OscError::BadBundle);
        }
        content.push(decode_packet(&buf[..size], depth + 1)?);
        buf.advance(size);
    }
    Ok(OscPacket::Bundle(OscBundle { timetag, content }))
}

fn decode_message(mut buf: &[u8]) -> Result<OscMessage, OscError> {
    let addr = read_string(&mut buf)?;

    // Very old senders omit the type tag string entirely.
    if !buf.has_remaining() {
        return Ok(OscMessage::new(addr, Vec::new()));
    }

    let tags = read_string(&mut buf)?;
    let Some(tags) = tags.strip_prefix(',') else {
        return Err(OscError::BadTypeTag);
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        args.push(read_arg(&mut buf, tag)?);
    }
    Ok(OscMessage::new(addr, args))
}

fn read_arg(buf: &mut &[u8], tag: char) -> Result<OscType, OscError> {
    let arg = match tag {
        'i' => OscType::Int(read_i32(buf)?),
        'f' => OscType::Float(f32::from_bits(read_u32(buf)?)),
        's' => OscType::String(read_string(buf)?),
        'S' => OscType::Symbol(read_string(buf)?),
        'b' => OscType::Blob(read_blob(buf)?),
        'h' => OscType::Long(read_u64(buf)? as i64),
        'd' => OscType::Double(f64::from_bits(read_u64(buf)?)),
        't' => OscType::Time(read_time(buf)?),
        'c' => {
            let code = read_u32(buf)?;
            OscType::Char(char::from_u32(code).ok_or(OscError::UnsupportedType('c'))?)
        }
        'r' => {
            let [red, green, blue, alpha] = read_u32(buf)?.to_be_bytes();
            OscType::Color(OscColor {
                red,
                green,
                blue,
                alpha,
            })
        }
        'm' => OscType::Midi(read_u32(buf)?.to_be_bytes()),
        'T' => OscType::Bool(true),
        'F' => OscType::Bool(false),
        'N' => OscType::Nil,
        'I' => OscType::Inf,
        other => return Err(OscError::UnsupportedType(other)),
    };
    Ok(arg)
}

fn read_u32(buf: &mut &[u8]) -> Result<u32, OscError> {
    if buf.remaining() < 4 {
        return Err(OscError::Truncated);
    }
    Ok(buf.get_u32())
}

fn read_i32(buf: &mut &[u8]) -> Result<i32, OscError> {
    if buf.remaining() < 4 {
        return Err(OscError::Truncated);
    }
    Ok(buf.get_i32())
}

fn read_u64(buf: &mut &[u8]) -> Result<u64, OscError> {
    if buf.remaining() < 8 {
        return Err(OscError::Truncated);
    }
    Ok(buf.get_u64())
}

fn read_time(buf: &mut &[u8]) -> Result<OscTime, OscError> {
    let seconds = read_u32(buf)?;
    let fractional = read_u32(buf)?;
    Ok(OscTime {
        seconds,
        fractional,
    })
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn read_string(buf: &mut &[u8]) -> Result<String, OscError> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(OscError::BadString)?;
    let text = std::str::from_utf8(&buf[..nul])
        .map_err(|_| OscError::BadString)?
        .to_owned();
    let consumed = padded(nul + 1);
    if consumed > buf.remaining() {
        return Err(OscError::Truncated);
    }
    buf.advance(consumed);
    Ok(text)
}

fn read_blob(buf: &mut &[u8]) -> Result<Vec<u8>, OscError> {
    let len = usize::try_from(read_i32(buf)?).map_err(|_| OscError::Truncated)?;
    let consumed = padded(len);
    if consumed > buf.remaining() {
        return Err(OscError::Truncated);
    }
    let blob = buf[..len].to_vec();
    buf.advance(consumed);
    Ok(blob)
}

/// Encode a packet to its wire form.
pub fn encode(packet: &OscPacket) -> Vec<u8> {
    let mut out = BytesMut::new();
    encode_packet(packet, &mut out);
    out.to_vec()
}

fn encode_packet(packet: &OscPacket, out: &mut BytesMut) {
    match packet {
        OscPacket::Message(message) => encode_message(message, out),
        OscPacket::Bundle(bundle) => {
            out.put_slice(BUNDLE_TAG);
            out.put_u32(bundle.timetag.seconds);
            out.put_u32(bundle.timetag.fractional);
            for element in &bundle.content {
                let mut inner = BytesMut::new();
                encode_packet(element, &mut inner);
                out.put_i32(inner.len() as i32);
                out.put_slice(&inner);
            }
        }
    }
}

fn encode_message(message: &OscMessage, out: &mut BytesMut) {
    write_string(&message.addr, out);

    let mut tags = String::with_capacity(message.args.len() + 1);
    tags.push(',');
    tags.extend(message.args.iter().map(|arg| arg.tag() as char));
    write_string(&tags, out);

    for arg in &message.args {
        match arg {
            OscType::Int(v) => out.put_i32(*v),
            OscType::Float(v) => out.put_f32(*v),
            OscType::String(s) | OscType::Symbol(s) => write_string(s, out),
            OscType::Blob(data) => {
                out.put_i32(data.len() as i32);
                out.put_slice(data);
                write_padding(data.len(), out);
            }
            OscType::Long(v) => out.put_i64(*v),
            OscType::Double(v) => out.put_f64(*v),
            OscType::Time(t) => {
                out.put_u32(t.seconds);
                out.put_u32(t.fractional);
            }
            OscType::Char(c) => out.put_u32(*c as u32),
            OscType::Color(c) => out.put_slice(&[c.red, c.green, c.blue, c.alpha]),
            OscType::Midi(bytes) => out.put_slice(bytes),
            OscType::Bool(_) | OscType::Nil | OscType::Inf => {}
        }
    }
}

fn write_string(s: &str, out: &mut BytesMut) {
    out.put_slice(s.as_bytes());
    out.put_u8(0);
    write_padding(s.len() + 1, out);
}

fn write_padding(len: usize, out: &mut BytesMut) {
    out.put_bytes(0, padded(len) - len);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(addr: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage::new(addr, args))
    }

    #[test]
    fn test_message_wire_format() {
        let bytes = encode(&message("/tuio/2Dcur", vec![OscType::String("alive".into())]));
        // "/tuio/2Dcur\0" (12) + ",s\0\0" (4) + "alive\0\0\0" (8)
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[..12], b"/tuio/2Dcur\0");
        assert_eq!(&bytes[12..16], b",s\0\0");
        assert_eq!(&bytes[16..], b"alive\0\0\0");
    }

    #[test]
    fn test_decode_all_types() {
        let args = vec![
            OscType::Int(-7),
            OscType::Float(0.25),
            OscType::String("set".into()),
            OscType::Symbol("sym".into()),
            OscType::Blob(vec![1, 2, 3]),
            OscType::Long(1 << 40),
            OscType::Double(0.5),
            OscType::Time(OscTime::IMMEDIATE),
            OscType::Char('x'),
            OscType::Color(OscColor {
                red: 1,
                green: 2,
                blue: 3,
                alpha: 4,
            }),
            OscType::Midi([0, 0x90, 60, 100]),
            OscType::Bool(true),
            OscType::Bool(false),
            OscType::Nil,
            OscType::Inf,
        ];
        let packet = message("/test", args);
        assert_eq!(decode(&encode(&packet)).unwrap(), packet);
    }

    #[test]
    fn test_nested_bundles_flatten_in_order() {
        let inner = OscPacket::Bundle(OscBundle {
            timetag: OscTime::IMMEDIATE,
            content: vec![message("/b", vec![]), message("/c", vec![])],
        });
        let outer = OscPacket::Bundle(OscBundle {
            timetag: OscTime::IMMEDIATE,
            content: vec![message("/a", vec![]), inner],
        });

        let mut messages = Vec::new();
        decode(&encode(&outer)).unwrap().into_messages(&mut messages);
        let addrs: Vec<_> = messages.iter().map(|m| m.addr.as_str()).collect();
        assert_eq!(addrs, ["/a", "/b", "/c"]);
    }

    #[test]
    fn test_truncated_packets_never_panic() {
        let packet = message(
            "/tuio/2Dobj",
            vec![
                OscType::String("set".into()),
                OscType::Int(1),
                OscType::Float(0.5),
                OscType::Blob(vec![9; 5]),
            ],
        );
        let bytes = encode(&packet);
        // 12 bytes is the bare address, a valid tagless message.
        for len in (0..bytes.len()).filter(|&len| len != 12) {
            assert!(decode(&bytes[..len]).is_err(), "prefix of {len} bytes decoded");
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(decode(b"hello"), Err(OscError::BadPacket));
        assert_eq!(decode(b"/a\0\0x\0\0\0"), Err(OscError::BadTypeTag));
        assert_eq!(decode(b"/a\0\0,q\0\0"), Err(OscError::UnsupportedType('q')));
    }

    #[test]
    fn test_bundle_with_bad_element_size() {
        let mut bytes = encode(&OscPacket::Bundle(OscBundle {
            timetag: OscTime::IMMEDIATE,
            content: vec![message("/a", vec![])],
        }));
        // Claim a larger element than the packet holds.
        bytes[16..20].copy_from_slice(&1000i32.to_be_bytes());
        assert_eq!(decode(&bytes), Err(OscError::BadBundle));
    }

    #[test]
    fn test_message_without_type_tags() {
        let packet = decode(b"/ping\0\0\0").unwrap();
        assert_eq!(packet, message("/ping", vec![]));
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(OscType::Int(3).as_f32(), Some(3.0));
        assert_eq!(OscType::Long(5).as_i32(), Some(5));
        assert_eq!(OscType::Long(i64::MAX).as_i32(), None);
        assert_eq!(OscType::Symbol("x".into()).as_str(), Some("x"));
        assert_eq!(OscType::Nil.as_f32(), None);
    }
}
