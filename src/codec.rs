use bytes::{Buf, BufMut, BytesMut};
use std::convert::TryInto;
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};
use crate::Error;

pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A reply that keeps growing without ever completing must not exhaust memory.
        if src.len() > self.max_frame_size {
            return Err(format!(
                "frame size {} exceeds limit of {} bytes",
                src.len(),
                self.max_frame_size
            )
            .into());
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => return Ok(None), // Not enough data to parse a frame.
            Err(err) => return Err(err.into()),
        };

        let position: usize = cursor.position().try_into()?;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = frame.serialize();
        dst.reserve(bytes.len());
        dst.put_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut codec = FrameCodec::new(1024);
        let mut buffer = BytesMut::from(&b"$5\r\nhel"[..]);

        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), 7);

        buffer.extend_from_slice(b"lo\r\n");
        let frame = codec.decode(&mut buffer).unwrap();

        assert_eq!(frame, Some(Frame::Bulk(Bytes::from("hello"))));
        assert!(buffer.is_empty());
    }

    #[test]
    fn decode_consumes_one_frame_at_a_time() {
        let mut codec = FrameCodec::new(1024);
        let mut buffer = BytesMut::from(&b"+OK\r\n:42\r\n"[..]);

        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(Frame::Simple("OK".to_string()))
        );
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(Frame::Integer(42)));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let mut codec = FrameCodec::new(4);
        let mut buffer = BytesMut::from(&b"$10\r\n0123"[..]);

        assert!(codec.decode(&mut buffer).is_err());
    }

    #[test]
    fn decode_rejects_unknown_data_type() {
        let mut codec = FrameCodec::new(1024);
        let mut buffer = BytesMut::from(&b"hello\r\n"[..]);

        assert!(codec.decode(&mut buffer).is_err());
    }

    #[test]
    fn encode_command() {
        let mut codec = FrameCodec::new(1024);
        let mut buffer = BytesMut::new();

        codec.encode(&Frame::command("PING"), &mut buffer).unwrap();

        assert_eq!(&buffer[..], b"*1\r\n$4\r\nPING\r\n");
    }
}
