//! # Frame Parsing and Serialization (RFC 9000 Section 12.4)
//!
//! `Frame::parse` reads the leading type field and consumes exactly the
//! frame's encoding from the front of the buffer. `Frame::encode` writes
//! the same layout back, and `Frame::encoded_len` reports its exact size.

#![forbid(unsafe_code)]

use super::types::*;
use crate::error::{Error, Result, TransportError};
use crate::types::{StreamDirection, StreamId, Token};
use crate::varint::{VarInt, VarIntCodec};
use bytes::{Buf, BufMut, Bytes, BytesMut};

impl Frame {
    /// Parse one frame from the front of `buf`, advancing past it.
    pub fn parse(buf: &mut Bytes) -> Result<Frame> {
        let frame_type = VarIntCodec::get(buf)?;
        let ty = u8::try_from(frame_type)
            .map_err(|_| Error::Transport(TransportError::FrameEncodingError))?;

        let frame = match ty {
            FRAME_TYPE_PADDING => {
                // Collapse the whole run of zero bytes into one frame.
                let run = buf.iter().take_while(|b| **b == 0).count();
                buf.advance(run);
                Frame::Padding(run + 1)
            }
            FRAME_TYPE_PING => Frame::Ping,
            FRAME_TYPE_ACK | FRAME_TYPE_ACK_ECN => Frame::Ack(parse_ack(buf, ty)?),
            FRAME_TYPE_CRYPTO => {
                let offset = VarIntCodec::get(buf)?;
                let data = VarIntCodec::get_prefixed(buf)?;
                Frame::Crypto(CryptoFrame { offset, data })
            }
            FRAME_TYPE_NEW_TOKEN => {
                let token = VarIntCodec::get_prefixed(buf)?;
                if token.is_empty() {
                    // RFC 9000 Section 19.7: an empty token is a FRAME_ENCODING_ERROR
                    return Err(Error::Transport(TransportError::FrameEncodingError));
                }
                Frame::NewToken(NewTokenFrame {
                    token: Token::new(token),
                })
            }
            0x08..=0x0f => Frame::Stream(parse_stream(buf, ty)?),
            FRAME_TYPE_MAX_DATA => Frame::MaxData(VarIntCodec::get(buf)?),
            FRAME_TYPE_MAX_STREAM_DATA => Frame::MaxStreamData(MaxStreamDataFrame {
                stream_id: StreamId(VarIntCodec::get(buf)?),
                maximum: VarIntCodec::get(buf)?,
            }),
            FRAME_TYPE_MAX_STREAMS_BIDI | FRAME_TYPE_MAX_STREAMS_UNI => {
                let direction = if ty == FRAME_TYPE_MAX_STREAMS_BIDI {
                    StreamDirection::Bidirectional
                } else {
                    StreamDirection::Unidirectional
                };
                Frame::MaxStreams(MaxStreamsFrame {
                    direction,
                    maximum: VarIntCodec::get(buf)?,
                })
            }
            FRAME_TYPE_CONNECTION_CLOSE_QUIC | FRAME_TYPE_CONNECTION_CLOSE_APP => {
                let application = ty == FRAME_TYPE_CONNECTION_CLOSE_APP;
                let error_code = VarIntCodec::get(buf)?;
                let frame_type = if application {
                    None
                } else {
                    Some(VarIntCodec::get(buf)?)
                };
                let reason = VarIntCodec::get_prefixed(buf)?;
                Frame::ConnectionClose(ConnectionCloseFrame {
                    error_code,
                    frame_type,
                    reason,
                    application,
                })
            }
            FRAME_TYPE_HANDSHAKE_DONE => Frame::HandshakeDone,
            _ => {
                tracing::debug!(frame_type, "unsupported frame type");
                return Err(Error::Transport(TransportError::FrameEncodingError));
            }
        };
        Ok(frame)
    }

    /// Parse every frame in a packet payload.
    pub fn parse_all(payload: Bytes) -> Result<Vec<Frame>> {
        FrameIterator::new(payload).collect()
    }

    /// Exact number of bytes `encode` will write.
    pub fn encoded_len(&self) -> usize {
        let ty = VarIntCodec::size(self.frame_type());
        match self {
            Frame::Padding(n) => *n,
            Frame::Ping | Frame::HandshakeDone => ty,
            Frame::Ack(ack) => {
                let mut len = ty
                    + VarIntCodec::size(ack.largest_acknowledged)
                    + VarIntCodec::size(ack.ack_delay)
                    + VarIntCodec::size(ack.ranges.len() as u64)
                    + VarIntCodec::size(ack.first_range);
                for range in &ack.ranges {
                    len += VarIntCodec::size(range.gap) + VarIntCodec::size(range.length);
                }
                if let Some(ecn) = &ack.ecn {
                    len += VarIntCodec::size(ecn.ect0)
                        + VarIntCodec::size(ecn.ect1)
                        + VarIntCodec::size(ecn.ce);
                }
                len
            }
            Frame::Crypto(c) => ty + VarIntCodec::size(c.offset) + prefixed_len(c.data.len()),
            Frame::NewToken(t) => ty + prefixed_len(t.token.len()),
            Frame::Stream(s) => {
                ty + VarIntCodec::size(s.stream_id.value())
                    + VarIntCodec::size(s.offset)
                    + prefixed_len(s.data.len())
            }
            Frame::MaxData(max) => ty + VarIntCodec::size(*max),
            Frame::MaxStreamData(f) => {
                ty + VarIntCodec::size(f.stream_id.value()) + VarIntCodec::size(f.maximum)
            }
            Frame::MaxStreams(f) => ty + VarIntCodec::size(f.maximum),
            Frame::ConnectionClose(c) => {
                ty + VarIntCodec::size(c.error_code)
                    + c.frame_type.map_or(0, VarIntCodec::size)
                    + prefixed_len(c.reason.len())
            }
        }
    }

    /// Append the wire encoding of this frame to `out`.
    pub fn encode(&self, out: &mut BytesMut) -> Result<()> {
        if let Frame::Padding(n) = self {
            out.put_bytes(0, *n);
            return Ok(());
        }

        VarIntCodec::put(self.frame_type(), out)?;
        match self {
            Frame::Padding(_) | Frame::Ping | Frame::HandshakeDone => {}
            Frame::Ack(ack) => {
                VarIntCodec::put(ack.largest_acknowledged, out)?;
                VarIntCodec::put(ack.ack_delay, out)?;
                VarIntCodec::put(ack.ranges.len() as u64, out)?;
                VarIntCodec::put(ack.first_range, out)?;
                for range in &ack.ranges {
                    VarIntCodec::put(range.gap, out)?;
                    VarIntCodec::put(range.length, out)?;
                }
                if let Some(ecn) = &ack.ecn {
                    VarIntCodec::put(ecn.ect0, out)?;
                    VarIntCodec::put(ecn.ect1, out)?;
                    VarIntCodec::put(ecn.ce, out)?;
                }
            }
            Frame::Crypto(c) => {
                VarIntCodec::put(c.offset, out)?;
                VarIntCodec::put_prefixed(&c.data, out)?;
            }
            Frame::NewToken(t) => VarIntCodec::put_prefixed(t.token.as_bytes(), out)?,
            Frame::Stream(s) => {
                VarIntCodec::put(s.stream_id.value(), out)?;
                VarIntCodec::put(s.offset, out)?;
                VarIntCodec::put_prefixed(&s.data, out)?;
            }
            Frame::MaxData(max) => VarIntCodec::put(*max, out)?,
            Frame::MaxStreamData(f) => {
                VarIntCodec::put(f.stream_id.value(), out)?;
                VarIntCodec::put(f.maximum, out)?;
            }
            Frame::MaxStreams(f) => VarIntCodec::put(f.maximum, out)?,
            Frame::ConnectionClose(c) => {
                VarIntCodec::put(c.error_code, out)?;
                if !c.application {
                    VarIntCodec::put(c.frame_type.unwrap_or(0), out)?;
                }
                VarIntCodec::put_prefixed(&c.reason, out)?;
            }
        }
        Ok(())
    }
}

fn prefixed_len(len: usize) -> usize {
    VarIntCodec::size(len as u64) + len
}

fn parse_ack(buf: &mut Bytes, ty: u8) -> Result<AckFrame> {
    let largest_acknowledged = VarIntCodec::get(buf)?;
    let ack_delay = VarIntCodec::get(buf)?;
    let range_count = VarIntCodec::get(buf)?;
    let first_range = VarIntCodec::get(buf)?;
    if first_range > largest_acknowledged {
        return Err(Error::Transport(TransportError::FrameEncodingError));
    }

    // Each range takes at least two bytes; reject counts the buffer cannot hold.
    if range_count > (buf.remaining() / 2) as u64 {
        return Err(Error::Transport(TransportError::FrameEncodingError));
    }
    let mut ranges = Vec::with_capacity(range_count as usize);
    for _ in 0..range_count {
        ranges.push(AckRange {
            gap: VarIntCodec::get(buf)?,
            length: VarIntCodec::get(buf)?,
        });
    }

    let ecn = if ty == FRAME_TYPE_ACK_ECN {
        Some(EcnCounts {
            ect0: VarIntCodec::get(buf)?,
            ect1: VarIntCodec::get(buf)?,
            ce: VarIntCodec::get(buf)?,
        })
    } else {
        None
    };

    Ok(AckFrame {
        largest_acknowledged,
        ack_delay,
        first_range,
        ranges,
        ecn,
    })
}

fn parse_stream(buf: &mut Bytes, ty: u8) -> Result<StreamFrame> {
    let stream_id = StreamId(VarIntCodec::get(buf)?);
    let offset: VarInt = if ty & STREAM_FRAME_BIT_OFF != 0 {
        VarIntCodec::get(buf)?
    } else {
        0
    };
    let data = if ty & STREAM_FRAME_BIT_LEN != 0 {
        VarIntCodec::get_prefixed(buf)?
    } else {
        // Without LEN the data runs to the end of the packet.
        buf.split_to(buf.len())
    };
    Ok(StreamFrame {
        stream_id,
        offset,
        data,
        fin: ty & STREAM_FRAME_BIT_FIN != 0,
    })
}

/// Iterates over the frames of a packet payload.
///
/// Stops after the first error.
pub struct FrameIterator {
    buf: Bytes,
    failed: bool,
}

impl FrameIterator {
    pub fn new(payload: Bytes) -> Self {
        Self {
            buf: payload,
            failed: false,
        }
    }
}

impl Iterator for FrameIterator {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buf.is_empty() {
            return None;
        }
        let result = Frame::parse(&mut self.buf);
        self.failed = result.is_err();
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(frame: &Frame) -> Bytes {
        let mut out = BytesMut::new();
        frame.encode(&mut out).unwrap();
        assert_eq!(out.len(), frame.encoded_len(), "{:?}", frame);
        out.freeze()
    }

    mod padding_frame_tests {
        use super::*;

        #[test]
        fn test_padding_run_collapses() {
            let mut buf = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01]);
            assert_eq!(Frame::parse(&mut buf).unwrap(), Frame::Padding(3));
            assert_eq!(Frame::parse(&mut buf).unwrap(), Frame::Ping);
            assert!(buf.is_empty());
        }

        #[test]
        fn test_padding_encodes_zero_bytes() {
            let bytes = encode(&Frame::Padding(5));
            assert_eq!(&bytes[..], &[0u8; 5]);
        }
    }

    mod new_token_frame_tests {
        use super::*;

        #[test]
        fn test_new_token_field_order() {
            // type, token length, token
            let mut buf = Bytes::from_static(&[0x07, 0x03, 0xaa, 0xbb, 0xcc, 0x01]);
            let frame = Frame::parse(&mut buf).unwrap();
            assert_eq!(
                frame,
                Frame::NewToken(NewTokenFrame {
                    token: Token::from_slice(&[0xaa, 0xbb, 0xcc])
                })
            );
            // Exactly the frame's bytes were consumed.
            assert_eq!(&buf[..], &[0x01]);
            assert_eq!(&encode(&frame)[..], &[0x07, 0x03, 0xaa, 0xbb, 0xcc]);
        }

        #[test]
        fn test_new_token_empty_rejected() {
            let mut buf = Bytes::from_static(&[0x07, 0x00]);
            assert!(matches!(
                Frame::parse(&mut buf),
                Err(Error::Transport(TransportError::FrameEncodingError))
            ));
        }

        #[test]
        fn test_new_token_truncated() {
            let mut buf = Bytes::from_static(&[0x07, 0x05, 0xaa]);
            assert!(matches!(
                Frame::parse(&mut buf),
                Err(Error::BufferTooShort { .. })
            ));
        }
    }

    mod crypto_frame_tests {
        use super::*;

        #[test]
        fn test_crypto_frame() {
            let frame = Frame::Crypto(CryptoFrame {
                offset: 100,
                data: Bytes::from_static(b"client hello"),
            });
            let mut bytes = encode(&frame);
            assert_eq!(bytes[0], FRAME_TYPE_CRYPTO);
            assert_eq!(Frame::parse(&mut bytes).unwrap(), frame);
            assert!(frame.is_ack_eliciting());
        }
    }

    mod stream_frame_tests {
        use super::*;

        #[test]
        fn test_stream_frame_with_fin() {
            let frame = Frame::Stream(StreamFrame {
                stream_id: StreamId(4),
                offset: 0,
                data: Bytes::from_static(b"GET /"),
                fin: true,
            });
            let mut bytes = encode(&frame);
            assert_eq!(bytes[0], 0x0f);
            assert_eq!(Frame::parse(&mut bytes).unwrap(), frame);
        }

        #[test]
        fn test_stream_without_len_takes_rest() {
            // type 0x08: no OFF, no LEN, no FIN
            let mut buf = Bytes::from_static(&[0x08, 0x00, b'h', b'i']);
            let frame = Frame::parse(&mut buf).unwrap();
            match frame {
                Frame::Stream(s) => {
                    assert_eq!(s.stream_id, StreamId(0));
                    assert_eq!(s.offset, 0);
                    assert_eq!(&s.data[..], b"hi");
                    assert!(!s.fin);
                }
                other => panic!("unexpected frame {:?}", other),
            }
            assert!(buf.is_empty());
        }
    }

    mod ack_frame_tests {
        use super::*;

        #[test]
        fn test_ack_with_ranges() {
            let frame = Frame::Ack(AckFrame {
                largest_acknowledged: 20,
                ack_delay: 3,
                first_range: 2,
                ranges: vec![AckRange { gap: 1, length: 4 }],
                ecn: None,
            });
            let mut bytes = encode(&frame);
            assert_eq!(Frame::parse(&mut bytes).unwrap(), frame);
            assert!(!frame.is_ack_eliciting());
        }

        #[test]
        fn test_ack_first_range_beyond_largest() {
            let mut buf = Bytes::from_static(&[0x02, 0x01, 0x00, 0x00, 0x05]);
            assert!(Frame::parse(&mut buf).is_err());
        }

        #[test]
        fn test_ack_ecn() {
            let mut ack = AckFrame::single(7);
            ack.ecn = Some(EcnCounts {
                ect0: 1,
                ect1: 0,
                ce: 2,
            });
            let frame = Frame::Ack(ack);
            let mut bytes = encode(&frame);
            assert_eq!(bytes[0], FRAME_TYPE_ACK_ECN);
            assert_eq!(Frame::parse(&mut bytes).unwrap(), frame);
        }
    }

    mod connection_close_tests {
        use super::*;

        #[test]
        fn test_transport_close() {
            let frame = Frame::ConnectionClose(ConnectionCloseFrame::transport(
                TransportError::TransportParameterError,
                "bad params",
            ));
            let mut bytes = encode(&frame);
            assert_eq!(bytes[0], FRAME_TYPE_CONNECTION_CLOSE_QUIC);
            assert_eq!(Frame::parse(&mut bytes).unwrap(), frame);
        }

        #[test]
        fn test_application_close_has_no_frame_type() {
            let frame = Frame::ConnectionClose(ConnectionCloseFrame {
                error_code: 0x100,
                frame_type: None,
                reason: Bytes::new(),
                application: true,
            });
            let bytes = encode(&frame);
            assert_eq!(&bytes[..], &[0x1d, 0x41, 0x00, 0x00]);
        }
    }

    mod iterator_tests {
        use super::*;

        #[test]
        fn test_parse_all_mixed_payload() {
            let mut out = BytesMut::new();
            for frame in [
                Frame::Ping,
                Frame::MaxData(1 << 20),
                Frame::MaxStreams(MaxStreamsFrame {
                    direction: StreamDirection::Unidirectional,
                    maximum: 3,
                }),
                Frame::HandshakeDone,
                Frame::Padding(10),
            ] {
                frame.encode(&mut out).unwrap();
            }
            let frames = Frame::parse_all(out.freeze()).unwrap();
            assert_eq!(frames.len(), 5);
            assert_eq!(frames[3], Frame::HandshakeDone);
            assert_eq!(frames[4], Frame::Padding(10));
        }

        #[test]
        fn test_unknown_frame_type() {
            let result = Frame::parse_all(Bytes::from_static(&[0x01, 0x3f]));
            assert!(matches!(
                result,
                Err(Error::Transport(TransportError::FrameEncodingError))
            ));
        }

        #[test]
        fn test_iterator_stops_after_error() {
            let mut iter = FrameIterator::new(Bytes::from_static(&[0x3f, 0x01, 0x01]));
            assert!(iter.next().unwrap().is_err());
            assert!(iter.next().is_none());
        }
    }
}
