//! Conversion between axum WebSocket messages and core frames.

use axum::extract::ws::Message;
use bytes::Bytes;

use agentwire_core::protocol::frame::Frame;

pub fn decode(msg: Message) -> Frame {
    match msg {
        Message::Text(s) => Frame::Text(s),
        Message::Binary(b) => Frame::Binary(Bytes::from(b)),
        Message::Ping(v) => Frame::Ping(Bytes::from(v)),
        Message::Pong(v) => Frame::Pong(Bytes::from(v)),
        Message::Close(_) => Frame::Close,
    }
}

pub fn encode(frame: Frame) -> Message {
    match frame {
        Frame::Text(s) => Message::Text(s),
        Frame::Binary(b) => Message::Binary(b.to_vec()),
        Frame::Ping(b) => Message::Ping(b.to_vec()),
        Frame::Pong(b) => Message::Pong(b.to_vec()),
        Frame::Close => Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_binary_survive_both_ways() {
        let t = Frame::Text("hi".into());
        assert_eq!(decode(encode(t.clone())), t);
        let b = Frame::Binary(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(decode(encode(b.clone())), b);
        assert_eq!(decode(Message::Close(None)), Frame::Close);
    }
}
