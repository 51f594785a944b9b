//! Codec Tests
//!
//! Tests for line framing, command encoding/decoding and stream helpers.

use bytes::BytesMut;
use linkrelay::error::{ErrorKind, RelayError};
use linkrelay::protocol::{
    Command, CommandLine, LineCodec,
    encode_command, decode_command,
    read_command, write_command,
    read_response, write_response,
};
use tokio_util::codec::{Decoder, Encoder};

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_download_command() {
    let cmd = Command::download("http://example.com/file.iso").unwrap();
    let encoded = encode_command(&cmd);

    assert_eq!(
        &encoded[..],
        b"modprobe http\r\ndo http://example.com/file.iso\r\n"
    );
}

#[test]
fn test_encode_decode_multi_line() {
    let cmd = Command::from_lines(["lsmod", "vd", "help"]).unwrap();
    let decoded = decode_command(&encode_command(&cmd)).unwrap();

    assert_eq!(decoded, cmd);
}

#[test]
fn test_decode_stops_at_blank_line() {
    let decoded = decode_command(b"lsmod\r\n\r\nvd\r\n").unwrap();

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded.lines()[0].as_str(), "lsmod");
}

#[test]
fn test_decode_accepts_bare_lf_and_unterminated_tail() {
    let decoded = decode_command(b"modprobe http\ndo http://a.example/x").unwrap();

    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded.link(), Some("http://a.example/x"));
}

#[test]
fn test_decode_strips_padding_before_terminator() {
    // Older front-ends pad lines with spaces before CRLF
    let decoded = decode_command(b"modprobe http  \r\ndo http://a.example/  \r\n").unwrap();

    assert_eq!(decoded.lines()[0].as_str(), "modprobe http");
    assert_eq!(decoded.lines()[1].as_str(), "do http://a.example/");
}

#[test]
fn test_decode_empty_input() {
    let result = decode_command(b"");
    assert!(matches!(result, Err(RelayError::Protocol(_))));

    let result = decode_command(b"\r\n");
    assert!(matches!(result, Err(RelayError::Protocol(_))));
}

// =============================================================================
// LineCodec Tests
// =============================================================================

#[test]
fn test_codec_waits_for_terminator() {
    let mut codec = LineCodec::default();
    let mut buf = BytesMut::from(&b"modprobe ht"[..]);

    assert!(codec.decode(&mut buf).unwrap().is_none());

    buf.extend_from_slice(b"tp\r");
    assert!(codec.decode(&mut buf).unwrap().is_none());

    buf.extend_from_slice(b"\ndo");
    let line = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(line.as_str(), "modprobe http");
    assert_eq!(&buf[..], b"do");
}

#[test]
fn test_codec_rejects_long_line() {
    let mut codec = LineCodec::new(16);
    let mut buf = BytesMut::from(&[b'a'; 32][..]);

    let err = codec.decode(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().contains("Line too long"));
}

#[test]
fn test_codec_line_at_limit_is_accepted() {
    let mut codec = LineCodec::new(4);
    let mut buf = BytesMut::from(&b"abcd\r\n"[..]);

    let line = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(line.as_str(), "abcd");
}

#[test]
fn test_codec_rejects_invalid_utf8() {
    let mut codec = LineCodec::default();
    let mut buf = BytesMut::from(&[0xFF, 0xFE, b'\r', b'\n'][..]);

    let err = codec.decode(&mut buf).unwrap_err();
    assert!(err.to_string().contains("UTF-8"));
}

#[test]
fn test_codec_rejects_embedded_cr() {
    let mut codec = LineCodec::default();
    let mut buf = BytesMut::from(&b"do a\rb\r\n"[..]);

    let err = codec.decode(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn test_codec_encode_appends_crlf() {
    let mut codec = LineCodec::default();
    let mut dst = BytesMut::new();
    let line = CommandLine::new("lsmod").unwrap();

    codec.encode(&line, &mut dst).unwrap();
    assert_eq!(&dst[..], b"lsmod\r\n");
}

// =============================================================================
// Stream Helper Tests
// =============================================================================

#[tokio::test]
async fn test_read_command_until_eof() {
    let mut reader: &[u8] = b"modprobe http\r\ndo http://example.com/a\r\n";
    let mut codec = LineCodec::default();

    let cmd = read_command(&mut reader, &mut codec).await.unwrap().unwrap();
    assert_eq!(cmd, Command::download("http://example.com/a").unwrap());
}

#[tokio::test]
async fn test_read_command_until_blank_line() {
    let mut reader: &[u8] = b"lsmod\r\n\r\nignored\r\n";
    let mut codec = LineCodec::default();

    let cmd = read_command(&mut reader, &mut codec).await.unwrap().unwrap();
    assert_eq!(cmd.len(), 1);
}

#[tokio::test]
async fn test_read_command_nothing_sent() {
    let mut codec = LineCodec::default();

    let mut empty: &[u8] = b"";
    assert!(read_command(&mut empty, &mut codec).await.unwrap().is_none());

    let mut blank: &[u8] = b"\r\n";
    assert!(read_command(&mut blank, &mut codec).await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_command() {
    let cmd = Command::download("ftp://mirror.example/x.tar").unwrap();
    let mut out: Vec<u8> = Vec::new();

    write_command(&mut out, &cmd).await.unwrap();
    assert_eq!(out, b"modprobe http\r\ndo ftp://mirror.example/x.tar\r\n");
}

#[tokio::test]
async fn test_read_response_collects_everything() {
    let mut reader: &[u8] = b"line one\r\nline two\r\n";

    let response = read_response(&mut reader, 1024).await.unwrap();
    assert_eq!(response.as_bytes(), b"line one\r\nline two\r\n");
}

#[tokio::test]
async fn test_read_response_exact_limit() {
    let mut reader: &[u8] = b"12345678";

    let response = read_response(&mut reader, 8).await.unwrap();
    assert_eq!(response.len(), 8);
}

#[tokio::test]
async fn test_read_response_over_limit() {
    let mut reader: &[u8] = b"123456789";

    let err = read_response(&mut reader, 8).await.unwrap_err();
    assert!(matches!(err, RelayError::ResponseTooLarge { limit: 8 }));
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[tokio::test]
async fn test_write_response() {
    let mut out: Vec<u8> = Vec::new();

    write_response(&mut out, b"OK").await.unwrap();
    assert_eq!(out, b"OK");
}
