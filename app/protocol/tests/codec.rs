//! Line codec tests.

use receptor_protocol::codec::{
    LineError, MAX_DOCUMENT_SIZE, MAX_LINE_SIZE, read_document, read_line, write_json, write_line,
};
use receptor_protocol::{Request, WorkCommand};
use tokio::io::BufReader;

#[tokio::test]
async fn codec_line_roundtrip() {
    let mut buf = Vec::new();
    write_line(&mut buf, "Receptor Control, node alpha").await.unwrap();
    assert_eq!(buf, b"Receptor Control, node alpha\n");

    let mut reader = BufReader::new(std::io::Cursor::new(buf));
    let line = read_line(&mut reader).await.unwrap();
    assert_eq!(line, "Receptor Control, node alpha");
}

#[tokio::test]
async fn codec_json_request() {
    let request = Request::work(WorkCommand::Status {
        unitid: "abc123".into(),
    });

    let mut buf = Vec::new();
    write_json(&mut buf, &request).await.unwrap();
    assert_eq!(buf.last(), Some(&b'\n'));

    let mut reader = BufReader::new(std::io::Cursor::new(buf));
    let line = read_line(&mut reader).await.unwrap();
    assert_eq!(Request::parse(&line).unwrap(), request);
}

#[tokio::test]
async fn codec_crlf_and_trailing_bytes() {
    let data = b"first\r\nsecond\npartial".to_vec();
    let mut reader = BufReader::new(std::io::Cursor::new(data));
    assert_eq!(read_line(&mut reader).await.unwrap(), "first");
    assert_eq!(read_line(&mut reader).await.unwrap(), "second");
    assert_eq!(read_line(&mut reader).await.unwrap(), "partial");
    assert!(matches!(
        read_line(&mut reader).await,
        Err(LineError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn codec_too_long() {
    let data = vec![b'x'; MAX_LINE_SIZE + 10];
    let mut reader = BufReader::new(std::io::Cursor::new(data));
    let result = read_line(&mut reader).await;
    assert!(matches!(result, Err(LineError::TooLong { .. })));

    let mut sink = Vec::new();
    let long = "y".repeat(MAX_LINE_SIZE + 1);
    assert!(matches!(
        write_line(&mut sink, &long).await,
        Err(LineError::TooLong { .. })
    ));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn codec_max_line_accepted() {
    let mut data = vec![b'z'; MAX_LINE_SIZE];
    data.push(b'\n');
    let mut reader = BufReader::new(std::io::Cursor::new(data));
    let line = read_line(&mut reader).await.unwrap();
    assert_eq!(line.len(), MAX_LINE_SIZE);
}

#[tokio::test]
async fn codec_connection_closed() {
    let mut reader = BufReader::new(std::io::Cursor::new(Vec::<u8>::new()));
    let result = read_line(&mut reader).await;
    assert!(matches!(result, Err(LineError::ConnectionClosed)));
}

#[tokio::test]
async fn codec_invalid_utf8() {
    let mut reader = BufReader::new(std::io::Cursor::new(vec![0xff, 0xfe, b'\n']));
    let result = read_line(&mut reader).await;
    assert!(matches!(result, Err(LineError::Utf8(_))));
}

#[tokio::test]
async fn codec_documents_exceed_line_limit() {
    let names: Vec<String> = (0..20_000).map(|i| format!("unit-{i:08}")).collect();
    let mut buf = Vec::new();
    write_json(&mut buf, &names).await.unwrap();
    assert!(buf.len() > MAX_LINE_SIZE);

    let mut reader = BufReader::new(std::io::Cursor::new(buf.clone()));
    assert!(matches!(
        read_line(&mut reader).await,
        Err(LineError::TooLong { limit: MAX_LINE_SIZE, .. })
    ));

    let mut reader = BufReader::new(std::io::Cursor::new(buf));
    let line = read_document(&mut reader).await.unwrap();
    let decoded: Vec<String> = serde_json::from_str(&line).unwrap();
    assert_eq!(decoded, names);
}

#[tokio::test]
async fn codec_document_too_long() {
    let mut data = vec![b'x'; MAX_DOCUMENT_SIZE + 1];
    data.push(b'\n');
    let mut reader = BufReader::new(std::io::Cursor::new(data));
    assert!(matches!(
        read_document(&mut reader).await,
        Err(LineError::TooLong { limit: MAX_DOCUMENT_SIZE, .. })
    ));

    let mut sink = Vec::new();
    let huge = "y".repeat(MAX_DOCUMENT_SIZE);
    assert!(matches!(
        write_json(&mut sink, &huge).await,
        Err(LineError::TooLong { .. })
    ));
    assert!(sink.is_empty());
}
