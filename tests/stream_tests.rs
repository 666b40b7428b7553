use btoon::{btoon, CancelHandle, EncodeOptions, Error, StreamReader, StreamState, StreamWriter, Value};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Event {
    seq: u64,
    kind: String,
    payload: Option<Vec<u8>>,
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("btoon-{}-{}.btn", name, std::process::id()))
}

#[test]
fn test_three_frames_then_end_of_stream() {
    let path = temp_path("three-frames");

    let mut writer = StreamWriter::create(&path).unwrap();
    writer.write_value(&Value::from(42)).unwrap();
    writer.write_value(&Value::from("hello")).unwrap();
    writer.write_value(&btoon!([1, 2, 3])).unwrap();
    assert_eq!(writer.frames_written(), 3);
    writer.close().unwrap();

    let mut reader = StreamReader::open(&path).unwrap();
    assert_eq!(reader.next_value().unwrap(), Some(Value::from(42)));
    assert_eq!(reader.next_value().unwrap(), Some(Value::from("hello")));
    assert_eq!(reader.next_value().unwrap(), Some(btoon!([1, 2, 3])));
    assert_eq!(reader.next_value().unwrap(), None);
    assert_eq!(reader.frames_read(), 3);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_serde_frames() {
    let events: Vec<Event> = (0..5)
        .map(|seq| Event {
            seq,
            kind: if seq % 2 == 0 { "tick" } else { "tock" }.to_string(),
            payload: (seq > 2).then(|| vec![seq as u8; 3]),
        })
        .collect();

    let mut writer = StreamWriter::new(Vec::new());
    for event in &events {
        writer.write_serialize(event).unwrap();
    }
    let bytes = writer.close().unwrap();

    let mut reader = StreamReader::new(Cursor::new(bytes));
    let mut back = Vec::new();
    while let Some(event) = reader.next_deserialize::<Event>().unwrap() {
        back.push(event);
    }
    assert_eq!(back, events);
}

#[test]
fn test_iterator_over_compressed_stream() {
    let options = EncodeOptions::new().with_compression(true);
    let mut writer = StreamWriter::with_options(Vec::new(), options);
    let text = "stream ".repeat(64);
    for i in 0..4 {
        writer.write_value(&btoon!({"i": i, "text": text})).unwrap();
    }
    let bytes = writer.close().unwrap();

    let values: Vec<Value> = StreamReader::new(bytes.as_slice()).collect::<Result<_, _>>().unwrap();
    assert_eq!(values.len(), 4);
    assert_eq!(values[3].get("i"), Some(&Value::from(3)));
    assert_eq!(values[0].get("text").and_then(Value::as_str), Some(text.as_str()));
}

#[test]
fn test_truncated_stream_closes_reader() {
    let mut writer = StreamWriter::new(Vec::new());
    writer.write_value(&Value::from("complete")).unwrap();
    writer.write_value(&Value::from("cut short")).unwrap();
    let bytes = writer.close().unwrap();

    let mut reader = StreamReader::new(&bytes[..bytes.len() - 3]);
    assert_eq!(reader.next_value().unwrap(), Some(Value::from("complete")));
    assert!(reader.next_value().unwrap_err().is_truncated());
    assert_eq!(reader.state(), StreamState::Closed);
    assert!(matches!(reader.next_value(), Err(Error::InvalidState(_))));
}

#[test]
fn test_cancelled_read_keeps_position() {
    let mut writer = StreamWriter::new(Vec::new());
    writer.write_value(&Value::from(1)).unwrap();
    writer.write_value(&Value::from(2)).unwrap();
    let bytes = writer.close().unwrap();

    let cancel = CancelHandle::new();
    let mut reader = StreamReader::new(Cursor::new(bytes)).with_cancel_handle(cancel.clone());
    assert_eq!(reader.next_value().unwrap(), Some(Value::from(1)));

    cancel.cancel();
    assert!(matches!(reader.next_value(), Err(Error::Cancelled)));
    assert_eq!(reader.state(), StreamState::Reading);

    let (source, pending) = reader.into_parts();
    assert!(pending.is_empty());
    let mut fresh = StreamReader::resume(source, pending);
    assert_eq!(fresh.next_value().unwrap(), Some(Value::from(2)));
    assert_eq!(fresh.next_value().unwrap(), None);
}
