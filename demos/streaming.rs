//! Writes a framed stream to a file and reads it back.
//!
//! Run with: cargo run --example streaming

use btoon::{btoon, EncodeOptions, StreamReader, StreamWriter, Value};
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::temp_dir().join("btoon-demo-stream.btn");

    let sink = BufWriter::new(File::create(&path)?);
    let mut writer = StreamWriter::with_options(sink, EncodeOptions::new().with_compression(true));
    writer.write_value(&Value::from(42))?;
    writer.write_value(&Value::from("hello"))?;
    writer.write_value(&btoon!([1, 2, 3]))?;
    for i in 0..3 {
        writer.write_value(&btoon!({"event": "tick", "seq": i}))?;
    }
    println!("Wrote {} frames to {}", writer.frames_written(), path.display());
    writer.close()?;

    let mut reader = StreamReader::open(&path)?;
    while let Some(value) = reader.next_value()? {
        println!("  frame {}: {}", reader.frames_read(), value);
    }
    println!("End of stream after {} frames", reader.frames_read());

    std::fs::remove_file(&path)?;
    Ok(())
}
