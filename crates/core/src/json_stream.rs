//! Incremental writers for the scan output array and the safe map object.
//!
//! Both writers only emit their closing bracket from `finish`. A file left
//! without it marks an interrupted run.

use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

fn create(path: &Path) -> io::Result<BufWriter<fs::File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(fs::File::create(path)?))
}

pub struct JsonArrayWriter<W: Write> {
    out: W,
    first: bool,
}

impl JsonArrayWriter<BufWriter<fs::File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(create(path)?)
    }
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_all(b"[\n")?;
        Ok(Self { out, first: true })
    }

    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if !self.first {
            self.out.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.out, item)?;
        self.first = false;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.write_all(b"\n]\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

pub struct SafeMapWriter<W: Write> {
    out: W,
    first: bool,
}

impl SafeMapWriter<BufWriter<fs::File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(create(path)?)
    }
}

impl<W: Write> SafeMapWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_all(b"{\n")?;
        Ok(Self { out, first: true })
    }

    pub fn append(&mut self, safe_id: &str, path: &Path) -> io::Result<()> {
        if !self.first {
            self.out.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.out, safe_id)?;
        self.out.write_all(b": ")?;
        serde_json::to_writer(&mut self.out, &path.to_string_lossy())?;
        self.first = false;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.write_all(b"\n}\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn finished_array_is_valid_json() {
        let mut writer = JsonArrayWriter::new(Vec::new()).unwrap();
        writer.write(&serde_json::json!({"a": 1})).unwrap();
        writer.write(&serde_json::json!({"a": 2})).unwrap();
        let bytes = writer.finish().unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn empty_array_and_map_are_valid() {
        let bytes = JsonArrayWriter::new(Vec::new()).unwrap().finish().unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.is_empty());
        let bytes = SafeMapWriter::new(Vec::new()).unwrap().finish().unwrap();
        let parsed: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn unfinished_array_does_not_parse() {
        let mut out = Vec::new();
        {
            let mut writer = JsonArrayWriter::new(&mut out).unwrap();
            writer.write(&serde_json::json!({"a": 1})).unwrap();
        }
        assert!(serde_json::from_slice::<Vec<serde_json::Value>>(&out).is_err());
    }

    #[test]
    fn safe_map_escapes_paths() {
        let mut writer = SafeMapWriter::new(Vec::new()).unwrap();
        writer
            .append("abc", &PathBuf::from("dir/with \"quote\".txt"))
            .unwrap();
        let bytes = writer.finish().unwrap();
        let parsed: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["abc"], "dir/with \"quote\".txt");
    }
}
