use std::io;
use std::path::Path;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use serde::Serialize;

pub enum CsvWriter {
    File(csv::Writer<fs_err::File>),
    Stdout(csv::Writer<io::Stdout>),
}

impl CsvWriter {
    /// Truncates `path` if it already exists
    pub fn create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = fs_err::File::create(path.as_ref())?;
        Ok(Self::File(builder().from_writer(file)))
    }

    pub fn stdout() -> Self {
        Self::Stdout(builder().from_writer(io::stdout()))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(wtr) => wtr.flush(),
            Self::Stdout(wtr) => wtr.flush(),
        }
    }

    pub fn write_record<I, T>(&mut self, record: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        match self {
            Self::File(wtr) => wtr.write_record(record),
            Self::Stdout(wtr) => wtr.write_record(record),
        }
    }

    pub fn serialize<R: Serialize>(&mut self, record: R) -> csv::Result<()> {
        match self {
            Self::File(wtr) => wtr.serialize(record),
            Self::Stdout(wtr) => wtr.serialize(record),
        }
    }
}

fn builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.has_headers(false);
    builder
}

/// A CSV file fed from any thread, written by a dedicated one
pub struct CsvSink<R> {
    tx_record: Option<Sender<R>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl<R> CsvSink<R>
where
    R: Serialize + Send + 'static,
{
    /// Writes `headers` right away so that a run without records still
    /// produces a valid file
    pub fn new(mut wtr: CsvWriter, headers: &[&str]) -> anyhow::Result<Self> {
        wtr.write_record(headers)?;
        wtr.flush()?;

        let (tx_record, rx_record) = unbounded::<R>();
        let writer = thread::Builder::new()
            .name("csv-writer".into())
            .spawn(move || {
                for record in rx_record {
                    if let Err(e) = wtr.serialize(record) {
                        log::error!("Couldn't write record: {e}");
                    }
                }
                if let Err(e) = wtr.flush() {
                    log::error!("Couldn't flush records: {e}");
                }
            })?;

        Ok(Self {
            tx_record: Some(tx_record),
            writer: Some(writer),
        })
    }

    pub fn send(&self, record: R) {
        if let Some(tx) = &self.tx_record {
            tx.send(record).ok();
        }
    }
}

impl<R> CsvSink<R> {
    /// Flushes pending records and waits for the writer thread, idempotent
    pub fn finish(&mut self) {
        drop(self.tx_record.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                log::error!("CSV writer thread panicked");
            }
        }
    }
}

impl<R> Drop for CsvSink<R> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[derive(Serialize)]
    struct Row {
        url: String,
        note: String,
    }

    #[test]
    fn header_then_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "stale content\n").unwrap();

        let mut sink = CsvSink::new(CsvWriter::create(&path).unwrap(), &["url", "note"]).unwrap();
        sink.send(Row {
            url: "https://www.state.gov/10-413".into(),
            note: "a, b".into(),
        });
        sink.finish();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "url,note\nhttps://www.state.gov/10-413,\"a, b\"\n"
        );
    }

    #[test]
    fn empty_run_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        drop(CsvSink::<Row>::new(CsvWriter::create(&path).unwrap(), &["URL"]).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "URL\n");
    }
}
