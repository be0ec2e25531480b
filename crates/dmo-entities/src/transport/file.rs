use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;
use std::time::Duration;

use dmo_core::BitBuffer;

use super::{Clock, MonotonicClock, RadioBurst, RxTransport, TransportError, TxBurst, TxTransport};

/// Parses one capture line: a nanosecond timestamp and a '0'/'1' string.
pub fn parse_burst_line(line: &str) -> Result<RadioBurst, String> {
    let mut parts = line.split_whitespace();
    let ts = parts.next().ok_or("missing timestamp")?;
    let bits = parts.next().ok_or("missing bits")?;
    if parts.next().is_some() {
        return Err("trailing fields".to_string());
    }
    let ts_ns = ts.parse::<u64>().map_err(|e| format!("bad timestamp {}: {}", ts, e))?;
    let bits = BitBuffer::from_bitstr(bits).ok_or("bits must be '0' or '1'")?;
    Ok(RadioBurst { bits, ts_ns })
}

/// Replays a capture file. Each burst is released once the clock reaches its timestamp.
/// Empty lines and lines starting with '#' are skipped.
pub struct FileRx {
    lines: Lines<Box<dyn BufRead + Send>>,
    line_no: usize,
    pending: Option<RadioBurst>,
    clock: MonotonicClock,
}

impl FileRx {
    pub fn open<P: AsRef<Path>>(path: P, clock: MonotonicClock) -> Result<Self, TransportError> {
        let f = File::open(path)?;
        Ok(Self::from_reader(Box::new(BufReader::new(f)), clock))
    }

    pub fn from_reader(reader: Box<dyn BufRead + Send>, clock: MonotonicClock) -> Self {
        Self { lines: reader.lines(), line_no: 0, pending: None, clock }
    }

    fn next_burst(&mut self) -> Result<RadioBurst, TransportError> {
        loop {
            let Some(line) = self.lines.next() else {
                return Err(TransportError::Disconnected);
            };
            let line = line?;
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return parse_burst_line(line).map_err(|reason| TransportError::Parse { line: self.line_no, reason });
        }
    }
}

impl RxTransport for FileRx {
    fn recv(&mut self, timeout: Duration) -> Result<Option<RadioBurst>, TransportError> {
        let burst = match self.pending.take() {
            Some(b) => b,
            None => self.next_burst()?,
        };
        let now = self.clock.now_ns();
        if burst.ts_ns > now {
            let wait = Duration::from_nanos(burst.ts_ns - now).min(timeout);
            std::thread::sleep(wait);
            if burst.ts_ns > self.clock.now_ns() {
                self.pending = Some(burst);
                return Ok(None);
            }
        }
        Ok(Some(burst))
    }
}

/// Appends transmitted bursts to a file, one line per burst, in the capture format.
pub struct FileTx {
    out: BufWriter<File>,
}

impl FileTx {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, TransportError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { out: BufWriter::new(f) })
    }
}

impl TxTransport for FileTx {
    fn send(&mut self, burst: TxBurst) -> Result<(), TransportError> {
        writeln!(self.out, "{} {}", burst.ts_ns, burst.bits.to_bitstr())?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TxFlags;
    use std::io::Cursor;

    #[test]
    fn test_parse_line() {
        let b = parse_burst_line("1200 0110").unwrap();
        assert_eq!(b.ts_ns, 1200);
        assert_eq!(b.bits.to_bitstr(), "0110");
        assert!(parse_burst_line("12x 0110").is_err());
        assert!(parse_burst_line("12 01a0").is_err());
        assert!(parse_burst_line("12").is_err());
        assert!(parse_burst_line("12 01 3").is_err());
    }

    #[test]
    fn test_replay_skips_comments_and_ends() {
        let text = "# capture\n0 11\n\n5 00\nbogus\n";
        let mut rx = FileRx::from_reader(Box::new(Cursor::new(text)), MonotonicClock::new());
        let d = Duration::from_millis(1);
        assert_eq!(rx.recv(d).unwrap().unwrap().bits.to_bitstr(), "11");
        assert_eq!(rx.recv(d).unwrap().unwrap().ts_ns, 5);
        assert!(matches!(rx.recv(d), Err(TransportError::Parse { line: 5, .. })));
        assert_eq!(rx.recv(d), Err(TransportError::Disconnected));
    }

    #[test]
    fn test_replay_waits_for_timestamp() {
        let text = "60000000000 1\n";
        let mut rx = FileRx::from_reader(Box::new(Cursor::new(text)), MonotonicClock::new());
        assert_eq!(rx.recv(Duration::from_millis(1)), Ok(None));
        // Still pending, not lost
        assert!(rx.pending.is_some());
    }

    #[test]
    fn test_tx_appends_lines() {
        let path = std::env::temp_dir().join(format!("dmo-tx-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut tx = FileTx::create(&path).unwrap();
        for ts in [10, 20] {
            tx.send(TxBurst { bits: BitBuffer::from_bitstr("101").unwrap(), ts_ns: ts, flags: TxFlags::default() })
                .unwrap();
        }
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "10 101\n20 101\n");
        let _ = std::fs::remove_file(&path);
    }
}
