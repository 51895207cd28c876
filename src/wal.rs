use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::LedgerRecord;

/// Encode a single record to [len][bincode][crc32] format.
fn encode_record(writer: &mut impl Write, record: &LedgerRecord) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only log backing the durable attempt ledger.
///
/// Format per entry: `[u32: len][bincode: LedgerRecord][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - Truncated last entry (crash mid-write) is discarded on replay via the
///   length prefix + CRC check.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    /// Open (or create) the log file at `path`, creating parent directories.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append a record and fsync before returning.
    pub fn append(&mut self, record: &LedgerRecord) -> io::Result<()> {
        self.append_buffered(record)?;
        self.flush_sync()
    }

    /// Append a record to the BufWriter without flushing or syncing.
    pub fn append_buffered(&mut self, record: &LedgerRecord) -> io::Result<()> {
        encode_record(&mut self.writer, record)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush the BufWriter and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write compacted records to a temp file and fsync.
    pub fn write_compact_file(path: &Path, records: &[LedgerRecord]) -> io::Result<()> {
        let tmp_path = path.with_extension("tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            encode_record(&mut writer, record)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Atomic swap: rename temp file over the log and reopen.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Replace the log with a minimal set of records that recreates the current state.
    pub fn compact(&mut self, records: &[LedgerRecord]) -> io::Result<()> {
        // Anything still buffered is superseded by the snapshot.
        self.flush_sync()?;
        Self::write_compact_file(&self.path, records)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replay the log from disk, returning all valid records.
    /// Reading stops at the first torn, oversized or corrupt frame.
    pub fn replay(path: &Path) -> io::Result<Vec<LedgerRecord>> {
        Self::scan(path).map(|(records, _)| records)
    }

    /// Replay the log, cut off anything after the last good frame, then open
    /// it for appending. New records never land behind a frame replay cannot
    /// read past.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<LedgerRecord>)> {
        let (records, valid_len) = Self::scan(path)?;
        if let Ok(meta) = fs::metadata(path)
            && meta.len() > valid_len
        {
            tracing::warn!(
                "discarding {} trailing bytes of {}",
                meta.len() - valid_len,
                path.display()
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok((Self::open(path)?, records))
    }

    /// Valid records plus the byte length of the prefix that holds them.
    fn scan(path: &Path) -> io::Result<(Vec<LedgerRecord>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut valid_len = 0u64;

        while let Some(payload) = read_frame(&mut reader)? {
            match bincode::deserialize::<LedgerRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(_) => break,
            }
            valid_len += FRAME_OVERHEAD + payload.len() as u64;
        }
        Ok((records, valid_len))
    }
}

/// Length prefix plus CRC trailer.
const FRAME_OVERHEAD: u64 = 8;

/// Ledger records are a context key plus two integers; anything larger is a
/// corrupt length prefix.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// Next CRC-checked payload, or `None` at end of log or at the first bad frame.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let Some(len_buf) = read_array(reader)? else {
        return Ok(None);
    };
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }
    let Some(crc_buf) = read_array(reader)? else {
        return Ok(None);
    };
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(Some(payload))
}

fn read_array(reader: &mut impl Read) -> io::Result<Option<[u8; 4]>> {
    let mut buf = [0u8; 4];
    Ok(read_full(reader, &mut buf)?.then_some(buf))
}

/// Fill `buf`, returning false if the log ends first.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LedgerEntry, LoginContext};

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("hallkeep_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn set(ctx: &str, failed_count: u32) -> LedgerRecord {
        LedgerRecord::Set {
            context: LoginContext::from(ctx),
            entry: LedgerEntry {
                failed_count,
                lockout_until: None,
            },
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.ledger");
        let records = vec![
            set("a", 1),
            set("a", 2),
            LedgerRecord::Clear {
                context: LoginContext::from("a"),
            },
        ];
        {
            let mut wal = Wal::open(&path).unwrap();
            for r in &records {
                wal.append(r).unwrap();
            }
            assert_eq!(wal.appends_since_compact(), 3);
        }
        assert_eq!(Wal::replay(&path).unwrap(), records);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("never_written.ledger");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn truncated_tail_is_discarded() {
        let path = tmp_path("truncated.ledger");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&set("a", 1)).unwrap();
            wal.append(&set("b", 2)).unwrap();
        }
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        assert_eq!(Wal::replay(&path).unwrap(), vec![set("a", 1)]);
    }

    #[test]
    fn corrupt_crc_stops_replay() {
        let path = tmp_path("corrupt.ledger");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&set("a", 1)).unwrap();
            wal.append(&set("b", 2)).unwrap();
        }
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        assert_eq!(Wal::replay(&path).unwrap(), vec![set("a", 1)]);
    }

    #[test]
    fn oversized_length_prefix_stops_replay() {
        let path = tmp_path("oversized.ledger");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&set("a", 1)).unwrap();
        }
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        fs::write(&path, bytes).unwrap();

        assert_eq!(Wal::replay(&path).unwrap(), vec![set("a", 1)]);
    }

    #[test]
    fn recover_truncates_torn_tail_before_appending() {
        let path = tmp_path("recover.ledger");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&set("a", 1)).unwrap();
        }
        let good_len = fs::metadata(&path).unwrap().len();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[7, 0, 0, 0, 1, 2]).unwrap();
        }

        let (mut wal, records) = Wal::recover(&path).unwrap();
        assert_eq!(records, vec![set("a", 1)]);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

        wal.append(&set("a", 3)).unwrap();
        drop(wal);
        assert_eq!(Wal::replay(&path).unwrap(), vec![set("a", 1), set("a", 3)]);
    }

    #[test]
    fn recover_missing_file_creates_it() {
        let path = tmp_path("recover_fresh.ledger");
        let (_wal, records) = Wal::recover(&path).unwrap();
        assert!(records.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn compact_replaces_history() {
        let path = tmp_path("compact.ledger");
        let mut wal = Wal::open(&path).unwrap();
        for i in 1..=5 {
            wal.append(&set("a", i)).unwrap();
        }
        wal.compact(&[set("a", 5)]).unwrap();
        assert_eq!(wal.appends_since_compact(), 0);

        // Appends after compaction land in the new file.
        wal.append(&set("b", 1)).unwrap();
        assert_eq!(Wal::replay(&path).unwrap(), vec![set("a", 5), set("b", 1)]);
    }
}
