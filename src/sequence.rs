use anyhow::{Context, Result, bail};
use memchr::memchr;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// One record from a FASTA/FASTQ file: id (header up to the first space)
/// and the raw sequence bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub seq: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Fasta,
    Fastq,
}

/// Streaming FASTA/FASTQ reader. The format is sniffed from the first
/// byte: `>` for FASTA, `@` for FASTQ. FASTA sequences may span multiple
/// lines; FASTQ records are strict four-line records.
pub struct SequenceReader<R: BufRead> {
    reader: R,
    format: Format,
    // FASTA header line already consumed while scanning the previous record
    pending_header: Option<Vec<u8>>,
    line: Vec<u8>,
}

impl SequenceReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open sequence file: {}", path.display()))?;
        Self::new(BufReader::new(file))
            .with_context(|| format!("In sequence file {}", path.display()))
    }
}

impl<R: BufRead> SequenceReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let format = match reader.fill_buf()?.first() {
            Some(b'>') => Format::Fasta,
            Some(b'@') => Format::Fastq,
            Some(c) => bail!("Not a FASTA/FASTQ file (starts with {:?})", *c as char),
            None => bail!("Empty sequence file"),
        };
        Ok(Self {
            reader,
            format,
            pending_header: None,
            line: Vec::new(),
        })
    }

    /// Next record, `Ok(None)` at end of input. Malformed input is an
    /// error; the caller decides whether to skip the rest of the file.
    pub fn next_record(&mut self) -> Result<Option<SequenceRecord>> {
        match self.format {
            Format::Fasta => self.next_fasta(),
            Format::Fastq => self.next_fastq(),
        }
    }

    // Reads one line without its terminator; false at EOF.
    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(false);
        }
        while matches!(self.line.last(), Some(b'\n') | Some(b'\r')) {
            self.line.pop();
        }
        Ok(true)
    }

    fn next_fasta(&mut self) -> Result<Option<SequenceRecord>> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => {
                loop {
                    if !self.read_line()? {
                        return Ok(None);
                    }
                    if !self.line.is_empty() {
                        break;
                    }
                }
                if self.line.first() != Some(&b'>') {
                    bail!("Expected '>' header in FASTA input");
                }
                self.line.clone()
            }
        };

        let id = seqid(&header[1..])?;
        let mut seq = Vec::new();
        loop {
            if !self.read_line()? {
                break;
            }
            if self.line.first() == Some(&b'>') {
                self.pending_header = Some(self.line.clone());
                break;
            }
            seq.extend_from_slice(&self.line);
        }
        Ok(Some(SequenceRecord { id, seq }))
    }

    fn next_fastq(&mut self) -> Result<Option<SequenceRecord>> {
        if !self.read_line()? {
            return Ok(None);
        }
        if self.line.first() != Some(&b'@') {
            bail!("Expected '@' header in FASTQ input");
        }
        let id = seqid(&self.line[1..])?;

        if !self.read_line()? {
            bail!("Truncated FASTQ record: missing sequence line");
        }
        let seq = self.line.clone();

        if !self.read_line()? || self.line.first() != Some(&b'+') {
            bail!("Truncated FASTQ record: missing '+' separator");
        }

        if !self.read_line()? {
            bail!("Truncated FASTQ record: missing quality line");
        }
        if self.line.len() != seq.len() {
            bail!(
                "FASTQ quality length {} does not match sequence length {}",
                self.line.len(),
                seq.len()
            );
        }
        Ok(Some(SequenceRecord { id, seq }))
    }
}

// Header id: everything before the first space.
fn seqid(header: &[u8]) -> Result<String> {
    let end = memchr(b' ', header).unwrap_or(header.len());
    Ok(std::str::from_utf8(&header[..end])
        .context("Sequence header is not valid UTF-8")?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(data: &str) -> Result<Vec<SequenceRecord>> {
        let mut reader = SequenceReader::new(Cursor::new(data.as_bytes().to_vec()))?;
        let mut records = Vec::new();
        while let Some(rec) = reader.next_record()? {
            records.push(rec);
        }
        Ok(records)
    }

    #[test]
    fn fasta_multiline_records() {
        let recs = read_all(">seq1 first entry\nACGT\nACGT\n>seq2\nTTTT\n").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].id, "seq1");
        assert_eq!(recs[0].seq, b"ACGTACGT");
        assert_eq!(recs[1].id, "seq2");
        assert_eq!(recs[1].seq, b"TTTT");
    }

    #[test]
    fn fasta_skips_blank_lines_between_records() {
        let recs = read_all(">a\nACGT\n\n>b\nGGGG\n").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].seq, b"GGGG");
    }

    #[test]
    fn fastq_records() {
        let recs = read_all("@r1 desc\nACGT\n+\nIIII\n@r2\nGG\n+r2\nII\n").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].id, "r1");
        assert_eq!(recs[0].seq, b"ACGT");
        assert_eq!(recs[1].seq, b"GG");
    }

    #[test]
    fn fastq_quality_mismatch_is_an_error() {
        assert!(read_all("@r1\nACGT\n+\nII\n").is_err());
    }

    #[test]
    fn fastq_truncated_record_is_an_error() {
        assert!(read_all("@r1\nACGT\n").is_err());
    }

    #[test]
    fn unknown_leading_byte_is_an_error() {
        assert!(SequenceReader::new(Cursor::new(b"xACGT\n".to_vec())).is_err());
    }

    #[test]
    fn crlf_input_is_tolerated() {
        let recs = read_all(">a x\r\nAC\r\nGT\r\n").unwrap();
        assert_eq!(recs[0].id, "a");
        assert_eq!(recs[0].seq, b"ACGT");
    }
}
