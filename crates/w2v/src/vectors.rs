// Word-vector files
//
// The output of a training run: one embedding row per vocabulary word, in
// the binary word2vec layout.
//
//   "<vocabulary size> <dimension count>\n"
//   then, for each word in lexicographic order:
//     <word> ' ' <dims x f32 LE, back to back> '\n'
//
// The float block is raw binary and may itself contain space or newline
// bytes, so a reader must consume exactly `dims * 4` bytes per word rather
// than scanning for delimiters.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use w2v_core::{Error, Matrix, Result, DEFAULT_ALIGNMENT};

/// Where a vocabulary word lives in the embedding table, and how often it
/// occurred in the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabEntry {
    /// Row of the word's vector in the embedding table.
    pub row: usize,
    /// Corpus frequency.
    pub count: u64,
}

impl VocabEntry {
    pub fn new(row: usize, count: u64) -> Self {
        VocabEntry { row, count }
    }
}

/// Vocabulary keyed by word. Iteration order is the file order.
pub type Vocab = BTreeMap<String, VocabEntry>;

/// Vectors read back from a file: `vectors` row `i` belongs to `words[i]`.
#[derive(Debug, Clone)]
pub struct WordVectors {
    pub words: Vec<String>,
    pub vectors: Matrix<f32>,
}

impl WordVectors {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.vectors.shape()[1]
    }

    /// The vector stored for `word`, if present.
    pub fn get(&self, word: &str) -> Option<Vec<f32>> {
        let row = self.words.iter().position(|w| w == word)?;
        self.vectors.slice(row).ok().map(|v| v.to_vec())
    }
}

/// Write the vectors of every `vocab` word from `embeddings` to `writer`.
pub fn write_vectors(writer: &mut impl Write, embeddings: &Matrix<f32>, vocab: &Vocab) -> Result<()> {
    let [rows, dims] = *embeddings.shape();
    if let Some(entry) = vocab.values().find(|e| e.row >= rows) {
        return Err(Error::IndexOutOfRange {
            index: entry.row,
            len: rows,
        });
    }

    writeln!(writer, "{} {}", vocab.len(), dims)?;
    for (word, entry) in vocab {
        writer.write_all(word.as_bytes())?;
        writer.write_all(b" ")?;
        for v in embeddings.slice(entry.row)?.to_vec() {
            writer.write_all(&v.to_le_bytes())?;
        }
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Save vectors to `path`, creating or truncating the file.
pub fn save_vectors(path: impl AsRef<Path>, embeddings: &Matrix<f32>, vocab: &Vocab) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_vectors(&mut writer, embeddings, vocab)?;
    writer.flush()?;
    debug!(
        "vectors: wrote {} word(s) x {} dims to {}",
        vocab.len(),
        embeddings.shape()[1],
        path.display()
    );
    Ok(())
}

fn read_until_byte(reader: &mut impl BufRead, delim: u8, what: &str) -> Result<String> {
    let mut buf = Vec::new();
    reader.read_until(delim, &mut buf)?;
    if buf.pop() != Some(delim) {
        return Err(Error::InvalidFormat(format!("unexpected end of file in {what}")));
    }
    String::from_utf8(buf).map_err(|e| Error::InvalidFormat(format!("{what} is not UTF-8: {e}")))
}

fn parse_count(field: Option<&str>, what: &str) -> Result<usize> {
    field
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::InvalidFormat(format!("missing or bad {what} in header")))
}

/// Bytes of a `count x dims` f32 table, rejecting sizes whose padded
/// storage would not fit in `usize`.
fn table_bytes(count: usize, dims: usize) -> Result<usize> {
    dims.checked_add(DEFAULT_ALIGNMENT)
        .and_then(|padded| count.checked_mul(padded))
        .and_then(|slots| slots.checked_mul(4))
        .map(|_| count * dims * 4)
        .ok_or_else(|| {
            Error::InvalidFormat(format!("table of {count} x {dims} floats is too large"))
        })
}

/// Read exactly `len` bytes, allocating no more than the reader delivers.
fn read_len(reader: &mut impl Read, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(buf)
}

/// Parse a vector file from `reader`.
pub fn read_vectors(reader: &mut impl BufRead) -> Result<WordVectors> {
    let header = read_until_byte(reader, b'\n', "header")?;
    let mut fields = header.split(' ');
    let count = parse_count(fields.next(), "vocabulary size")?;
    let dims = parse_count(fields.next(), "dimension count")?;
    if fields.next().is_some() {
        return Err(Error::InvalidFormat(format!("trailing data in header {header:?}")));
    }

    // Header sizes are untrusted: storage grows only as rows arrive.
    let row_bytes = table_bytes(1, dims)?;
    table_bytes(count, dims)?;
    let mut words = Vec::new();
    let mut values = Vec::new();
    for _ in 0..count {
        let word = read_until_byte(reader, b' ', "word")?;
        let raw = read_len(reader, row_bytes)?;
        values.extend(
            raw.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );

        let mut newline = [0u8; 1];
        reader.read_exact(&mut newline)?;
        if newline[0] != b'\n' {
            return Err(Error::InvalidFormat(format!(
                "missing newline after vector for {word:?}"
            )));
        }
        words.push(word);
    }

    let vectors = Matrix::from_vec([count, dims], values)?;
    Ok(WordVectors { words, vectors })
}

/// Load a vector file from `path`.
pub fn load_vectors(path: impl AsRef<Path>) -> Result<WordVectors> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let loaded = read_vectors(&mut reader)?;
    debug!(
        "vectors: read {} word(s) x {} dims from {}",
        loaded.len(),
        loaded.dims(),
        path.display()
    );
    Ok(loaded)
}
