// Checkpoint: Save and load trainable parameters
//
// Binary checkpoint format (.w2vc):
//
//   Header:
//     magic:   [u8; 4]  = b"W2VC"
//     version: u32 LE   = 1
//     count:   u32 LE   = number of tensors
//
//   For each tensor:
//     key_len:  u32 LE
//     key:      [u8; key_len]  (UTF-8 state-dict path, e.g. "encoder/weights")
//     dtype:    u8             (0=F32, 1=F64, 2=I32, 3=I64)
//     ndim:     u32 LE         (always 2)
//     dims:     [u32 LE; ndim]
//     data_len: u64 LE         (in bytes)
//     data:     [u8; data_len] (raw little-endian values, logical order)
//
// Padding is never written: tensors are read back with the default layout
// for their shape. Values stored under a different dtype than the one being
// loaded are converted through f64.
//
// Usage:
//   checkpoint::save("model.w2vc", &embeddings.state_dict())?;
//   let dict = checkpoint::load::<f32>("model.w2vc")?;
//   embeddings.load_state_dict(&dict)?;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use w2v_core::{DType, Element, Error, Matrix, Result, DEFAULT_ALIGNMENT};
use w2v_nn::StateDict;

const MAGIC: &[u8; 4] = b"W2VC";
const VERSION: u32 = 1;

// Raw bytes <-> tensor

fn tensor_to_bytes<T: Element>(tensor: &Matrix<T>) -> Vec<u8> {
    let values = tensor.to_vec();
    match T::DTYPE {
        DType::F32 => values
            .iter()
            .flat_map(|v| (v.as_f64() as f32).to_le_bytes())
            .collect(),
        DType::F64 => values
            .iter()
            .flat_map(|v| v.as_f64().to_le_bytes())
            .collect(),
        DType::I32 => values
            .iter()
            .flat_map(|v| (v.as_f64() as i32).to_le_bytes())
            .collect(),
        DType::I64 => values
            .iter()
            .flat_map(|v| (v.as_f64() as i64).to_le_bytes())
            .collect(),
    }
}

fn tensor_from_bytes<T: Element>(bytes: &[u8], shape: [usize; 2], dtype: DType) -> Result<Matrix<T>> {
    let values: Vec<T> = match dtype {
        DType::F32 => bytes
            .chunks_exact(4)
            .map(|c| T::from_f64(f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64))
            .collect(),
        DType::F64 => bytes
            .chunks_exact(8)
            .map(|c| T::from_f64(f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])))
            .collect(),
        DType::I32 => bytes
            .chunks_exact(4)
            .map(|c| T::from_f64(i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64))
            .collect(),
        DType::I64 => bytes
            .chunks_exact(8)
            .map(|c| {
                T::from_f64(i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f64)
            })
            .collect(),
    };
    Matrix::from_vec(shape, values)
}

// Low-level IO helpers

fn write_u32(w: &mut impl Write, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64(w: &mut impl Write, v: u64) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u8(r: &mut impl Read) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read exactly `len` bytes. Lengths come from the file, so the buffer only
/// grows as data actually arrives.
fn read_bytes(r: &mut impl Read, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(buf)
}

/// Byte length of a `shape` tensor of `dtype`, or `None` when it, or the
/// padded storage it would load into, overflows `usize`.
fn data_bytes(shape: [usize; 2], dtype: DType) -> Option<usize> {
    shape[1]
        .checked_add(DEFAULT_ALIGNMENT)
        .and_then(|padded| shape[0].checked_mul(padded))
        .and_then(|slots| slots.checked_mul(dtype.size_in_bytes()))?;
    Some(shape[0] * shape[1] * dtype.size_in_bytes())
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::InvalidFormat(format!("{what} {v} does not fit in u32")))
}

// Write

/// Write every tensor of `dict` to `writer`, keyed by its flattened path.
pub fn write_state_dict<T: Element>(writer: &mut impl Write, dict: &StateDict<T>) -> Result<()> {
    let flat = dict.flatten();

    writer.write_all(MAGIC)?;
    write_u32(writer, VERSION)?;
    write_u32(writer, to_u32(flat.len(), "tensor count")?)?;

    for (key, tensor) in &flat {
        let key_bytes = key.as_bytes();
        write_u32(writer, to_u32(key_bytes.len(), "key length")?)?;
        writer.write_all(key_bytes)?;

        writer.write_all(&[T::DTYPE.tag()])?;
        write_u32(writer, 2)?;
        for &d in tensor.shape() {
            write_u32(writer, to_u32(d, "dimension")?)?;
        }

        let data = tensor_to_bytes(tensor);
        write_u64(writer, data.len() as u64)?;
        writer.write_all(&data)?;
    }
    Ok(())
}

/// Serialize `dict` to an in-memory buffer.
pub fn to_bytes<T: Element>(dict: &StateDict<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_state_dict(&mut buf, dict)?;
    Ok(buf)
}

/// Save `dict` to a checkpoint file, creating or truncating it.
pub fn save<T: Element>(path: impl AsRef<Path>, dict: &StateDict<T>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_state_dict(&mut writer, dict)?;
    writer.flush()?;
    debug!(
        "checkpoint: wrote {} tensor(s) to {}",
        dict.num_tensors(),
        path.display()
    );
    Ok(())
}

// Read

/// Read a checkpoint from `reader` and rebuild the state dict it encodes.
pub fn read_state_dict<T: Element>(reader: &mut impl Read) -> Result<StateDict<T>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::InvalidFormat(format!(
            "bad checkpoint magic {magic:?}, expected {MAGIC:?}"
        )));
    }
    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(Error::InvalidFormat(format!(
            "unsupported checkpoint version {version}, expected {VERSION}"
        )));
    }

    let count = read_u32(reader)? as usize;
    let mut entries = Vec::new();
    for _ in 0..count {
        let key_len = read_u32(reader)? as usize;
        let key = String::from_utf8(read_bytes(reader, key_len)?)
            .map_err(|e| Error::InvalidFormat(format!("checkpoint key is not UTF-8: {e}")))?;

        let tag = read_u8(reader)?;
        let dtype = DType::from_tag(tag)
            .ok_or_else(|| Error::InvalidFormat(format!("unknown dtype tag {tag} for {key:?}")))?;

        let ndim = read_u32(reader)?;
        if ndim != 2 {
            return Err(Error::InvalidFormat(format!(
                "{key:?} has rank {ndim}, expected 2"
            )));
        }
        let shape = [read_u32(reader)? as usize, read_u32(reader)? as usize];

        let data_len = read_u64(reader)?;
        let expected = data_bytes(shape, dtype).ok_or_else(|| {
            Error::InvalidFormat(format!("{key:?}: shape {shape:?} of {dtype} is too large"))
        })?;
        if data_len != expected as u64 {
            return Err(Error::InvalidFormat(format!(
                "{key:?}: {data_len} data bytes for shape {shape:?} of {dtype}, expected {expected}"
            )));
        }
        let data = read_bytes(reader, expected)?;
        entries.push((key, tensor_from_bytes(&data, shape, dtype)?));
    }

    StateDict::from_flat(entries)
}

/// Deserialize a state dict from an in-memory buffer.
pub fn from_bytes<T: Element>(bytes: &[u8]) -> Result<StateDict<T>> {
    let mut cursor = bytes;
    read_state_dict(&mut cursor)
}

/// Load a state dict from a checkpoint file.
pub fn load<T: Element>(path: impl AsRef<Path>) -> Result<StateDict<T>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let dict = read_state_dict(&mut reader)?;
    debug!(
        "checkpoint: read {} tensor(s) from {}",
        dict.num_tensors(),
        path.display()
    );
    Ok(dict)
}
