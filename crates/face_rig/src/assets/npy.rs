use bytes::Buf;

use crate::error::AssetError;

const MAGIC: &[u8] = b"\x93NUMPY";

/// A dense little-endian float array read from a NumPy `.npy` file.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

fn npy_error(message: impl Into<String>) -> AssetError {
    AssetError::Npy(message.into())
}

/// Pulls the raw value of `'key': value` out of the header dictionary.
fn header_field<'a>(header: &'a str, key: &str) -> Result<&'a str, AssetError> {
    let pattern = format!("'{key}':");
    let start = header.find(&pattern)
        .ok_or_else(|| npy_error(format!("header is missing {key}")))?
        + pattern.len();
    let rest = header[start..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find(|c| c == ',' || c == '}')
    };
    Ok(rest[..end.unwrap_or(rest.len())].trim())
}

fn parse_shape(value: &str) -> Result<Vec<usize>, AssetError> {
    value.trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| npy_error(format!("invalid dimension {s:?}"))))
        .collect()
}

pub fn parse_npy(bytes: &[u8]) -> Result<NpyArray, AssetError> {
    let mut buf = bytes;
    if buf.len() < MAGIC.len() + 2 || !buf.starts_with(MAGIC) {
        return Err(npy_error("missing magic string"));
    }
    buf.advance(MAGIC.len());

    let major = buf.get_u8();
    let _minor = buf.get_u8();
    let header_len = match major {
        1 if buf.remaining() >= 2 => buf.get_u16_le() as usize,
        2 | 3 if buf.remaining() >= 4 => buf.get_u32_le() as usize,
        1..=3 => return Err(npy_error("truncated header")),
        _ => return Err(npy_error(format!("unsupported version {major}"))),
    };
    if buf.remaining() < header_len {
        return Err(npy_error("truncated header"));
    }
    let header = std::str::from_utf8(&buf[..header_len])
        .map_err(|_| npy_error("header is not text"))?;
    buf.advance(header_len);

    let descr = header_field(header, "descr")?.trim_matches(|c| c == '\'' || c == '"');
    if header_field(header, "fortran_order")? != "False" {
        return Err(npy_error("fortran ordered arrays are not supported"));
    }
    let shape = parse_shape(header_field(header, "shape")?)?;
    let count = shape.iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| npy_error(format!("shape {shape:?} is too large")))?;
    let item_size = match descr {
        "<f4" => 4,
        "<f8" => 8,
        other => return Err(npy_error(format!("unsupported dtype {other}"))),
    };
    let byte_len = count.checked_mul(item_size)
        .ok_or_else(|| npy_error(format!("shape {shape:?} is too large")))?;
    if buf.remaining() < byte_len {
        return Err(npy_error("array data is truncated"));
    }

    let data = if item_size == 4 {
        (0..count).map(|_| buf.get_f32_le()).collect()
    } else {
        (0..count).map(|_| buf.get_f64_le() as f32).collect()
    };

    Ok(NpyArray { shape, data })
}

#[cfg(test)]
fn encode_f4(shape: &[usize], data: &[f32]) -> Vec<u8> {
    let dims = shape.iter().map(|d| format!("{d},")).collect::<String>();
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({dims}), }}");
    while (MAGIC.len() + 4 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in data {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
