
use std::cmp::Ordering;
use std::io::{Read, Write};
use thiserror::Error;

const MAGIC: &[u8; 8] = b"SSFLATIP";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Index dimension must be at least 1")]
    ZeroDimension,
    #[error("Not a flat inner-product index file")]
    BadMagic,
    #[error("Unsupported index format version {0}")]
    UnsupportedVersion(u32),
    #[error("Index file is truncated or has trailing data")]
    Corrupt,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exact inner-product index over a row-major matrix.
///
/// Row `i` is the `i`-th vector passed to [`FlatIpIndex::add`]; rows are
/// never reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append rows from a row-major slice whose length is a multiple of the dimension
    #[inline]
    pub fn add(&mut self, rows: &[f32]) -> Result<(), IndexError> {
        if rows.len() % self.dimension != 0 {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: rows.len() % self.dimension,
            });
        }
        self.data.extend_from_slice(rows);
        Ok(())
    }

    #[inline]
    pub fn row(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// The `k` rows with the highest inner product against `query`,
    /// best first; ties keep row order
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scores: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|row| row.iter().zip(query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scores.truncate(k);
        Ok(scores)
    }

    /// Binary layout: magic, version, dimension, row count (all little-endian),
    /// then the rows as little-endian `f32`
    #[inline]
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), IndexError> {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u64).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    #[inline]
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, IndexError> {
        let mut magic = [0_u8; 8];
        reader.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(IndexError::BadMagic);
        }

        let mut version = [0_u8; 4];
        reader.read_exact(&mut version).map_err(truncated)?;
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }

        let dimension = read_u64(&mut reader)?;
        let rows = read_u64(&mut reader)?;
        let dimension = usize::try_from(dimension).map_err(|_| IndexError::Corrupt)?;
        let rows = usize::try_from(rows).map_err(|_| IndexError::Corrupt)?;

        let mut index = Self::new(dimension)?;
        let values = dimension.checked_mul(rows).ok_or(IndexError::Corrupt)?;

        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() != values.checked_mul(4).ok_or(IndexError::Corrupt)? {
            return Err(IndexError::Corrupt);
        }

        index.data = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(index)
    }
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, IndexError> {
    let mut buf = [0_u8; 8];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(u64::from_le_bytes(buf))
}

fn truncated(e: std::io::Error) -> IndexError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        IndexError::Corrupt
    } else {
        IndexError::Io(e)
    }
}
