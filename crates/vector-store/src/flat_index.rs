use crate::error::{Result, VectorStoreError};
use ndarray::{Array2, ArrayView1, Axis};
use std::path::Path;

const INDEX_MAGIC: &[u8; 4] = b"MKV1";
const HEADER_LEN: usize = 16;

/// Exact brute-force index over squared Euclidean distance.
///
/// Rows are addressed by insertion ordinal. The dimension is fixed by the first non-empty
/// append; an empty index reports dimension 0.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    vectors: Array2<f32>,
}

impl Default for FlatL2Index {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatL2Index {
    #[must_use]
    pub fn new() -> Self {
        Self {
            vectors: Array2::zeros((0, 0)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    /// Checks every row of `batch` against the index dimension without mutating anything.
    pub fn validate_batch(&self, batch: &[Vec<f32>]) -> Result<()> {
        let Some(first) = batch.first() else {
            return Ok(());
        };
        let expected = if self.dimension() == 0 {
            first.len()
        } else {
            self.dimension()
        };
        if expected == 0 {
            return Err(VectorStoreError::IndexError(
                "Cannot index zero-length vectors".to_string(),
            ));
        }
        for vector in batch {
            if vector.len() != expected {
                return Err(VectorStoreError::InvalidDimension {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }

    /// Appends the whole batch or nothing.
    pub fn append(&mut self, batch: &[Vec<f32>]) -> Result<()> {
        self.validate_batch(batch)?;
        let Some(first) = batch.first() else {
            return Ok(());
        };
        if self.dimension() == 0 {
            self.vectors = Array2::zeros((0, first.len()));
        }
        self.vectors.reserve_rows(batch.len()).map_err(shape_error)?;
        for vector in batch {
            self.vectors
                .push_row(ArrayView1::from(vector.as_slice()))
                .map_err(shape_error)?;
        }
        Ok(())
    }

    /// Up to `k` nearest rows as `(ordinal, squared_distance)`, ascending by distance, ties by
    /// ordinal.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if k == 0 || self.is_empty() {
            return Ok(vec![]);
        }
        if query.len() != self.dimension() {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let query = ArrayView1::from(query);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(ordinal, row)| {
                let distance = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>();
                (ordinal, distance)
            })
            .collect();

        // Stable sort keeps insertion order among equal distances.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Err(VectorStoreError::MissingArtifact(path.to_path_buf()));
        }
        let bytes = tokio::fs::read(path).await?;
        decode_index(&bytes).map_err(|reason| VectorStoreError::CorruptIndex {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Serialized `MKV1` form; see [`IndexedCorpus::persist`](crate::IndexedCorpus::persist).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_index(self)
    }
}

fn shape_error(err: ndarray::ShapeError) -> VectorStoreError {
    VectorStoreError::IndexError(err.to_string())
}

fn encode_index(index: &FlatL2Index) -> Result<Vec<u8>> {
    let dim = u32::try_from(index.dimension())
        .map_err(|_| VectorStoreError::IndexError("Vector dimension exceeds u32".to_string()))?;
    let count = index.len() as u64;
    let mut out = Vec::with_capacity(HEADER_LEN + index.vectors.len() * 4);
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&dim.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    for value in &index.vectors {
        out.extend_from_slice(&value.to_le_bytes());
    }
    Ok(out)
}

fn decode_index(bytes: &[u8]) -> std::result::Result<FlatL2Index, String> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != INDEX_MAGIC {
        return Err("missing MKV1 header".to_string());
    }
    let dim = u32::from_le_bytes(read_array(&bytes[4..8])?) as usize;
    let count = usize::try_from(u64::from_le_bytes(read_array(&bytes[8..16])?))
        .map_err(|_| "vector count exceeds platform limits".to_string())?;
    if count > 0 && dim == 0 {
        return Err(format!("{count} vectors with dimension 0"));
    }
    let expected_len = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| "header overflows".to_string())?;
    if bytes.len() != expected_len {
        return Err(format!(
            "expected {expected_len} bytes for {count}x{dim}, found {}",
            bytes.len()
        ));
    }
    let values: Vec<f32> = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let vectors = Array2::from_shape_vec((count, dim), values).map_err(|err| err.to_string())?;
    Ok(FlatL2Index { vectors })
}

fn read_array<const N: usize>(bytes: &[u8]) -> std::result::Result<[u8; N], String> {
    bytes
        .try_into()
        .map_err(|_| format!("truncated header field ({} bytes)", bytes.len()))
}
