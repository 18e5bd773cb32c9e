/// Half-open row range processed as one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub offset: usize,
    pub len: usize,
}

/// Splits `row_count` rows into consecutive chunks of at most `chunk_size`.
///
/// A missing or zero chunk size plans one chunk over everything; zero rows
/// plan to nothing, making the write a no-op.
pub fn plan(row_count: usize, chunk_size: Option<usize>) -> Vec<Chunk> {
    if row_count == 0 {
        return Vec::new();
    }
    let size = match chunk_size {
        Some(s) if s > 0 => s,
        _ => row_count,
    };
    let mut chunks = Vec::with_capacity(row_count.div_ceil(size));
    let mut offset = 0;
    while offset < row_count {
        let len = size.min(row_count - offset);
        chunks.push(Chunk { offset, len });
        offset += len;
    }
    chunks
}
