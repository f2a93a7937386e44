//! Scratch buffer for file transfers.
//!
//! Allocation shrinks the requested size until it succeeds, so a transfer
//! still runs (slower) under memory pressure. A size of 0 means no memory
//! could be obtained at all.

use log::{debug, warn};

#[derive(Debug, Default)]
pub struct TransferBuffer {
    data: Option<Vec<u8>>,
    /// Largest block the allocator may hand out, if the host knows it.
    max_block: Option<usize>,
}

impl TransferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer whose allocations are capped to half of `max_block`, the
    /// same share a platform-aware caller reserves from its largest free
    /// heap block.
    pub fn with_max_block(max_block: usize) -> Self {
        Self {
            data: None,
            max_block: Some(max_block),
        }
    }

    /// Allocates up to `preferred` bytes and returns the size obtained.
    ///
    /// An already allocated buffer is kept and its size returned.
    pub fn allocate(&mut self, preferred: usize) -> usize {
        if let Some(data) = &self.data {
            return data.len();
        }

        let mut size = match self.max_block {
            Some(max_block) => preferred.min(max_block / 2),
            None => preferred,
        };
        while size > 0 {
            let mut data = Vec::new();
            if data.try_reserve_exact(size).is_ok() {
                data.resize(size, 0);
                debug!("Allocated transfer buffer of {} bytes", size);
                self.data = Some(data);
                return size;
            }
            warn!("Cannot allocate {} bytes for file transfer, re-trying", size);
            size -= 1;
        }
        0
    }

    pub fn free(&mut self) {
        self.data = None;
    }

    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}
