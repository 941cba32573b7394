//! Layered address space: named, possibly overlapping memory regions with
//! overlay semantics.
//!
//! Regions registered later shadow earlier ones over the same addresses;
//! unmapping a shadow makes the prior mapping visible again with its
//! contents intact. Every access resolves against the regions in reverse
//! registration order, first containing match wins.

mod region;

pub use region::{MemoryRegion, RegionSlice, RegionStorage};

use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::rc::Rc;

use crate::diag::Diagnostics;
use crate::fault::{Fault, MapError};

/// Region ids compare equal on at most this many leading bytes, an
/// intentionally bounded comparison inherited from the fixed-width id
/// storage of earlier hardware tables.
pub const REGION_ID_MATCH_LEN: usize = 16;

fn region_id_matches(registered: &str, requested: &str) -> bool {
    let lhs = &registered.as_bytes()[..registered.len().min(REGION_ID_MATCH_LEN)];
    let rhs = &requested.as_bytes()[..requested.len().min(REGION_ID_MATCH_LEN)];
    lhs == rhs
}

/// An ordered collection of [`MemoryRegion`]s resolving every byte access.
///
/// Reads of unmapped addresses return zero, writes outside writable storage
/// are dropped; both are logged and counted in [`Diagnostics`] rather than
/// aborting execution. File-backed regions are flushed on unmap and on
/// drop.
#[derive(Debug, Default)]
pub struct AddressSpace {
    regions: Vec<MemoryRegion>,
    diag: Diagnostics,
}

impl AddressSpace {
    /// Creates an address space with no mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps an owned, zero-filled buffer of `size` bytes at `base`.
    ///
    /// # Errors
    ///
    /// Rejects a zero `size` with [`MapError::EmptyRegion`].
    pub fn map_zeroed(
        &mut self,
        id: &str,
        base: u16,
        size: u32,
        writable: bool,
    ) -> Result<(), MapError> {
        if size == 0 {
            return Err(MapError::EmptyRegion { id: id.to_owned() });
        }
        let storage = RegionStorage::Owned(vec![0; size as usize].into_boxed_slice());
        self.regions
            .push(MemoryRegion::new(id, base, size, writable, storage));
        Ok(())
    }

    /// Maps a caller-owned buffer at `base`. The address space keeps a
    /// shared handle and never frees the buffer; the caller observes writes
    /// as they happen.
    ///
    /// # Errors
    ///
    /// Rejects a zero `size` ([`MapError::EmptyRegion`]) or a buffer shorter
    /// than `size` ([`MapError::BufferTooSmall`]).
    pub fn map_buffer(
        &mut self,
        id: &str,
        base: u16,
        size: u32,
        buffer: Rc<RefCell<Vec<u8>>>,
        writable: bool,
    ) -> Result<(), MapError> {
        if size == 0 {
            return Err(MapError::EmptyRegion { id: id.to_owned() });
        }
        let available = buffer.borrow().len();
        if available < size as usize {
            return Err(MapError::BufferTooSmall {
                id: id.to_owned(),
                expected: size,
                actual: available,
            });
        }
        let storage = RegionStorage::Borrowed(buffer);
        self.regions
            .push(MemoryRegion::new(id, base, size, writable, storage));
        Ok(())
    }

    /// Maps a file at `base`.
    ///
    /// Writable mode creates or extends the file to `size` bytes and keeps
    /// an image that is written back on unmap and on drop, so mutations
    /// persist. Read-only mode copies the whole file into an owned buffer;
    /// `size` is ignored and the file length determines the region size.
    ///
    /// # Errors
    ///
    /// [`MapError::FileOpenFailure`] when the file cannot be opened,
    /// created, sized, or read; the mapping is not created.
    /// [`MapError::EmptyRegion`] for a zero writable `size` or an empty
    /// read-only file.
    pub fn map_file(
        &mut self,
        id: &str,
        base: u16,
        size: u32,
        path: &Path,
        writable: bool,
    ) -> Result<(), MapError> {
        let open_failure = |source| MapError::FileOpenFailure {
            path: path.to_path_buf(),
            source,
        };

        let (size, storage) = if writable {
            if size == 0 {
                return Err(MapError::EmptyRegion { id: id.to_owned() });
            }
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(open_failure)?;
            file.set_len(u64::from(size)).map_err(open_failure)?;
            file.seek(SeekFrom::Start(0)).map_err(open_failure)?;
            let mut buf = vec![0_u8; size as usize];
            file.read_exact(&mut buf).map_err(open_failure)?;
            (
                size,
                RegionStorage::File {
                    file,
                    buf: buf.into_boxed_slice(),
                },
            )
        } else {
            let bytes = fs::read(path).map_err(open_failure)?;
            if bytes.is_empty() {
                return Err(MapError::EmptyRegion { id: id.to_owned() });
            }
            let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
            (len, RegionStorage::Owned(bytes.into_boxed_slice()))
        };

        self.regions
            .push(MemoryRegion::new(id, base, size, writable, storage));
        Ok(())
    }

    /// Removes the most recently registered region matching `id` (bounded
    /// [`REGION_ID_MATCH_LEN`]-byte comparison). Owned storage is freed,
    /// borrowed handles dropped, file-backed contents flushed to disk.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnknownRegionId`] (also logged and counted) when no
    /// region matches; nothing is removed.
    pub fn unmap(&mut self, id: &str) -> Result<(), Fault> {
        let Some(index) = self
            .regions
            .iter()
            .rposition(|region| region_id_matches(region.id(), id))
        else {
            log::warn!("unmap: no region matching id `{id}`");
            self.diag.record(Fault::UnknownRegionId);
            return Err(Fault::UnknownRegionId);
        };

        let mut region = self.regions.remove(index);
        if let Err(err) = region.storage.flush() {
            log::warn!("flush of region `{}` failed: {err}", region.id());
        }
        Ok(())
    }

    fn resolve(&self, addr: u16) -> Option<usize> {
        self.regions.iter().rposition(|region| region.contains(addr))
    }

    /// Reads the byte at `addr`. Unmapped addresses read as zero and record
    /// a [`Fault::UnmappedRead`].
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        match self.resolve(addr) {
            Some(index) => {
                let region = &self.regions[index];
                region.storage.read(region.offset_of(addr))
            }
            None => {
                log::warn!("read from unmapped address {addr:#06x}");
                self.diag.record(Fault::UnmappedRead { addr });
                0
            }
        }
    }

    /// Reads the little-endian 16-bit value at `addr` and `addr + 1`.
    #[must_use]
    pub fn read16(&self, addr: u16) -> u16 {
        let low = self.read(addr);
        let high = self.read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Writes the byte at `addr`. Writes outside every region or into a
    /// read-only region are dropped and recorded.
    pub fn write(&mut self, addr: u16, value: u8) {
        match self.resolve(addr) {
            Some(index) => {
                let region = &mut self.regions[index];
                if region.writable() {
                    let offset = region.offset_of(addr);
                    region.storage.write(offset, value);
                } else {
                    log::warn!("write to read-only memory at {addr:#06x} ignored");
                    self.diag.record(Fault::ReadOnlyWrite { addr });
                }
            }
            None => {
                log::warn!("write to unmapped address {addr:#06x}");
                self.diag.record(Fault::UnmappedWrite { addr });
            }
        }
    }

    /// Resolves `addr` like [`AddressSpace::read`] and returns a direct view
    /// of the winning region's backing bytes, for inspector use. The borrow
    /// ends before the next map or unmap can occur; unmapped addresses
    /// return `None` and record a fault.
    pub fn pointer(&mut self, addr: u16) -> Option<RegionSlice<'_>> {
        match self.resolve(addr) {
            Some(index) => {
                let region = &mut self.regions[index];
                let offset = region.offset_of(addr);
                Some(RegionSlice::new(&mut region.storage, offset))
            }
            None => {
                log::warn!("pointer into unmapped address {addr:#06x}");
                self.diag.record(Fault::UnmappedRead { addr });
                None
            }
        }
    }

    /// Walks the current mappings in registration order.
    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions.iter()
    }

    /// Access-fault counters for this address space.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        for region in &mut self.regions {
            if let Err(err) = region.storage.flush() {
                log::warn!("flush of region `{}` on teardown failed: {err}", region.id());
            }
        }
    }
}
