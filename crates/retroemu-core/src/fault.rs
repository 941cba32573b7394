//! Fault taxonomy for memory-access policy violations and mapping errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Non-fatal access faults.
///
/// These never abort execution: reads of unmapped addresses return zero,
/// offending writes are dropped, and the core continues. Each occurrence is
/// logged and recorded in the owning address space's
/// [`Diagnostics`](crate::Diagnostics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Fault {
    /// Read from an address no region contains.
    #[error("read from unmapped address {addr:#06x}")]
    UnmappedRead {
        /// The faulting address.
        addr: u16,
    },
    /// Write to an address no region contains.
    #[error("write to unmapped address {addr:#06x}")]
    UnmappedWrite {
        /// The faulting address.
        addr: u16,
    },
    /// Write to an address resolved to a non-writable region.
    #[error("write to read-only memory at {addr:#06x}")]
    ReadOnlyWrite {
        /// The faulting address.
        addr: u16,
    },
    /// Unmap request naming no registered region.
    #[error("unmap of unknown region id")]
    UnknownRegionId,
}

/// Coarse classification of a [`Fault`], used as the diagnostics counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultKind {
    /// Read outside every region.
    UnmappedRead,
    /// Write outside every region.
    UnmappedWrite,
    /// Write into a read-only region.
    ReadOnlyWrite,
    /// Unmap with no matching id.
    UnknownRegionId,
}

impl FaultKind {
    /// Number of fault kinds; sizes the diagnostics counter array.
    pub const COUNT: usize = 4;

    /// Stable counter-array index for this kind.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::UnmappedRead => 0,
            Self::UnmappedWrite => 1,
            Self::ReadOnlyWrite => 2,
            Self::UnknownRegionId => 3,
        }
    }
}

impl Fault {
    /// Returns the counter classification for this fault.
    #[must_use]
    pub const fn kind(self) -> FaultKind {
        match self {
            Self::UnmappedRead { .. } => FaultKind::UnmappedRead,
            Self::UnmappedWrite { .. } => FaultKind::UnmappedWrite,
            Self::ReadOnlyWrite { .. } => FaultKind::ReadOnlyWrite,
            Self::UnknownRegionId => FaultKind::UnknownRegionId,
        }
    }
}

/// Errors raised while establishing a mapping. Unlike [`Fault`]s these are
/// surfaced to the caller directly; the mapping is not created.
#[derive(Debug, Error)]
pub enum MapError {
    /// The backing file could not be opened, created, or sized.
    #[error("failed to open backing file `{}`", path.display())]
    FileOpenFailure {
        /// Path of the file that failed to open.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A region must span at least one byte.
    #[error("region `{id}` has zero size")]
    EmptyRegion {
        /// Id of the rejected region.
        id: String,
    },
    /// The caller-supplied buffer cannot back a region of the requested size.
    #[error("buffer for region `{id}` holds {actual} bytes, {expected} required")]
    BufferTooSmall {
        /// Id of the rejected region.
        id: String,
        /// Requested region size in bytes.
        expected: u32,
        /// Bytes actually available in the buffer.
        actual: usize,
    },
}
