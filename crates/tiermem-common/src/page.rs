//! Page addressing and memory request types.

use serde::{Deserialize, Serialize};

/// Default page shift (4 KB pages).
pub const DEFAULT_PAGE_SHIFT: u32 = 12;

/// Default chunk shift used to model migration traffic (64-byte lines).
pub const DEFAULT_CHUNK_SHIFT: u32 = 6;

/// Page-granular address: a byte address shifted right by the page shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageAddr(pub u64);

impl PageAddr {
    /// Returns the page containing `byte_addr` for pages of `2^page_shift` bytes.
    #[inline]
    pub fn containing(byte_addr: u64, page_shift: u32) -> Self {
        Self(byte_addr >> page_shift)
    }

    /// Returns the first byte address of this page.
    #[inline]
    pub fn base_addr(&self, page_shift: u32) -> u64 {
        self.0 << page_shift
    }
}

impl std::fmt::Display for PageAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page:{:#x}", self.0)
    }
}

/// Direction of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessOp {
    Read,
    Write,
}

impl AccessOp {
    pub fn is_write(&self) -> bool {
        matches!(self, AccessOp::Write)
    }
}

/// Host-assigned identifier carried through the engine untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// A top-level memory request from the host.
///
/// The engine reads only `addr` (to find the page) and `op` (for access
/// statistics); everything else is handed back to the host on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemRequest {
    /// Host identifier.
    pub id: RequestId,
    /// Byte address of the access.
    pub addr: u64,
    /// Read or write.
    pub op: AccessOp,
    /// Access size in bytes.
    pub size: u32,
}

impl MemRequest {
    pub fn new(id: u64, addr: u64, op: AccessOp, size: u32) -> Self {
        Self {
            id: RequestId(id),
            addr,
            op,
            size,
        }
    }

    pub fn read(id: u64, addr: u64) -> Self {
        Self::new(id, addr, AccessOp::Read, 64)
    }

    pub fn write(id: u64, addr: u64) -> Self {
        Self::new(id, addr, AccessOp::Write, 64)
    }

    /// Returns the page this request falls in.
    #[inline]
    pub fn page(&self, page_shift: u32) -> PageAddr {
        PageAddr::containing(self.addr, page_shift)
    }
}
