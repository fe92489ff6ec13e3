use std::{fmt, str::FromStr};

use super::error::ReferenceIdError;

const LOCAL_BITS: u32 = 56;
const LOCAL_MASK: u64 = (1 << LOCAL_BITS) - 1;

/// Session-scoped identifier of any replicated object.
///
/// The upper 8 bits hold the authority segment (which peer allocated the id),
/// the lower 56 bits a per-authority counter. `0` is [`ReferenceId::NULL`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ReferenceId(u64);

impl ReferenceId {
    /// "No reference"
    pub const NULL: ReferenceId = ReferenceId(0);

    /// Authority segment reserved for objects every world owns intrinsically
    pub const WORLD_SEGMENT: u8 = 0;

    /// The root slot of every world
    pub const ROOT_SLOT: ReferenceId = ReferenceId(1);

    /// Largest value the local segment can hold
    pub const MAX_LOCAL: u64 = LOCAL_MASK;

    pub fn new(authority: u8, local: u64) -> Result<Self, ReferenceIdError> {
        if local > LOCAL_MASK {
            return Err(ReferenceIdError::LocalSegmentOverflow { local });
        }
        Ok(Self(((authority as u64) << LOCAL_BITS) | local))
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }

    pub fn authority(self) -> u8 {
        (self.0 >> LOCAL_BITS) as u8
    }

    pub fn local(self) -> u64 {
        self.0 & LOCAL_MASK
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Id `offset` positions after this one within the same allocation block.
    ///
    /// Members of a slot or component occupy the ids directly following the
    /// owner's id, so both peers derive them the same way.
    pub fn offset(self, offset: u64) -> Result<Self, ReferenceIdError> {
        let local = self
            .local()
            .checked_add(offset)
            .ok_or(ReferenceIdError::LocalSegmentOverflow { local: u64::MAX })?;
        Self::new(self.authority(), local)
    }

    /// Canonical wire form: the packed value in decimal
    pub fn to_wire_string(self) -> String {
        self.0.to_string()
    }

    /// Decodes the canonical wire form. Empty or malformed input yields
    /// [`ReferenceId::NULL`]; callers must tolerate absent references.
    pub fn from_wire_str(input: &str) -> Self {
        input.parse().unwrap_or(Self::NULL)
    }
}

impl FromStr for ReferenceId {
    type Err = ReferenceIdError;

    /// Accepts only the canonical form: ASCII digits, no sign, no
    /// surrounding whitespace and no leading zeros
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(ReferenceIdError::Empty);
        }
        let canonical = input.bytes().all(|byte| byte.is_ascii_digit())
            && !(input.len() > 1 && input.starts_with('0'));
        if !canonical {
            return Err(ReferenceIdError::Malformed {
                input: input.to_string(),
            });
        }
        input
            .parse::<u64>()
            .map(ReferenceId)
            .map_err(|_| ReferenceIdError::Malformed {
                input: input.to_string(),
            })
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "ReferenceId(Null)");
        }
        write!(f, "ReferenceId({}:{})", self.authority(), self.local())
    }
}

/// Hands out contiguous id blocks for one authority segment
#[derive(Clone, Debug)]
pub struct ReferenceAllocator {
    authority: u8,
    next_local: u64,
}

impl ReferenceAllocator {
    pub fn new(authority: u8) -> Self {
        Self {
            authority,
            next_local: 1,
        }
    }

    pub fn authority(&self) -> u8 {
        self.authority
    }

    /// Switches to a new authority segment, restarting the counter.
    /// Used once a replica learns its segment from the join grant.
    pub fn reassign(&mut self, authority: u8) {
        self.authority = authority;
        self.next_local = 1;
    }

    /// Reserves `count` consecutive ids and returns the first one
    pub fn allocate_block(&mut self, count: u64) -> Result<ReferenceId, ReferenceIdError> {
        let count = count.max(1);
        let last = self
            .next_local
            .checked_add(count - 1)
            .ok_or(ReferenceIdError::LocalSegmentOverflow { local: u64::MAX })?;
        if last > LOCAL_MASK {
            return Err(ReferenceIdError::LocalSegmentOverflow { local: last });
        }
        let first = ReferenceId::new(self.authority, self.next_local)?;
        self.next_local = last + 1;
        Ok(first)
    }

    pub fn allocate(&mut self) -> Result<ReferenceId, ReferenceIdError> {
        self.allocate_block(1)
    }
}
