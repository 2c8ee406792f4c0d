//! Typed handle values and their on-wire layout.

use crate::codec::{Reader, Writer};
use crate::errors::{Result, WireError};
use serde::{Deserialize, Serialize};

/// Type tag of the administrative value.
pub const ADMIN_TYPE: &[u8] = b"HS_ADMIN";
/// Type tag of the free-text description value.
pub const DESC_TYPE: &[u8] = b"DESC";

/// Cache lifetime advertised for freshly created values.
pub const DEFAULT_TTL_SECONDS: u32 = 86_400;

/// Largest value payload accepted by the codec (1 MiB).
pub const MAX_VALUE_DATA_LEN: usize = 1 << 20;
/// Largest handle (or suffix) accepted by the codec.
pub const MAX_HANDLE_LEN: usize = 1024;
/// Largest type tag accepted by the codec.
pub const MAX_TYPE_LEN: usize = 256;

const MAX_REFERENCES: u32 = 1024;

const PERM_ADMIN_READ: u8 = 0x08;
const PERM_ADMIN_WRITE: u8 = 0x04;
const PERM_PUBLIC_READ: u8 = 0x02;
const PERM_PUBLIC_WRITE: u8 = 0x01;

/// How `ttl` is to be interpreted by resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlType {
    /// Seconds relative to retrieval time.
    Relative,
    /// Absolute Unix time.
    Absolute,
}

impl TtlType {
    pub fn as_u8(self) -> u8 {
        match self {
            TtlType::Relative => 0,
            TtlType::Absolute => 1,
        }
    }

    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(TtlType::Relative),
            1 => Ok(TtlType::Absolute),
            other => Err(WireError::InvalidTtlType(other)),
        }
    }
}

/// Access flags carried by every value.
///
/// `admin` and `write` govern what administrators of the handle may do with
/// the value; `read` and `public_write` govern anonymous clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePermissions {
    pub read: bool,
    pub write: bool,
    pub admin: bool,
    pub public_write: bool,
}

impl ValuePermissions {
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.admin {
            bits |= PERM_ADMIN_READ;
        }
        if self.write {
            bits |= PERM_ADMIN_WRITE;
        }
        if self.read {
            bits |= PERM_PUBLIC_READ;
        }
        if self.public_write {
            bits |= PERM_PUBLIC_WRITE;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            read: bits & PERM_PUBLIC_READ != 0,
            write: bits & PERM_ADMIN_WRITE != 0,
            admin: bits & PERM_ADMIN_READ != 0,
            public_write: bits & PERM_PUBLIC_WRITE != 0,
        }
    }
}

/// Pointer from one value to a value of another handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueReference {
    pub handle: Vec<u8>,
    pub index: u32,
}

/// A single typed value of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleValue {
    pub index: u32,
    pub value_type: Vec<u8>,
    pub data: Vec<u8>,
    pub ttl_type: TtlType,
    pub ttl: u32,
    /// Creation time, Unix seconds.
    pub timestamp: u32,
    pub references: Vec<ValueReference>,
    pub permissions: ValuePermissions,
}

impl HandleValue {
    /// Build a value with a relative one-day TTL and no references.
    pub fn new(
        index: u32,
        value_type: &[u8],
        data: Vec<u8>,
        timestamp: u32,
        permissions: ValuePermissions,
    ) -> Result<Self> {
        if value_type.len() > MAX_TYPE_LEN {
            return Err(WireError::TooLarge {
                field: "value type",
                len: value_type.len(),
                limit: MAX_TYPE_LEN,
            });
        }
        if data.len() > MAX_VALUE_DATA_LEN {
            return Err(WireError::TooLarge {
                field: "value data",
                len: data.len(),
                limit: MAX_VALUE_DATA_LEN,
            });
        }
        Ok(Self {
            index,
            value_type: value_type.to_vec(),
            data,
            ttl_type: TtlType::Relative,
            ttl: DEFAULT_TTL_SECONDS,
            timestamp,
            references: Vec::new(),
            permissions,
        })
    }

    /// Type tag rendered for logs.
    pub fn type_name(&self) -> String {
        String::from_utf8_lossy(&self.value_type).into_owned()
    }

    pub fn is_type(&self, tag: &[u8]) -> bool {
        self.value_type == tag
    }

    pub fn encode(&self, w: &mut Writer) -> Result<()> {
        w.put_u32(self.index);
        w.put_u32(self.timestamp);
        w.put_u8(self.ttl_type.as_u8());
        w.put_u32(self.ttl);
        w.put_u8(self.permissions.to_bits());
        w.put_bytes("value type", &self.value_type)?;
        w.put_bytes("value data", &self.data)?;
        let count = u32::try_from(self.references.len()).map_err(|_| WireError::TooLarge {
            field: "references",
            len: self.references.len(),
            limit: MAX_REFERENCES as usize,
        })?;
        w.put_u32(count);
        for reference in &self.references {
            w.put_bytes("reference handle", &reference.handle)?;
            w.put_u32(reference.index);
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let index = r.get_u32()?;
        let timestamp = r.get_u32()?;
        let ttl_type = TtlType::from_u8(r.get_u8()?)?;
        let ttl = r.get_u32()?;
        let permissions = ValuePermissions::from_bits(r.get_u8()?);
        let value_type = r.get_bytes("value type", MAX_TYPE_LEN)?.to_vec();
        let data = r.get_bytes("value data", MAX_VALUE_DATA_LEN)?.to_vec();
        let count = r.get_u32()?;
        if count > MAX_REFERENCES {
            return Err(WireError::TooLarge {
                field: "references",
                len: count as usize,
                limit: MAX_REFERENCES as usize,
            });
        }
        let mut references = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let handle = r.get_bytes("reference handle", MAX_HANDLE_LEN)?.to_vec();
            let index = r.get_u32()?;
            references.push(ValueReference { handle, index });
        }
        Ok(Self {
            index,
            value_type,
            data,
            ttl_type,
            ttl,
            timestamp,
            references,
            permissions,
        })
    }
}
