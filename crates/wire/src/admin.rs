//! `HS_ADMIN` record: who may administer a handle, and how.

use crate::codec::{Reader, Writer};
use crate::errors::Result;
use crate::value::MAX_HANDLE_LEN;
use serde::{Deserialize, Serialize};

const ADD_HANDLE: u16 = 0x0001;
const DELETE_HANDLE: u16 = 0x0002;
const ADD_NAMING_AUTHORITY: u16 = 0x0004;
const DELETE_NAMING_AUTHORITY: u16 = 0x0008;
const MODIFY_VALUE: u16 = 0x0010;
const REMOVE_VALUE: u16 = 0x0020;
const ADD_VALUE: u16 = 0x0040;
const MODIFY_ADMIN: u16 = 0x0080;
const REMOVE_ADMIN: u16 = 0x0100;
const ADD_ADMIN: u16 = 0x0200;
const READ_VALUE: u16 = 0x0400;
const LIST_HANDLES: u16 = 0x0800;

/// The twelve administrative rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPermissions {
    pub add_handle: bool,
    pub delete_handle: bool,
    pub add_naming_authority: bool,
    pub delete_naming_authority: bool,
    pub modify_value: bool,
    pub remove_value: bool,
    pub add_value: bool,
    pub modify_admin: bool,
    pub remove_admin: bool,
    pub add_admin: bool,
    pub read_value: bool,
    pub list_handles: bool,
}

impl AdminPermissions {
    /// Every right granted.
    pub const fn full() -> Self {
        Self {
            add_handle: true,
            delete_handle: true,
            add_naming_authority: true,
            delete_naming_authority: true,
            modify_value: true,
            remove_value: true,
            add_value: true,
            modify_admin: true,
            remove_admin: true,
            add_admin: true,
            read_value: true,
            list_handles: true,
        }
    }

    pub fn flags(&self) -> [bool; 12] {
        [
            self.add_handle,
            self.delete_handle,
            self.add_naming_authority,
            self.delete_naming_authority,
            self.modify_value,
            self.remove_value,
            self.add_value,
            self.modify_admin,
            self.remove_admin,
            self.add_admin,
            self.read_value,
            self.list_handles,
        ]
    }

    pub fn is_full(&self) -> bool {
        self.flags().iter().all(|flag| *flag)
    }

    pub fn to_bits(self) -> u16 {
        const MASKS: [u16; 12] = [
            ADD_HANDLE,
            DELETE_HANDLE,
            ADD_NAMING_AUTHORITY,
            DELETE_NAMING_AUTHORITY,
            MODIFY_VALUE,
            REMOVE_VALUE,
            ADD_VALUE,
            MODIFY_ADMIN,
            REMOVE_ADMIN,
            ADD_ADMIN,
            READ_VALUE,
            LIST_HANDLES,
        ];
        self.flags()
            .iter()
            .zip(MASKS)
            .filter(|(granted, _)| **granted)
            .fold(0, |bits, (_, mask)| bits | mask)
    }

    pub fn from_bits(bits: u16) -> Self {
        Self {
            add_handle: bits & ADD_HANDLE != 0,
            delete_handle: bits & DELETE_HANDLE != 0,
            add_naming_authority: bits & ADD_NAMING_AUTHORITY != 0,
            delete_naming_authority: bits & DELETE_NAMING_AUTHORITY != 0,
            modify_value: bits & MODIFY_VALUE != 0,
            remove_value: bits & REMOVE_VALUE != 0,
            add_value: bits & ADD_VALUE != 0,
            modify_admin: bits & MODIFY_ADMIN != 0,
            remove_admin: bits & REMOVE_ADMIN != 0,
            add_admin: bits & ADD_ADMIN != 0,
            read_value: bits & READ_VALUE != 0,
            list_handles: bits & LIST_HANDLES != 0,
        }
    }
}

impl Default for AdminPermissions {
    fn default() -> Self {
        Self::full()
    }
}

/// Administrator identity (`admin_handle` at `admin_index`) plus its rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub admin_handle: Vec<u8>,
    pub admin_index: u32,
    pub permissions: AdminPermissions,
}

impl AdminRecord {
    pub fn new(admin_handle: Vec<u8>, admin_index: u32, permissions: AdminPermissions) -> Self {
        Self {
            admin_handle,
            admin_index,
            permissions,
        }
    }

    /// Serialized form stored as the data of an `HS_ADMIN` value.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(10 + self.admin_handle.len());
        w.put_u16(self.permissions.to_bits());
        w.put_bytes("admin handle", &self.admin_handle)?;
        w.put_u32(self.admin_index);
        Ok(w.into_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let permissions = AdminPermissions::from_bits(r.get_u16()?);
        let admin_handle = r.get_bytes("admin handle", MAX_HANDLE_LEN)?.to_vec();
        let admin_index = r.get_u32()?;
        r.finish()?;
        Ok(Self {
            admin_handle,
            admin_index,
            permissions,
        })
    }
}
