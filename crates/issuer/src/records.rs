//! The two values every new handle starts with.

use crate::errors::{IssuerError, Result};
use chrono::Utc;
use hdl_wire::{AdminRecord, HandleValue, ValuePermissions, ADMIN_TYPE, DESC_TYPE};

/// Index of the `HS_ADMIN` value on a created handle.
pub const ADMIN_INDEX: u32 = 100;
/// Index of the description value on a created handle.
pub const DESCRIPTION_INDEX: u32 = crate::auth::PUBLIC_INDEX;

const ADMIN_PERMISSIONS: ValuePermissions = ValuePermissions {
    read: true,
    write: true,
    admin: true,
    public_write: false,
};

const DESCRIPTION_PERMISSIONS: ValuePermissions = ValuePermissions {
    read: true,
    write: true,
    admin: false,
    public_write: false,
};

/// Builds handle values stamped with one creation time.
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    timestamp: u32,
}

impl RecordBuilder {
    pub fn now() -> Self {
        let timestamp = u32::try_from(Utc::now().timestamp().max(0)).unwrap_or(u32::MAX);
        Self { timestamp }
    }

    pub fn at(timestamp: u32) -> Self {
        Self { timestamp }
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// `DESC` value holding `description` as UTF-8.
    pub fn build_description_value(&self, description: &str) -> Result<HandleValue> {
        HandleValue::new(
            DESCRIPTION_INDEX,
            DESC_TYPE,
            description.as_bytes().to_vec(),
            self.timestamp,
            DESCRIPTION_PERMISSIONS,
        )
        .map_err(IssuerError::RecordConstruction)
    }

    /// `HS_ADMIN` value granting `admin` its rights on the new handle.
    pub fn build_admin_value(&self, admin: &AdminRecord) -> Result<HandleValue> {
        let data = admin.to_bytes().map_err(IssuerError::RecordConstruction)?;
        HandleValue::new(
            ADMIN_INDEX,
            ADMIN_TYPE,
            data,
            self.timestamp,
            ADMIN_PERMISSIONS,
        )
        .map_err(IssuerError::RecordConstruction)
    }

    pub fn build_values(&self, admin: &AdminRecord, description: &str) -> Result<CreateValues> {
        Ok(CreateValues {
            admin: self.build_admin_value(admin)?,
            description: self.build_description_value(description)?,
        })
    }
}

/// Admin and description values for one create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateValues {
    admin: HandleValue,
    description: HandleValue,
}

impl CreateValues {
    pub fn admin(&self) -> &HandleValue {
        &self.admin
    }

    pub fn description(&self) -> &HandleValue {
        &self.description
    }

    /// Admin value first, then description.
    pub fn to_vec(&self) -> Vec<HandleValue> {
        vec![self.admin.clone(), self.description.clone()]
    }
}
