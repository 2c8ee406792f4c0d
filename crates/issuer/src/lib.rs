//! Handle Issuer
//!
//! Mints new persistent identifiers under a naming authority. Each handle is
//! created with two values: an `HS_ADMIN` record granting the authority full
//! rights, and a public `DESC` value. Requests are signed with the
//! authority's Ed25519 key and sent to a handle server over TCP, or to an
//! in-process stub.
//!
//! ```no_run
//! # async fn run() -> hdl_issuer::Result<()> {
//! use hdl_issuer::{HandleCreationService, IssuerSettings};
//!
//! let settings = IssuerSettings::load("issuer.toml".as_ref())?;
//! let service = HandleCreationService::new(settings);
//! match service.create_handle("report-2024-17", "Annual report").await?.into_result()? {
//!     Some(handle) => println!("created {handle}"),
//!     None => println!("suffix already taken"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod errors;
pub mod records;
pub mod service;
pub mod settings;
pub mod storage;
pub mod transformer;
pub mod transport;

pub use auth::{AuthContext, NamingAuthority, PUBLIC_INDEX};
pub use client::{validate_suffix, CreateOutcome, HandleClient};
pub use errors::*;
pub use records::{CreateValues, RecordBuilder, ADMIN_INDEX};
pub use service::HandleCreationService;
pub use settings::{
    IssuerSettings, LogFormat, LogSettings, ServerMode, ServerSettings, StorageSettings,
};
pub use storage::{open_storage, IssuedHandle, MemoryStorage, ObjectStorage, SledStorage};
pub use transformer::{HandleItem, HandleTransformer};
pub use transport::{HandleTransport, StubHandleService, TcpTransport, TransportError};
