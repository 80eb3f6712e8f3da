//! Service façade: memoized, authenticated handles for the remote document
//! and file services.
//!
//! The two free functions are the crate's surface:
//!
//! - [`document_service_handle`]: handle for the document service
//! - [`file_service_handle`]: handle for the file service
//!
//! Both drive a process-wide [`ServiceFactory`] configured from the
//! environment. The first call performs credential resolution and, when
//! needed, the interactive authorization flow; every later call returns the
//! identical handle without touching the filesystem or the network.

pub mod error;
pub mod factory;
pub mod handle;

pub use error::{CoreError, Result};
pub use factory::ServiceFactory;
pub use handle::{Credential, ServiceHandle, ServiceKind, DOCUMENTS_SCOPE, DRIVE_SCOPE};

use core_runtime::Settings;
use tokio::sync::OnceCell;

static FACTORY: OnceCell<ServiceFactory> = OnceCell::const_new();

async fn process_factory() -> Result<&'static ServiceFactory> {
    FACTORY
        .get_or_try_init(|| async {
            let settings = Settings::from_env()?;
            Ok::<_, CoreError>(ServiceFactory::new(settings))
        })
        .await
}

/// The authenticated handle for the remote document service.
pub async fn document_service_handle() -> Result<&'static ServiceHandle> {
    process_factory().await?.handle(ServiceKind::Docs).await
}

/// The authenticated handle for the remote file service.
pub async fn file_service_handle() -> Result<&'static ServiceHandle> {
    process_factory().await?.handle(ServiceKind::Drive).await
}
