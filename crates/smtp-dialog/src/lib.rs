mod client;
mod proto;
mod timeouts;
mod traits;

pub use client::{ClientError, EsmtpCapability, SmtpClient};
pub use proto::{Command, EnhancedStatusCode, Response};
pub use timeouts::SmtpClientTimeouts;
pub use traits::{AsyncReadAndWrite, BoxedAsyncReadAndWrite};
