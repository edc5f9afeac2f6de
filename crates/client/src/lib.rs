//! `client` crate — the wire layer for the LEDGERS accounting API.
//!
//! Everything that touches the network goes through [`HttpTransport`]. The
//! engine crate builds [`RequestSpec`]s and hands them to whichever transport
//! it was given: [`ReqwestTransport`] in production, [`mock::MockTransport`]
//! in tests.

pub mod auth;
pub mod credentials;
pub mod error;
pub mod http;
pub mod mock;
pub mod transport;

pub use auth::{login, API_KEY_HEADER, API_TOKEN_HEADER};
pub use credentials::{Credentials, Session};
pub use error::ClientError;
pub use http::ReqwestTransport;
pub use transport::{endpoint, HttpMethod, HttpResponse, HttpTransport, RequestSpec};
