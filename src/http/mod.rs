//! HTTP request pipeline.
//!
//! Requests are built by [`ApiClient`], sent through a [`Transport`], and every
//! non-2xx answer is mapped onto one fixed error table ([`NormalizedError`]).
//! Binary downloads (PDF, spreadsheets, octet streams) bypass the table.

mod client;
mod error;
mod transport;

pub use client::{ApiClient, Body, Payload};
pub use error::{FieldError, NormalizedError};
pub use transport::{
    HttpRequest, HttpResponse, MultipartForm, RequestBody, ReqwestTransport, Transport,
    TransportError,
};

pub(crate) use client::{segment, with_query};
pub(crate) use transport::TransportDyn;
