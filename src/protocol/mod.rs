pub mod request;
pub mod response;

pub use request::{decode, DecodedRequest, Envelope, FuncValue, RequestIdValue};
pub use response::{format_response, ResponseKind};
