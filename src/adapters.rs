//! HTTP and crypto implementations of the enrollment collaborators.

mod http;
pub mod idemix;
pub mod issuing_server;
pub mod jwt;
pub mod verifier;

pub use http::build_client;
pub use idemix::HttpIdemixIssuer;
pub use issuing_server::ApiServerClient;
pub use jwt::{Rs256Signer, UnsignedJwt};
pub use verifier::HttpDocumentVerifier;
