pub mod batch;
pub mod certificate;
pub mod credential;
pub mod job;
pub mod revocation;
pub mod verification;
pub mod webhook;
