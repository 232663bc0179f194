pub mod certificates;
pub mod hashing;
pub mod issuance;
pub mod notifier;
pub mod provider;
pub mod qr;
pub mod revocation;
pub mod verification;
pub mod webhook;
