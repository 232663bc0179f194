use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::PgStore;
use crate::services::{
    certificates::CertificateDirectory,
    issuance::{IssuanceQueue, IssuanceWorker, IssuerSettings},
    notifier::Notifier,
    provider::CredentialProvider,
    revocation::RevocationService,
    verification::VerificationEngine,
    webhook::WebhookIngress,
};
use crate::store::{CertificateStore, JobStore, MemoryStore, RecordSource, RevocationLedger};

/// The storage seams every service is built from.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub certificates: Arc<dyn CertificateStore>,
    pub ledger: Arc<dyn RevocationLedger>,
    pub records: Arc<dyn RecordSource>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            jobs: store.clone(),
            certificates: store.clone(),
            ledger: store.clone(),
            records: store,
        }
    }

    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            jobs: store.clone(),
            certificates: store.clone(),
            ledger: store.clone(),
            records: store,
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Absent when running on in-memory stores.
    pub db: Option<PgPool>,
    pub provider: Arc<dyn CredentialProvider>,
    pub issuance: Arc<IssuanceQueue>,
    pub certificates: Arc<CertificateDirectory>,
    pub verifier: Arc<VerificationEngine>,
    pub revocations: Arc<RevocationService>,
    pub webhooks: Arc<WebhookIngress>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Option<PgPool>,
        stores: &Stores,
        provider: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let issuance = IssuanceQueue::new(
            stores.jobs.clone(),
            stores.certificates.clone(),
            stores.records.clone(),
            config.require_inspection,
        );
        let verifier = VerificationEngine::new(
            provider.clone(),
            stores.certificates.clone(),
            stores.ledger.clone(),
            config.trusted_issuer_list(),
        );

        Self {
            db,
            issuance: Arc::new(issuance),
            certificates: Arc::new(CertificateDirectory::new(stores.certificates.clone(), provider.clone())),
            verifier: Arc::new(verifier),
            revocations: Arc::new(RevocationService::new(
                stores.certificates.clone(),
                stores.ledger.clone(),
                notifier,
            )),
            webhooks: Arc::new(WebhookIngress::new(
                provider.clone(),
                stores.certificates.clone(),
                stores.ledger.clone(),
            )),
            provider,
            config: Arc::new(config),
        }
    }
}

/// Issuance worker wired to the same stores and provider as the API.
pub fn issuance_worker(
    config: &AppConfig,
    stores: &Stores,
    provider: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
) -> IssuanceWorker {
    IssuanceWorker::new(
        stores.jobs.clone(),
        stores.certificates.clone(),
        provider,
        notifier,
        IssuerSettings {
            issuer_did: config.issuer_did.clone(),
            validity: config.credential_validity(),
        },
    )
}
