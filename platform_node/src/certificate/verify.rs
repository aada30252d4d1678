//! Public certificate verification.
//!
//! Resolves a validation code to a read-only summary with no
//! authentication. The summary exposes only the holder's display name, the
//! course title, the issuance date and the code itself; unknown, malformed
//! and empty codes all produce the same not-found result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EngineResult;
use crate::storage::Store;

#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub holder_name: String,
    pub course_title: String,
    pub issued_at: DateTime<Utc>,
    pub validation_code: String,
}

pub struct PublicVerifier {
    store: Arc<dyn Store>,
}

impl PublicVerifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn verify(&self, code: &str) -> EngineResult<Option<CertificateSummary>> {
        let Some(certificate) = self.store.certificate_by_code(code).await? else {
            return Ok(None);
        };
        // Dangling references mean the summary cannot be assembled; the
        // public surface treats that the same as an unknown code.
        let Some(account) = self.store.account(certificate.account_id).await? else {
            return Ok(None);
        };
        let Some(course) = self.store.course(certificate.course_id).await? else {
            return Ok(None);
        };
        Ok(Some(CertificateSummary {
            holder_name: account.full_name,
            course_title: course.title,
            issued_at: certificate.issued_at,
            validation_code: certificate.validation_code,
        }))
    }
}
