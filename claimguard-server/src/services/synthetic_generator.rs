//! Seeded synthetic claim population and supporting documents
//!
//! Output is fully determined by the options: the RNG is seeded with a
//! fixed value, so repeated runs produce identical populations.

use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use claimguard_common::models::{Claim, ClaimStatus, Patient, Provider};
use claimguard_common::{Error, PipelinePaths, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db;

pub const SEED: u64 = 42;

/// Procedure vocabulary with base amounts
pub const PROCEDURES: [(&str, f64); 6] = [
    ("PROC_A", 1000.0),
    ("PROC_B", 2000.0),
    ("PROC_C", 500.0),
    ("PROC_D", 5000.0),
    ("PROC_XRAY", 800.0),
    ("PROC_SURG", 15000.0),
];

pub const FRAUD_RATE: f64 = 0.025;
/// Share of legitimate documents carrying a harmless keyword hit
pub const NOISE_RATE: f64 = 0.03;

const GENDERS: [&str; 3] = ["M", "F", "O"];

const SUSPICIOUS_NOTES: [&str; 5] = [
    "Procedure billed as EXTERNAL_URGENT_IMPLANT without prior referral.",
    "Adjuster note: service not covered under the current plan.",
    "Verification failed: provider holds an invalid license.",
    "Timesheet attached. Billed hours: 999.",
    "Duplicate charge for the same service date was submitted.",
];

const NOISE_NOTES: [&str; 2] = [
    "Patient asked whether physiotherapy is not covered next year.",
    "Call reference 999 logged by front desk.",
];

const ROUTINE_NOTES: [&str; 4] = [
    "Routine visit, no issues noted.",
    "Follow-up scheduled in two weeks.",
    "Payment processed per standard schedule.",
    "Referral letter on file.",
];

/// Size of the generated population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub n_claims: usize,
    pub n_providers: usize,
    pub n_users: usize,
    /// Claims (from the first) that get a supporting document
    pub n_documents: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            n_claims: 2000,
            n_providers: 80,
            n_users: 500,
            n_documents: 200,
        }
    }
}

impl GenerationOptions {
    pub fn validate(&self) -> Result<()> {
        if self.n_claims == 0 || self.n_providers == 0 || self.n_users == 0 {
            return Err(Error::InvalidInput(
                "n_claims, n_providers and n_users must all be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Entry of `metadata.json` describing one raw document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file: String,
    pub claim_id: String,
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// Raw document before it is written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticDocument {
    pub metadata: DocumentMetadata,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SyntheticPopulation {
    pub providers: Vec<Provider>,
    pub patients: Vec<Patient>,
    pub claims: Vec<Claim>,
    pub documents: Vec<SyntheticDocument>,
}

/// Counts returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub claims: usize,
    pub providers: usize,
    pub users: usize,
    pub documents: usize,
    pub fraud_labels: usize,
}

/// Build a population in memory
pub fn generate_population(options: &GenerationOptions) -> Result<SyntheticPopulation> {
    options.validate()?;
    let mut rng = StdRng::seed_from_u64(SEED);

    let providers: Vec<Provider> = (0..options.n_providers)
        .map(|i| Provider {
            provider_id: format!("P{}", 1000 + i),
            provider_name: format!("Provider_{}", i),
            registration_year: rng.gen_range(1995..2024),
            license_number: format!("LIC{}", rng.gen_range(10000..=99999)),
        })
        .collect();

    let patients: Vec<Patient> = (0..options.n_users)
        .map(|i| Patient {
            patient_id: format!("U{}", 2000 + i),
            age: rng.gen_range(10..90),
            gender: GENDERS[rng.gen_range(0..GENDERS.len())].to_string(),
        })
        .collect();

    let start_date = NaiveDate::from_ymd_opt(2025, 1, 1)
        .ok_or_else(|| Error::Internal("invalid generator start date".to_string()))?;

    let mut claims = Vec::with_capacity(options.n_claims);
    for i in 0..options.n_claims {
        let patient = &patients[rng.gen_range(0..patients.len())];
        let provider = &providers[rng.gen_range(0..providers.len())];
        let (procedure, base) = PROCEDURES[rng.gen_range(0..PROCEDURES.len())];

        let mut amount = base * rng.gen_range(0.6..1.6);
        let is_fraud_label = rng.gen::<f64>() < FRAUD_RATE;
        if is_fraud_label {
            amount *= rng.gen_range(3.0..8.0);
        }

        claims.push(Claim {
            claim_id: format!("C{}", 100000 + i),
            patient_id: patient.patient_id.clone(),
            provider_id: provider.provider_id.clone(),
            procedure_code: procedure.to_string(),
            amount: (amount * 100.0).round() / 100.0,
            claim_date: start_date + Duration::days(rng.gen_range(0..300)),
            status: ClaimStatus::ALL[rng.gen_range(0..ClaimStatus::ALL.len())],
            is_fraud_label,
        });
    }

    let documents = claims
        .iter()
        .take(options.n_documents)
        .map(|claim| synthetic_document(claim, &mut rng))
        .collect();

    Ok(SyntheticPopulation {
        providers,
        patients,
        claims,
        documents,
    })
}

fn synthetic_document(claim: &Claim, rng: &mut StdRng) -> SyntheticDocument {
    let note = if claim.is_fraud_label {
        SUSPICIOUS_NOTES.choose(rng)
    } else if rng.gen::<f64>() < NOISE_RATE {
        NOISE_NOTES.choose(rng)
    } else {
        ROUTINE_NOTES.choose(rng)
    }
    .copied()
    .unwrap_or_default();

    let text = format!(
        "INVOICE\nClaim: {}\nProvider: {}\nPatient: {}\nProcedure: {}\nAmount billed: {:.2}\nDate of service: {}\nStatus: {}\nNotes: {}\n",
        claim.claim_id,
        claim.provider_id,
        claim.patient_id,
        claim.procedure_code,
        claim.amount,
        claim.claim_date.format("%Y-%m-%d"),
        claim.status,
        note
    );

    SyntheticDocument {
        metadata: DocumentMetadata {
            file: format!("{}_invoice.txt", claim.claim_id),
            claim_id: claim.claim_id.clone(),
            provider_id: Some(claim.provider_id.clone()),
        },
        text,
    }
}

/// Write raw documents plus `metadata.json` into `docs_dir`
pub fn write_documents(docs_dir: &Path, documents: &[SyntheticDocument]) -> Result<()> {
    fs::create_dir_all(docs_dir)?;
    for document in documents {
        fs::write(docs_dir.join(&document.metadata.file), &document.text)?;
    }

    let metadata: Vec<&DocumentMetadata> = documents.iter().map(|d| &d.metadata).collect();
    fs::write(
        docs_dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata)?,
    )?;
    Ok(())
}

/// Generate and persist a population, replacing the previous one
pub async fn generate_synthetic_data(
    pool: &SqlitePool,
    paths: &PipelinePaths,
    options: GenerationOptions,
) -> Result<GenerationSummary> {
    let docs_dir = paths.docs_raw_dir.clone();
    let population = tokio::task::spawn_blocking(move || -> Result<SyntheticPopulation> {
        let population = generate_population(&options)?;
        write_documents(&docs_dir, &population.documents)?;
        Ok(population)
    })
    .await
    .map_err(|e| Error::Internal(format!("generator task failed: {}", e)))??;

    db::claims::replace_population(pool, &population.providers, &population.patients, &population.claims)
        .await?;

    let summary = GenerationSummary {
        claims: population.claims.len(),
        providers: population.providers.len(),
        users: population.patients.len(),
        documents: population.documents.len(),
        fraud_labels: population.claims.iter().filter(|c| c.is_fraud_label).count(),
    };

    tracing::info!(
        claims = summary.claims,
        providers = summary.providers,
        users = summary.users,
        documents = summary.documents,
        fraud_labels = summary.fraud_labels,
        "Synthetic data generated"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::keyword_scanner::KeywordScanner;

    fn small() -> GenerationOptions {
        GenerationOptions {
            n_claims: 400,
            n_providers: 20,
            n_users: 50,
            n_documents: 400,
        }
    }

    #[test]
    fn test_deterministic() {
        let a = generate_population(&small()).unwrap();
        let b = generate_population(&small()).unwrap();
        assert_eq!(a.claims, b.claims);
        assert_eq!(a.providers, b.providers);
    }

    #[test]
    fn test_identifiers_and_ranges() {
        let population = generate_population(&small()).unwrap();
        assert_eq!(population.claims.len(), 400);
        assert_eq!(population.claims[0].claim_id, "C100000");
        assert_eq!(population.providers[0].provider_id, "P1000");
        assert_eq!(population.patients[0].patient_id, "U2000");

        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = start + Duration::days(300);
        for claim in &population.claims {
            assert!(claim.amount >= 0.0);
            assert!(claim.claim_date >= start && claim.claim_date < end);
            assert!(PROCEDURES.iter().any(|(p, _)| *p == claim.procedure_code));
        }
        for provider in &population.providers {
            assert!((1995..2024).contains(&provider.registration_year));
        }
    }

    #[test]
    fn test_fraud_documents_carry_keywords() {
        let population = generate_population(&small()).unwrap();
        let scanner = KeywordScanner::default();
        for document in &population.documents {
            let claim = population
                .claims
                .iter()
                .find(|c| c.claim_id == document.metadata.claim_id)
                .unwrap();
            if claim.is_fraud_label {
                assert!(scanner.count_in_text(&document.text) > 0);
            }
        }
    }

    #[test]
    fn test_document_count_capped_by_claims() {
        let options = GenerationOptions {
            n_claims: 5,
            n_documents: 200,
            ..small()
        };
        assert_eq!(generate_population(&options).unwrap().documents.len(), 5);
    }

    #[test]
    fn test_rejects_empty_population() {
        let options = GenerationOptions {
            n_providers: 0,
            ..small()
        };
        assert!(generate_population(&options).is_err());
    }

    #[tokio::test]
    async fn test_generate_persists_claims_and_docs() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = PipelinePaths::new(dir.path());
        paths.ensure_directories().unwrap();
        let pool = db::init_database_pool(&paths.database).await.unwrap();

        let summary = generate_synthetic_data(
            &pool,
            &paths,
            GenerationOptions {
                n_claims: 30,
                n_providers: 5,
                n_users: 10,
                n_documents: 10,
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.claims, 30);
        assert_eq!(summary.documents, 10);
        assert_eq!(db::claims::count_claims(&pool).await.unwrap(), 30);

        let metadata: Vec<DocumentMetadata> =
            serde_json::from_str(&fs::read_to_string(paths.docs_metadata()).unwrap()).unwrap();
        assert_eq!(metadata.len(), 10);
        assert!(paths.docs_raw_dir.join(&metadata[0].file).exists());
    }
}
