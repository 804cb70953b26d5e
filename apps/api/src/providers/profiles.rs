use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{
    CandidateProfile, ExperienceBand, JobProfile, Location, RequiredSkill, SalaryRange,
};

/// Read-only access to candidate and job records owned by another service.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when the id does not exist.
    async fn get_candidate(&self, id: Uuid) -> Result<Option<CandidateProfile>, AppError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<JobProfile>, AppError>;

    /// Most recently updated candidates first, at most `limit`.
    async fn list_candidate_ids(&self, limit: usize) -> Result<Vec<Uuid>, AppError>;

    /// Most recently updated open jobs first, at most `limit`.
    async fn list_job_ids(&self, limit: usize) -> Result<Vec<Uuid>, AppError>;
}

#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    skills: Vec<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    years_experience: Option<f64>,
    salary_expectation: Option<f64>,
    salary_currency: Option<String>,
}

impl From<CandidateRow> for CandidateProfile {
    fn from(row: CandidateRow) -> Self {
        CandidateProfile {
            id: row.id,
            skills: row.skills,
            location: location_from_parts(row.city, row.region, row.country),
            years_experience: row.years_experience,
            salary_expectation: row.salary_expectation,
            salary_currency: row.salary_currency,
        }
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    title: String,
    required_skills: Json<Vec<RequiredSkill>>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    is_remote: bool,
    experience_min: Option<f64>,
    experience_max: Option<f64>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    salary_currency: Option<String>,
    job_type: Option<String>,
}

impl From<JobRow> for JobProfile {
    fn from(row: JobRow) -> Self {
        let experience = ExperienceBand {
            min_years: row.experience_min,
            max_years: row.experience_max,
        };
        let salary = SalaryRange {
            min: row.salary_min,
            max: row.salary_max,
            currency: row.salary_currency,
        };
        JobProfile {
            id: row.id,
            title: row.title,
            skills: row.required_skills.0,
            location: location_from_parts(row.city, row.region, row.country),
            remote: row.is_remote,
            experience: (!experience.is_open()).then_some(experience),
            salary: (salary.min.is_some() || salary.max.is_some()).then_some(salary),
            job_type: row.job_type,
        }
    }
}

fn location_from_parts(
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
) -> Option<Location> {
    let location = Location {
        city,
        region,
        country,
    };
    (!location.is_unknown()).then_some(location)
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get_candidate(&self, id: Uuid) -> Result<Option<CandidateProfile>, AppError> {
        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, skills, city, region, country,
                   years_experience, salary_expectation, salary_currency
            FROM candidates
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CandidateProfile::from))
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobProfile>, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, title, required_skills, city, region, country, is_remote,
                   experience_min, experience_max, salary_min, salary_max,
                   salary_currency, job_type
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JobProfile::from))
    }

    async fn list_candidate_ids(&self, limit: usize) -> Result<Vec<Uuid>, AppError> {
        Ok(
            sqlx::query_scalar("SELECT id FROM candidates ORDER BY updated_at DESC LIMIT $1")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_job_ids(&self, limit: usize) -> Result<Vec<Uuid>, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT id FROM jobs WHERE status = 'open' ORDER BY updated_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }
}
