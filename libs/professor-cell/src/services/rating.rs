// libs/professor-cell/src/services/rating.rs
use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::ProfessorError;
use crate::services::profile::ProfessorProfileService;

#[derive(Debug, Deserialize)]
struct RatingRow {
    rating: i32,
}

/// Recomputes the cached rating aggregate on a professor profile from the
/// full set of rated consultations. No incremental updates: recomputation
/// from scratch is the contract, which makes the operation idempotent and
/// immune to drift.
pub struct RatingAggregator {
    supabase: Arc<SupabaseClient>,
    profiles: ProfessorProfileService,
}

impl RatingAggregator {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            profiles: ProfessorProfileService::with_client(Arc::clone(&supabase), config),
            supabase,
        }
    }

    /// Arithmetic mean rounded to 2 decimal places; 0.00 when unrated.
    pub fn average(ratings: &[i32]) -> f64 {
        if ratings.is_empty() {
            return 0.0;
        }
        let sum: i32 = ratings.iter().sum();
        let mean = f64::from(sum) / ratings.len() as f64;
        (mean * 100.0).round() / 100.0
    }

    /// Recompute and persist average_rating/total_reviews for a professor.
    /// Called synchronously from the rate transition and the removal path.
    pub async fn recalculate(
        &self,
        professor_id: Uuid,
        auth_token: &str,
    ) -> Result<(f64, i32), ProfessorError> {
        debug!("Recalculating rating aggregate for professor {}", professor_id);

        let path = format!(
            "/rest/v1/consultations?professor_id=eq.{}&rating=not.is.null&select=rating",
            professor_id
        );
        let rows: Vec<RatingRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProfessorError::DatabaseError(e.to_string()))?;

        let ratings: Vec<i32> = rows.into_iter().map(|r| r.rating).collect();
        let average_rating = Self::average(&ratings);
        let total_reviews = ratings.len() as i32;

        // Profile may not exist yet if the professor never saved settings.
        self.profiles.get_or_create(professor_id, auth_token).await?;

        let patch = json!({
            "average_rating": average_rating,
            "total_reviews": total_reviews,
        });
        let path = format!("/rest/v1/professor_profiles?professor_id=eq.{}", professor_id);
        let updated: Vec<Value> = self
            .supabase
            .request_returning(Method::PATCH, &path, Some(auth_token), Some(patch))
            .await
            .map_err(|e| ProfessorError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            return Err(ProfessorError::NotFound);
        }

        info!(
            "Professor {} rating aggregate: {:.2} over {} reviews",
            professor_id, average_rating, total_reviews
        );

        Ok((average_rating, total_reviews))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_of_five_four_three() {
        assert_eq!(RatingAggregator::average(&[5, 4, 3]), 4.00);
    }

    #[test]
    fn test_average_empty_is_zero() {
        assert_eq!(RatingAggregator::average(&[]), 0.0);
    }

    #[test]
    fn test_average_rounds_to_two_decimals() {
        // 10/3 = 3.333... rounds to 3.33
        assert_eq!(RatingAggregator::average(&[3, 3, 4]), 3.33);
        // 14/3 = 4.666... rounds to 4.67
        assert_eq!(RatingAggregator::average(&[5, 5, 4]), 4.67);
    }

    #[test]
    fn test_average_is_idempotent() {
        let ratings = [4, 2, 5, 1];
        assert_eq!(
            RatingAggregator::average(&ratings),
            RatingAggregator::average(&ratings)
        );
    }
}
