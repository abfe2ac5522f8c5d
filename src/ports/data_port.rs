//! Market data access port trait.

use crate::domain::error::BreadthtraderError;
use crate::domain::observation::Observation;
use chrono::NaiveDate;

pub trait DataPort {
    /// Observations of one asset, in source order, restricted to the optional
    /// inclusive date bounds.
    fn fetch_observations(
        &self,
        asset: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, BreadthtraderError>;

    fn list_assets(&self) -> Result<Vec<String>, BreadthtraderError>;

    /// First day, last day and row count, or `None` when the asset has no rows.
    fn get_data_range(
        &self,
        asset: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BreadthtraderError>;
}
