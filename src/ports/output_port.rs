//! Result output port trait.

use crate::domain::error::BreadthtraderError;
use crate::domain::performance::StatisticSeries;
use crate::domain::weights::WeightMatrix;

pub trait OutputPort {
    fn write_weights(&self, weights: &WeightMatrix) -> Result<(), BreadthtraderError>;
    fn write_statistics(&self, statistics: &StatisticSeries) -> Result<(), BreadthtraderError>;
}
