//! Bagged-tree regression model over the joined feature matrix.

use anyhow::{anyhow, Result};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

/// Column order of every feature matrix handed to the model.
pub const FEATURE_NAMES: [&str; 8] = [
    "hour",
    "dow",
    "lag_1",
    "lag_2",
    "roll_6",
    "temperature_2m",
    "windspeed_10m",
    "precipitation",
];

/// Random forest fit fresh on each forecast request. The fixed seed makes
/// tree construction reproducible across identical inputs; there is no
/// train/validation split.
pub struct LoadModel {
    model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl LoadModel {
    fn parameters() -> RandomForestRegressorParameters {
        RandomForestRegressorParameters::default()
            .with_n_trees(200)
            .with_seed(42)
    }

    pub fn fit(x: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Self> {
        if x.is_empty() {
            return Err(anyhow!("cannot train on an empty feature matrix"));
        }
        if x.len() != y.len() {
            return Err(anyhow!(
                "feature/target length mismatch: {} rows vs {} targets",
                x.len(),
                y.len()
            ));
        }
        let matrix = DenseMatrix::from_2d_vec(&x);
        let model = RandomForestRegressor::fit(&matrix, &y, Self::parameters())
            .map_err(|e| anyhow!("random forest training failed: {e}"))?;
        Ok(Self { model })
    }

    pub fn predict_one(&self, features: &[f64]) -> Result<f64> {
        let x = DenseMatrix::new(1, features.len(), features.to_vec(), false);
        let predictions = self
            .model
            .predict(&x)
            .map_err(|e| anyhow!("prediction failed: {e}"))?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow!("model returned no prediction"))
    }
}
