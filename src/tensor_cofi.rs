/**
 * RecoVal
 * Copyright (C) 2026 The recoval developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use fnv::FnvHashMap;
use nalgebra::DVector;
use serde_derive::{Deserialize, Serialize};

use crate::als::{self, AlsParams, Factors};
use crate::error::{Error, Result};
use crate::frame::{Frame, ITEM, RATING, USER};
use crate::ids::IdSpace;
use crate::model::Model;
use crate::tensor::InteractionTensor;

/// Tuning range of a hyperparameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

/// Tensor factorization recommender trained with implicit-feedback ALS.
///
/// The user side and the item side can each span several columns of the training frame,
/// every column becomes its own mode. A user is scored with the ids of its user-side columns
/// from the last training row it appeared in, and likewise for items.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TensorCoFi {
    params: AlsParams,
    user_columns: Vec<String>,
    item_columns: Vec<String>,
    rating_column: Option<String>,
    id_spaces: Vec<IdSpace>,
    user_features: FnvHashMap<String, Vec<usize>>,
    item_features: FnvHashMap<String, Vec<usize>>,
    factors: Option<Factors>,
}

impl Default for TensorCoFi {
    fn default() -> Self {
        TensorCoFi::new(AlsParams::default())
    }
}

impl TensorCoFi {

    pub fn new(params: AlsParams) -> Self {
        TensorCoFi::with_modes(params, vec![String::from(USER)], vec![String::from(ITEM)])
    }

    /// A model whose modes are `user_columns` followed by `item_columns`.
    pub fn with_modes(params: AlsParams, user_columns: Vec<String>, item_columns: Vec<String>)
        -> Self {

        TensorCoFi {
            params,
            user_columns,
            item_columns,
            rating_column: Some(String::from(RATING)),
            id_spaces: Vec::new(),
            user_features: FnvHashMap::default(),
            item_features: FnvHashMap::default(),
            factors: None,
        }
    }

    /// The column holding interaction strengths; `None` treats every row as strength 1.
    pub fn with_rating_column(mut self, rating_column: Option<String>) -> Self {
        self.rating_column = rating_column;
        self
    }

    pub fn params(&self) -> &AlsParams {
        &self.params
    }

    /// Takes effect with the next call to `fit`.
    pub fn set_params(&mut self, params: AlsParams) {
        self.params = params;
    }

    /// Ranges for hyperparameter search over dim, iterations, lambda and alpha.
    pub fn param_details() -> Vec<(&'static str, ParamRange)> {
        vec![
            ("dim", ParamRange { min: 10.0, max: 20.0, step: 2.0, default: 20.0 }),
            ("iterations", ParamRange { min: 1.0, max: 10.0, step: 2.0, default: 5.0 }),
            ("lambda", ParamRange { min: 0.1, max: 1.0, step: 0.1, default: 0.05 }),
            ("alpha", ParamRange { min: 30.0, max: 50.0, step: 5.0, default: 40.0 }),
        ]
    }

    pub fn factors(&self) -> Option<&Factors> {
        self.factors.as_ref()
    }

    pub fn id_spaces(&self) -> &[IdSpace] {
        &self.id_spaces
    }

    fn mode_columns(&self) -> Vec<String> {
        self.user_columns.iter().chain(self.item_columns.iter()).cloned().collect()
    }

    fn fitted_factors(&self) -> Result<&Factors> {
        self.factors.as_ref()
            .ok_or_else(|| Error::configuration(format!("{} has not been fitted", self.name())))
    }

    /// Factors for a user that was not part of the training data, computed from the items the
    /// user consumed. Only the first item-side mode is used.
    pub fn fold_in_user(&self, items: &[&str], confidence: f64, regularization: f64)
        -> Result<DVector<f64>> {

        let factors = self.fitted_factors()?;

        let ids = items.iter()
            .map(|item| {
                self.item_features.get(*item)
                    .map(|features| features[0])
                    .ok_or_else(|| Error::lookup(ITEM, item))
            })
            .collect::<Result<Vec<usize>>>()?;

        factors.fold_in(self.user_columns.len(), &ids, confidence, regularization)
    }
}

impl Model for TensorCoFi {

    fn fit(&mut self, training: &Frame) -> Result<()> {

        if self.user_columns.is_empty() || self.item_columns.is_empty() {
            return Err(Error::configuration("both user and item side need at least one column"));
        }

        training.require_columns(&[USER, ITEM])?;

        if training.is_empty() {
            return Err(Error::configuration("cannot fit on an empty frame"));
        }

        let mode_columns = self.mode_columns();
        let (tensor, id_spaces) = InteractionTensor::from_frame(
            training,
            &mode_columns,
            self.rating_column.as_ref().map(String::as_str),
        )?;

        let user_index = training.column_index(USER)?;
        let item_index = training.column_index(ITEM)?;
        let num_user_modes = self.user_columns.len();

        let mut user_features = FnvHashMap::default();
        let mut item_features = FnvHashMap::default();

        for row in 0..tensor.num_rows() {
            let ids: Vec<usize> = (0..tensor.num_modes()).map(|mode| tensor.id(row, mode)).collect();

            user_features.insert(training.cell(row, user_index).to_owned(),
                ids[..num_user_modes].to_vec());
            item_features.insert(training.cell(row, item_index).to_owned(),
                ids[num_user_modes..].to_vec());
        }

        let factors = als::train(&tensor, &self.params)?;

        self.id_spaces = id_spaces;
        self.user_features = user_features;
        self.item_features = item_features;
        self.factors = Some(factors);

        Ok(())
    }

    fn score(&self, user: &str, item: &str) -> Result<f64> {

        let factors = self.fitted_factors()?;

        let user_ids = self.user_features.get(user).ok_or_else(|| Error::lookup(USER, user))?;
        let item_ids = self.item_features.get(item).ok_or_else(|| Error::lookup(ITEM, item))?;

        let ids: Vec<usize> = user_ids.iter().chain(item_ids.iter()).cloned().collect();

        factors.score(&ids)
    }

    fn name(&self) -> String {
        format!("TensorCoFi (dim={},iter={},lambda={},alpha={})",
            self.params.factors, self.params.iterations, self.params.lambda, self.params.alpha)
    }
}

#[cfg(test)]
mod tests {

    use crate::als::AlsParams;
    use crate::error::Error;
    use crate::frame::Frame;
    use crate::model::Model;
    use crate::tensor_cofi::TensorCoFi;

    fn params(seed: u64) -> AlsParams {
        AlsParams { factors: 4, iterations: 8, seed: Some(seed), threads: 2, ..Default::default() }
    }

    fn training() -> Frame {
        Frame::from_columns(&[
            ("user", &["alice", "alice", "bob", "bob", "charles", "charles", "dave", "dave"]),
            ("item", &["apple", "pear", "apple", "pear", "pony", "bike", "pony", "bike"]),
            ("rating", &["5", "3", "4", "4", "2", "5", "1", "3"]),
            ("device", &["phone", "phone", "tablet", "phone", "tablet", "tablet", "phone", "tablet"]),
        ]).unwrap()
    }

    #[test]
    fn seen_pairs_score_and_unseen_ids_fail() {
        let frame = training();
        let mut model = TensorCoFi::new(params(1));
        model.fit(&frame).unwrap();

        for user in frame.distinct("user").unwrap() {
            for item in frame.distinct("item").unwrap() {
                assert!(model.score(&user, &item).unwrap().is_finite());
            }
        }

        assert!(matches!(model.score("eve", "apple"), Err(Error::Lookup { .. })));
        assert!(matches!(model.score("alice", "car"), Err(Error::Lookup { .. })));
    }

    #[test]
    fn refitting_with_the_same_seed_is_reproducible() {
        let frame = training();

        let mut first = TensorCoFi::new(params(23));
        first.fit(&frame).unwrap();
        let mut second = TensorCoFi::new(params(23));
        second.fit(&frame).unwrap();

        assert_eq!(first.factors(), second.factors());
        assert_eq!(first.score("bob", "pony").unwrap(), second.score("bob", "pony").unwrap());
    }

    #[test]
    fn learns_the_block_structure() {
        let mut model = TensorCoFi::new(params(4));
        model.fit(&training()).unwrap();

        assert!(model.score("alice", "pear").unwrap() > model.score("alice", "bike").unwrap());
        assert!(model.score("dave", "pony").unwrap() > model.score("dave", "apple").unwrap());
    }

    #[test]
    fn context_columns_become_modes() {
        let frame = training();
        let mut model = TensorCoFi::with_modes(
            params(8),
            vec![String::from("user"), String::from("device")],
            vec![String::from("item")],
        );
        model.fit(&frame).unwrap();

        let factors = model.factors().unwrap();
        assert_eq!(factors.num_modes(), 3);
        assert_eq!(factors.matrix(1).unwrap().ncols(), 2);
        assert_eq!(factors.matrix(2).unwrap().ncols(), 4);

        assert!(model.score("charles", "pony").unwrap().is_finite());
    }

    #[test]
    fn unfitted_model_cannot_score() {
        let model = TensorCoFi::default();
        assert!(matches!(model.score("alice", "apple"), Err(Error::Configuration(_))));
    }

    #[test]
    fn fitting_requires_the_mode_columns() {
        let mut model = TensorCoFi::with_modes(
            params(1),
            vec![String::from("user"), String::from("country")],
            vec![String::from("item")],
        );
        assert!(matches!(model.fit(&training()), Err(Error::Configuration(_))));
    }

    #[test]
    fn name_lists_hyperparameters() {
        let model = TensorCoFi::new(AlsParams::default());
        assert_eq!(model.name(), "TensorCoFi (dim=20,iter=5,lambda=0.05,alpha=40)");
    }

    #[test]
    fn param_details_cover_all_hyperparameters() {
        let names: Vec<&str> = TensorCoFi::param_details().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["dim", "iterations", "lambda", "alpha"]);
    }

    #[test]
    fn folds_in_new_users() {
        let mut model = TensorCoFi::new(params(6));
        model.fit(&training()).unwrap();

        let user = model.fold_in_user(&["pony", "bike"], 10.0, 0.01).unwrap();
        assert_eq!(user.len(), 4);

        assert!(matches!(model.fold_in_user(&["car"], 10.0, 0.01), Err(Error::Lookup { .. })));
    }
}
