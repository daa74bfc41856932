//! Offline evaluation of recommendation models, and a tensor factorization baseline.
//!
//! ```no_run
//! use recoval::{Evaluator, Frame, Metric, Model, TensorCoFi};
//!
//! # fn main() -> recoval::Result<()> {
//! let training = Frame::from_csv(std::fs::File::open("training.csv")?, b'\t')?;
//! let testing = Frame::from_csv(std::fs::File::open("testing.csv")?, b'\t')?;
//!
//! let mut model = TensorCoFi::default();
//! model.fit(&training)?;
//!
//! let items = training.distinct("item")?;
//! let scores = Evaluator::default()
//!     .evaluate(&model, &testing, &[Metric::MeanAveragePrecision], Some(&items))?;
//! println!("{} MAP={}", model.name(), scores[0]);
//! # Ok(())
//! # }
//! ```

pub mod als;
pub mod error;
pub mod evaluation;
pub mod frame;
pub mod ids;
pub mod measures;
pub mod model;
pub mod sampling;
pub mod tensor;
pub mod tensor_cofi;
pub mod utils;

pub use als::{AlsParams, Factors};
pub use error::{Error, Result};
pub use evaluation::{EvaluationConfig, Evaluator, WorkerCommand};
pub use frame::Frame;
pub use measures::{Measure, Metric, Ranked};
pub use model::Model;
pub use tensor_cofi::TensorCoFi;

/// Evaluates `model` on `testing` with the default configuration: 100 sampled negatives per
/// user, drawn from the items of `testing`, on 4 threads. The scores are aligned with `measures`.
pub fn evaluate<M: Model + Sync>(model: &M, testing: &Frame, measures: &[Metric]) -> Result<Vec<f64>> {
    Evaluator::default().evaluate(model, testing, measures, None)
}
