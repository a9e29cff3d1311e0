//! Data preprocessing module
//!
//! - Feature selection (variance threshold, correlation filter)
//! - Min-max feature scaling

mod scaler;
pub mod feature_selection;

pub use scaler::MinMaxScaler;
pub use feature_selection::{FeatureSelector, SelectionMethod};
