//! Policy rule evaluation.
//!
//! Simple rules knock a product out when they FAIL; complex rules knock
//! a product out when they PASS (their tree encodes the disqualifying
//! condition). Keep that inversion in mind when reading callers.

mod complex;
mod simple;
mod value;

pub use complex::{evaluate_complex_rule, has_existence_leaf};
pub use simple::evaluate_rule;
