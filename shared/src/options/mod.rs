pub mod catalog;
pub mod feature;
pub mod options_vector;
pub mod ranker;
