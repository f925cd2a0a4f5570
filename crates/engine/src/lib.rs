pub mod cell;
pub mod formula;
pub mod sheet;
pub mod sort;
pub mod validation;
pub mod zone;
