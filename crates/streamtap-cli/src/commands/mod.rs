pub mod check;
pub mod offsets;
pub mod run;
