pub mod price;
pub mod temporal;
