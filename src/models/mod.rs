mod advertisement;
mod category;
mod inventory;
mod product;
mod validation;

pub use advertisement::*;
pub use category::*;
pub use inventory::*;
pub use product::*;
