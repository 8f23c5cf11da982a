pub mod interaction;
pub mod product;
pub mod recommendation;
pub mod session;
pub mod trending;
