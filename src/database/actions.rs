mod composer;
mod ingredients;
mod membership;
mod recipes;
mod shopping_list;
mod tags;
mod users;

pub use composer::*;
pub use ingredients::*;
pub use membership::*;
pub use recipes::*;
pub use shopping_list::*;
pub use tags::*;
pub use users::*;
