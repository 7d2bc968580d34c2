mod avl;
mod depth;
mod error;
mod record;

pub use crate::avl::{Avl, Stats};
pub use crate::depth::Depth;
pub use crate::error::Error;
pub use crate::record::{Key, Record};

#[cfg(test)]
mod proptests;
