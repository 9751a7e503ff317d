//! Internal implementation details.

pub(crate) mod dispose_bag;

pub use dispose_bag::Dispose;
pub(crate) use dispose_bag::DisposeBag;
