//! Internal machinery shared by the resolution engine.

mod construct;

pub(crate) use construct::{Construction, ErasedConstruction, SealedParts};

use std::future::Future;
use std::pin::Pin;

/// Boxed future type used by type-erased async hooks.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
