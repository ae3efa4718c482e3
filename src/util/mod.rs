// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small supporting utilities that don't belong to any one layer.

pub mod lru_cache;

pub use lru_cache::LruCache;
