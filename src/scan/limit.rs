// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Stateful, per-scan row counters. Neither type is `Clone`: each scan
//! owns exactly one of each, threaded through successive chunks.

use arrow::array::{Array, ArrayRef};

/// Keeps `n` rows across however many chunks it is asked about, in order.
pub struct Limit {
    remaining: u64,
}

impl Limit {
    pub fn new(n: u64) -> Limit {
        Limit { remaining: n }
    }

    /// Rows to keep from a chunk of `chunk_len`: `min(remaining, chunk_len)`,
    /// zero once the quota is exhausted.
    pub fn execute(&mut self, chunk_len: u64) -> u64 {
        let take = self.remaining.min(chunk_len);
        self.remaining -= take;
        take
    }

    /// Apply to a materialized array: the array unchanged while fully
    /// within quota, a leading slice on the chunk that crosses it, and
    /// `None` once exhausted. `None` in, `None` out, without consuming
    /// any quota.
    pub fn apply(&mut self, array: Option<&ArrayRef>) -> Option<ArrayRef> {
        let array = array?;
        let take = self.execute(array.len() as u64) as usize;
        if take == 0 {
            None
        } else if take == array.len() {
            Some(array.clone())
        } else {
            Some(array.slice(0, take))
        }
    }
}

/// Skips the first `n` rows across however many chunks it is asked about.
pub struct Offset {
    remaining: u64,
    done: bool,
}

impl Offset {
    pub fn new(n: u64) -> Offset {
        Offset {
            remaining: n,
            done: n == 0,
        }
    }

    /// `None` while the chunk is entirely within the skipped prefix.
    /// `Some(pos)` on the chunk that crosses the threshold, where `pos`
    /// is the in-chunk row to start from. `Some(0)` for every chunk after
    /// that.
    pub fn execute(&mut self, chunk_len: u64) -> Option<u64> {
        if self.done {
            return Some(0);
        }
        if chunk_len < self.remaining {
            self.remaining -= chunk_len;
            return None;
        }
        let pos = self.remaining;
        self.remaining = 0;
        self.done = true;
        if pos == chunk_len {
            None
        } else {
            Some(pos)
        }
    }

    /// Apply to a materialized array: an empty slice while the chunk is
    /// skipped, a tail slice on the crossing chunk, and the array
    /// unchanged after that.
    pub fn apply(&mut self, array: Option<&ArrayRef>) -> Option<ArrayRef> {
        let array = array?;
        match self.execute(array.len() as u64) {
            None => Some(array.slice(0, 0)),
            Some(pos) => Some(array.slice(pos as usize, array.len() - pos as usize)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int32Array;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn limit_with_length() {
        let mut limit = Limit::new(100);
        assert_eq!(limit.execute(10), 10);
        assert_eq!(limit.execute(80), 80);
        assert_eq!(limit.execute(20), 10);
        assert_eq!(limit.execute(30), 0);
    }

    #[test]
    fn limit_over_array() {
        let mut limit = Limit::new(10);
        let arr: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3, 4, 5]));

        assert!(limit.apply(None).is_none());
        assert_eq!(limit.apply(Some(&arr)).unwrap().len(), 5);
        let sliced: ArrayRef = arr.slice(2, 3);
        assert_eq!(limit.apply(Some(&sliced)).unwrap().len(), 3);
        assert_eq!(limit.apply(Some(&arr)).unwrap().len(), 2);
        assert!(limit.apply(Some(&arr)).is_none());
    }

    #[test]
    fn offsets() {
        let mut offset = Offset::new(100);
        assert!(offset.execute(20).is_none());
        assert!(offset.execute(70).is_none());
        assert_eq!(offset.execute(30), Some(10));
        assert_eq!(offset.execute(15), Some(0));
        assert_eq!(offset.execute(200), Some(0));
    }

    #[test]
    fn offset_over_arrays() {
        let mut offset = Offset::new(40);
        let arr: ArrayRef = Arc::new(Int32Array::from((0..20).collect::<Vec<i32>>()));

        assert!(offset.apply(None).is_none());
        assert_eq!(offset.apply(Some(&arr)).unwrap().len(), 0);
        let slice15: ArrayRef = arr.slice(0, 15);
        assert_eq!(offset.apply(Some(&slice15)).unwrap().len(), 0);
        assert_eq!(offset.apply(Some(&arr)).unwrap().len(), 15);
        assert_eq!(offset.apply(Some(&arr)).unwrap().len(), 20);
    }

    proptest! {
        #[test]
        fn limit_never_yields_more_than_n(n in 0u64..500, chunk_lens in prop::collection::vec(0u64..50, 0..20)) {
            let mut limit = Limit::new(n);
            let mut total = 0u64;
            for len in chunk_lens {
                let take = limit.execute(len);
                prop_assert!(take <= len);
                total += take;
                prop_assert!(total <= n);
            }
        }

        #[test]
        fn offset_skips_exactly_n_rows(n in 0u64..500, chunk_lens in prop::collection::vec(0u64..50, 0..20)) {
            let mut offset = Offset::new(n);
            let mut skipped = 0u64;
            let mut kept = 0u64;
            for len in &chunk_lens {
                match offset.execute(*len) {
                    None => skipped += len,
                    Some(pos) => {
                        skipped += pos;
                        kept += len - pos;
                    }
                }
            }
            let total: u64 = chunk_lens.iter().sum();
            prop_assert_eq!(skipped, n.min(total));
            prop_assert_eq!(skipped + kept, total);
        }
    }
}
