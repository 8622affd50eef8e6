// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::error::Result;
use crate::core::wires::OutputWire;

impl<R> OutputWire<R>
where
    R: IntoIterator + Clone + Send + 'static,
    R::Item: Clone + Send + 'static,
{
    /// Wire carrying each element of every collection, in iteration order.
    pub fn build_splitter(&self, name: &str, input_name: &str) -> Result<OutputWire<R::Item>> {
        self.derived("splitter", name, || {
            let (input, output) = self.build_direct_vertex::<R::Item>(name, input_name)?;
            let elements = output.clone();
            input.bind_optional(move |batch: R| {
                for element in batch {
                    elements.forward(element);
                }
                None
            })?;
            tracing::debug!("[{}] Built splitter {}", self.owner(), name);
            Ok(output)
        })
    }
}
