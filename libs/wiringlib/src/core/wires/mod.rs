// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod input_wire;
mod output_wire;
mod solder;

pub(crate) use input_wire::{InputWireProbe, WireSink};
pub use input_wire::InputWire;
pub use output_wire::OutputWire;
pub use solder::SolderType;
