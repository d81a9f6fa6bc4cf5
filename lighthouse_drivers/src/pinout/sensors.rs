//! Photodiode inputs, routed to the TIM2 capture channels.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::PinDef;
use super::{PinMode, Port};

/// Right photodiode, TIM2_CH1
pub const RIGHT: PinDef = PinDef::new(Port::A, 0, PinMode::Alt(1));

/// Left photodiode, TIM2_CH2
pub const LEFT: PinDef = PinDef::new(Port::A, 1, PinMode::Alt(1));
